// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Entity base: manifest, diff, change ledger, and association cache.
//!
//! All field writes funnel through [`Entity::stage_raw`], which updates the
//! manifest and the diff together, so `diff[k] == manifest.entity[k]` holds for
//! every staged key after any write. Decoding happens before staging; a value
//! the codec rejects never reaches either map.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::client::Client;
use crate::codec::TypedValue;
use crate::error::ModelError;
use crate::guid::{guid_from_body, Guid};
use crate::manifest::{Change, ChangeLedger, Diff, Manifest, Metadata};
use crate::schema::{AttributeDescriptor, EntityType};
use crate::to_one::Association;

/// Client-side mirror of one remote resource.
pub struct Entity {
    ty: Rc<EntityType>,
    client: Client,
    guid: Option<Guid>,
    persisted: bool,
    manifest: Manifest,
    diff: Diff,
    changes: ChangeLedger,
    associations: BTreeMap<String, Association>,
}

impl Entity {
    pub(crate) fn new(ty: Rc<EntityType>, client: Client, guid: Option<Guid>, persisted: bool) -> Self {
        Self {
            ty,
            client,
            manifest: Manifest::with_guid(guid.clone()),
            guid,
            persisted,
            diff: Diff::default(),
            changes: ChangeLedger::default(),
            associations: BTreeMap::new(),
        }
    }

    /// `fallback` is used when the body carries no `metadata.guid`.
    pub(crate) fn loaded(
        ty: Rc<EntityType>,
        client: Client,
        fallback: Guid,
        mut manifest: Manifest,
    ) -> Self {
        let guid = manifest.metadata.guid.get_or_insert(fallback).clone();
        Self {
            ty,
            client,
            guid: Some(guid),
            persisted: true,
            manifest,
            diff: Diff::default(),
            changes: ChangeLedger::default(),
            associations: BTreeMap::new(),
        }
    }

    /// Descriptor table of this entity's type.
    pub fn entity_type(&self) -> &EntityType {
        &self.ty
    }

    /// Client this entity talks through.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Resource GUID; `None` until a brand-new entity is saved.
    pub fn guid(&self) -> Option<&Guid> {
        self.guid.as_ref()
    }

    /// `true` once the entity exists remotely.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// `true` while there are unsaved writes.
    pub fn is_changed(&self) -> bool {
        !self.diff.is_empty()
    }

    /// Last-known server state plus staged writes.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Staged raw writes.
    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    /// Typed transitions since the last save or load.
    pub fn changes(&self) -> &ChangeLedger {
        &self.changes
    }

    /// Raw manifest value under `key`, bypassing codecs.
    pub fn raw_field(&self, key: &str) -> Option<&Value> {
        self.manifest.field(key)
    }

    /// Decode attribute `name` from the manifest. A missing key yields the
    /// attribute's default, or the codec's absent value.
    pub fn get_field(&self, name: &str) -> Result<TypedValue, ModelError> {
        let attr = lookup(&self.ty, name)?;
        attr.decode_stored(self.manifest.field(attr.wire_key()))
    }

    /// Write attribute `name`: manifest, diff, and change ledger move together.
    ///
    /// # Errors
    /// [`ModelError::UnknownField`] for undeclared names and
    /// [`ModelError::MalformedAttribute`] when either the new or the stored
    /// value fails to decode; nothing is written in either case.
    pub fn set_field(&mut self, name: &str, raw: impl Into<Value>) -> Result<(), ModelError> {
        let raw = raw.into();
        let ty = Rc::clone(&self.ty);
        let attr = lookup(&ty, name)?;
        let current = attr.decode(&raw)?;
        let previous = attr.decode_stored(self.manifest.field(attr.wire_key()))?;
        trace!(entity_type = ty.name(), field = name, %raw, "staging field");
        self.stage_raw(attr.wire_key(), raw);
        self.changes.record(attr.name(), Change::new(previous, current));
        Ok(())
    }

    /// Send staged writes. A brand-new entity is created (POST); a persisted
    /// one is updated (PUT) unless nothing is staged. On success the diff and
    /// change ledger are cleared and the manifest re-baselined; on failure the
    /// entity is untouched.
    pub fn save(&mut self) -> Result<(), ModelError> {
        let resource = self.client.resource_path(&self.ty);
        let body = self.diff.to_body();

        if self.persisted {
            let guid = self.require_guid()?;
            if self.diff.is_empty() {
                return Ok(());
            }
            debug!(entity_type = self.ty.name(), %guid, staged = self.diff.len(), "updating");
            let response = self.client.transport().put(&resource, &guid, &body)?;
            let response = Manifest::from_body(response)?;
            self.rebaseline(guid, response);
        } else {
            debug!(entity_type = self.ty.name(), staged = self.diff.len(), "creating");
            let response = self.client.transport().post(&resource, &body)?;
            let guid = guid_from_body(&response)
                .ok_or_else(|| ModelError::MissingGuid(self.ty.name().to_string()))?;
            let response = Manifest::from_body(response)?;
            self.persisted = true;
            self.rebaseline(guid, response);
        }
        Ok(())
    }

    /// Replace the manifest with a fresh fetch, dropping staged writes,
    /// changes, and resolved associations.
    pub fn reload(&mut self) -> Result<(), ModelError> {
        let guid = self.require_guid()?;
        let resource = self.client.resource_path(&self.ty);
        debug!(entity_type = self.ty.name(), %guid, "reloading");
        let body = self.client.transport().get(&resource, &guid)?;
        let mut manifest = Manifest::from_body(body)?;
        manifest.metadata.guid.get_or_insert(guid);
        self.guid.clone_from(&manifest.metadata.guid);
        self.manifest = manifest;
        self.diff.clear();
        self.changes.clear();
        self.associations.clear();
        Ok(())
    }

    /// Delete the remote resource. On success the entity becomes unsaved:
    /// no GUID, not persisted, no resolved associations.
    pub fn delete(&mut self) -> Result<(), ModelError> {
        let guid = self.require_guid()?;
        let resource = self.client.resource_path(&self.ty);
        debug!(entity_type = self.ty.name(), %guid, "deleting");
        self.client.transport().delete(&resource, &guid)?;
        self.guid = None;
        self.persisted = false;
        self.manifest.metadata = Metadata::default();
        self.associations.clear();
        Ok(())
    }

    /// Forget resolved associations and drop the handles they hold; the next
    /// read resolves again.
    pub fn invalidate(&mut self) {
        self.associations.clear();
    }

    pub(crate) fn stage_raw(&mut self, key: &str, raw: Value) {
        self.manifest.entity.insert(key.to_string(), raw.clone());
        self.diff.stage(key, raw);
    }

    pub(crate) fn record_change(&mut self, name: &str, change: Change) {
        self.changes.record(name, change);
    }

    pub(crate) fn cached_association(&self, name: &str) -> Option<&Association> {
        self.associations.get(name)
    }

    pub(crate) fn cache_association(&mut self, name: &str, association: Association) {
        self.associations.insert(name.to_string(), association);
    }

    fn require_guid(&self) -> Result<Guid, ModelError> {
        match (&self.guid, self.persisted) {
            (Some(guid), true) => Ok(guid.clone()),
            _ => Err(ModelError::MissingGuid(self.ty.name().to_string())),
        }
    }

    /// Fold a save response into the manifest. Staged values stay unless the
    /// server sent its own; a relationship whose foreign key the server
    /// changed loses its cached association.
    fn rebaseline(&mut self, guid: Guid, response: Manifest) {
        let Manifest { metadata, entity } = response;

        let stale: Vec<String> = self
            .ty
            .to_one_relationships()
            .filter(|rel| {
                let key = rel.guid_key();
                entity
                    .get(&key)
                    .is_some_and(|server| self.manifest.field(&key) != Some(server))
            })
            .map(|rel| rel.name().to_string())
            .collect();
        for name in stale {
            self.associations.remove(&name);
        }

        self.manifest.entity.extend(entity);
        let previous = std::mem::take(&mut self.manifest.metadata);
        self.manifest.metadata = Metadata {
            guid: Some(guid.clone()),
            url: metadata.url.or(previous.url),
            created_at: metadata.created_at.or(previous.created_at),
            updated_at: metadata.updated_at.or(previous.updated_at),
        };
        self.guid = Some(guid);
        self.diff.clear();
        self.changes.clear();
    }
}

fn lookup<'t>(ty: &'t EntityType, name: &str) -> Result<&'t AttributeDescriptor, ModelError> {
    ty.attribute(name).ok_or_else(|| ModelError::UnknownField {
        entity_type: ty.name().to_string(),
        field: name.to_string(),
    })
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.ty.name())
            .field("guid", &self.guid)
            .field("persisted", &self.persisted)
            .field("manifest", &self.manifest)
            .field("diff", &self.diff)
            .field("changes", &self.changes.names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Shared handle to an [`Entity`].
///
/// Associations hand out clones of the same handle, so identity is preserved:
/// the entity assigned to a relationship is the one read back from it.
/// Equality is identity, or same type and GUID.
///
/// A resolved association holds a strong handle to the associated entity, so
/// two entities resolved through each other form a reference cycle and are
/// never freed. Call [`Entity::invalidate`] on one side to break it.
#[derive(Clone)]
pub struct EntityRef {
    cell: Rc<RefCell<Entity>>,
    ty: Rc<EntityType>,
}

impl EntityRef {
    /// Wrap an entity.
    pub fn new(entity: Entity) -> Self {
        let ty = Rc::clone(&entity.ty);
        Self {
            cell: Rc::new(RefCell::new(entity)),
            ty,
        }
    }

    /// Entity type name, readable without borrowing the entity.
    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    /// Borrow the entity.
    ///
    /// # Errors
    /// [`ModelError::EntityBusy`] while it is mutably borrowed.
    pub fn try_borrow(&self) -> Result<Ref<'_, Entity>, ModelError> {
        self.cell
            .try_borrow()
            .map_err(|_| ModelError::EntityBusy(self.ty.name().to_string()))
    }

    /// Mutably borrow the entity.
    ///
    /// # Errors
    /// [`ModelError::EntityBusy`] while it is borrowed elsewhere.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, Entity>, ModelError> {
        self.cell
            .try_borrow_mut()
            .map_err(|_| ModelError::EntityBusy(self.ty.name().to_string()))
    }

    /// Current GUID of the entity.
    pub fn guid(&self) -> Result<Option<Guid>, ModelError> {
        Ok(self.try_borrow()?.guid().cloned())
    }

    /// `true` if both handles point at the same entity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.ty.name() != other.ty.name() {
            return false;
        }
        match (self.cell.try_borrow(), other.cell.try_borrow()) {
            (Ok(a), Ok(b)) => a.guid.is_some() && a.guid == b.guid,
            _ => false,
        }
    }
}

impl std::fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guid = self.cell.try_borrow().map(|e| e.guid.clone());
        let mut out = f.debug_struct("EntityRef");
        out.field("type", &self.ty.name());
        match guid {
            Ok(guid) => out.field("guid", &guid),
            Err(_) => out.field("guid", &"<borrowed>"),
        };
        out.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{client_with, StubTransport};
    use crate::transport::TransportError;
    use serde_json::json;

    fn fresh(stub: StubTransport) -> (EntityRef, StubTransport) {
        let (client, stub) = client_with(stub);
        (client.entity("test_model", Guid::new("my-model-guid-1")).unwrap(), stub)
    }

    #[test]
    fn set_field_updates_manifest_diff_and_changes() {
        let (model, _) = fresh(StubTransport::default());
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("name", "first").unwrap();

        assert_eq!(model.raw_field("name"), Some(&json!("first")));
        assert_eq!(model.diff().to_body(), json!({ "name": "first" }));
        let change = model.changes().get("name").unwrap();
        assert_eq!(change.previous, TypedValue::Absent);
        assert_eq!(change.current, TypedValue::String("first".into()));
        assert!(model.is_changed());
    }

    #[test]
    fn ledger_keeps_only_latest_transition() {
        let (model, _) = fresh(StubTransport::default());
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("name", "a").unwrap();
        model.set_field("name", "b").unwrap();
        model.set_field("name", "c").unwrap();

        let change = model.changes().get("name").unwrap();
        assert_eq!(change.previous, TypedValue::String("b".into()));
        assert_eq!(change.current, TypedValue::String("c".into()));
        assert_eq!(model.diff().len(), 1);
    }

    #[test]
    fn attribute_at_stages_under_wire_key_but_records_name() {
        let (model, _) = fresh(StubTransport::default());
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("instance_count", 3).unwrap();

        assert_eq!(model.diff().to_body(), json!({ "instances": 3 }));
        assert!(model.changes().get("instance_count").is_some());
        assert_eq!(model.get_field("instance_count").unwrap(), TypedValue::Integer(3));
    }

    #[test]
    fn malformed_value_leaves_state_untouched() {
        let (model, _) = fresh(StubTransport::default());
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("name", "kept").unwrap();
        let before = (model.manifest().clone(), model.diff().clone(), model.changes().clone());

        let err = model.set_field("name", 12).unwrap_err();
        match err {
            ModelError::MalformedAttribute { field, raw, expected } => {
                assert_eq!(field, "name");
                assert_eq!(raw, json!(12));
                assert_eq!(expected, "string");
            }
            other => panic!("expected malformed attribute, got {other:?}"),
        }
        assert_eq!(
            (model.manifest().clone(), model.diff().clone(), model.changes().clone()),
            before
        );
    }

    #[test]
    fn get_field_reports_absent_and_unknown() {
        let (model, _) = fresh(StubTransport::default());
        let model = model.try_borrow().unwrap();
        assert_eq!(model.get_field("name").unwrap(), TypedValue::Absent);
        assert!(matches!(
            model.get_field("bogus").unwrap_err(),
            ModelError::UnknownField { .. }
        ));
    }

    #[test]
    fn update_sends_diff_and_rebaselines() {
        let stub = StubTransport::default().with_put(Value::Null);
        let (model, stub) = fresh(stub);
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("name", "renamed").unwrap();
        model.save().unwrap();

        assert_eq!(stub.last_body(), Some(json!({ "name": "renamed" })));
        assert!(model.diff().is_empty());
        assert!(model.changes().is_empty());
        assert_eq!(model.raw_field("name"), Some(&json!("renamed")));
    }

    #[test]
    fn update_with_empty_diff_is_a_no_op() {
        let (model, stub) = fresh(StubTransport::default());
        model.try_borrow_mut().unwrap().save().unwrap();
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn server_rewritten_foreign_key_drops_resolved_association() {
        let stub = StubTransport::default()
            .with_put(json!({ "entity": { "associated_model_guid": "server-side" } }));
        let (client, stub) = client_with(stub);
        let model = client.entity("test_model", Guid::new("my-model-guid-1")).unwrap();
        let rel = client.entity_type("test_model").unwrap().to_one("associated_model").unwrap();
        let other = client.entity("associated_model", Guid::new("g2")).unwrap();
        let mut model = model.try_borrow_mut().unwrap();

        rel.set(&mut model, other.into()).unwrap();
        model.save().unwrap();
        assert_eq!(model.raw_field("associated_model_guid"), Some(&json!("server-side")));

        let resolved = rel.get(&mut model).unwrap();
        assert_eq!(
            resolved.as_entity().unwrap().guid().unwrap(),
            Some(Guid::new("server-side"))
        );
        assert_eq!(stub.calls(), 2);
    }

    #[test]
    fn failed_update_keeps_staged_state() {
        let stub = StubTransport::default().failing(TransportError::Status {
            status: 500,
            body: "boom".into(),
        });
        let (model, _) = fresh(stub);
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("name", "pending").unwrap();

        assert!(matches!(model.save().unwrap_err(), ModelError::Transport(_)));
        assert_eq!(model.diff().to_body(), json!({ "name": "pending" }));
        assert!(model.changes().get("name").is_some());
    }

    #[test]
    fn create_assigns_guid_from_response() {
        let stub = StubTransport::default()
            .with_post(json!({ "metadata": { "guid": "thing", "url": "/v2/test_models/thing" } }));
        let (client, _) = client_with(stub);
        let model = client.build("test_model").unwrap();
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("name", "fresh").unwrap();
        model.save().unwrap();

        assert!(model.is_persisted());
        assert_eq!(model.guid(), Some(&Guid::new("thing")));
        assert_eq!(model.manifest().metadata.url.as_deref(), Some("/v2/test_models/thing"));
        assert_eq!(model.raw_field("name"), Some(&json!("fresh")));
    }

    #[test]
    fn create_without_guid_in_response_fails_cleanly() {
        let stub = StubTransport::default().with_post(json!({ "entity": {} }));
        let (client, _) = client_with(stub);
        let model = client.build("test_model").unwrap();
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("name", "fresh").unwrap();

        assert!(matches!(model.save().unwrap_err(), ModelError::MissingGuid(_)));
        assert!(!model.is_persisted());
        assert_eq!(model.diff().len(), 1);
    }

    #[test]
    fn reload_replaces_manifest_and_drops_staged_writes() {
        let stub = StubTransport::default().with_get(json!({ "entity": { "name": "server" } }));
        let (model, _) = fresh(stub);
        let mut model = model.try_borrow_mut().unwrap();
        model.set_field("name", "local").unwrap();
        model.reload().unwrap();

        assert_eq!(model.raw_field("name"), Some(&json!("server")));
        assert!(model.diff().is_empty());
        assert!(model.changes().is_empty());
    }

    #[test]
    fn delete_makes_entity_unsaved() {
        let (model, stub) = fresh(StubTransport::default());
        let mut model = model.try_borrow_mut().unwrap();
        model.delete().unwrap();
        assert_eq!(stub.calls(), 1);
        assert!(!model.is_persisted());
        assert_eq!(model.guid(), None);
        assert!(matches!(model.reload().unwrap_err(), ModelError::MissingGuid(_)));
    }

    #[test]
    fn entity_refs_compare_by_identity_or_type_and_guid() {
        let (client, _) = client_with(StubTransport::default());
        let a = client.entity("associated_model", Guid::new("g2")).unwrap();
        let b = client.entity("associated_model", Guid::new("g2")).unwrap();
        let c = client.entity("associated_model", Guid::new("g3")).unwrap();
        let unsaved_1 = client.build("associated_model").unwrap();
        let unsaved_2 = client.build("associated_model").unwrap();

        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a, c);
        assert_eq!(unsaved_1, unsaved_1.clone());
        assert_ne!(unsaved_1, unsaved_2);
    }

    #[test]
    fn invalidate_releases_mutual_associations() {
        let (client, _) = client_with(StubTransport::default());
        let a = client.entity("test_model", Guid::new("a")).unwrap();
        let b = client.entity("test_model", Guid::new("b")).unwrap();
        a.try_borrow_mut()
            .unwrap()
            .cache_association("associated_model", Association::Entity(b.clone()));
        b.try_borrow_mut()
            .unwrap()
            .cache_association("associated_model", Association::Entity(a.clone()));
        assert_eq!(Rc::strong_count(&a.cell), 2);
        assert_eq!(Rc::strong_count(&b.cell), 2);

        a.try_borrow_mut().unwrap().invalidate();
        assert_eq!(Rc::strong_count(&b.cell), 1);
        assert_eq!(Rc::strong_count(&a.cell), 2);
    }

    #[test]
    fn busy_entity_reports_instead_of_panicking() {
        let (client, _) = client_with(StubTransport::default());
        let model = client.build("test_model").unwrap();
        let _held = model.try_borrow_mut().unwrap();
        assert!(matches!(model.guid().unwrap_err(), ModelError::EntityBusy(_)));
    }
}

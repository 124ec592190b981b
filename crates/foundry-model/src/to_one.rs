// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! To-one association resolver.
//!
//! A relationship `R` keeps the associated entity's GUID in the owner's
//! manifest under `R_guid`. Reads resolve that GUID lazily and memoize the
//! result per owner; writes store the GUID eagerly and overwrite the memo.
//! There is no stale state: a memoized association is trusted until the next
//! write through the same accessor.
//!
//! ```text
//! Unresolved --get--> Resolved --set--> Resolved
//!      \________________set_______________^
//! ```

use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::codec::TypedValue;
use crate::entity::{Entity, EntityRef};
use crate::error::ModelError;
use crate::guid::{guid_from_body, url_key, Guid};
use crate::manifest::Change;
use crate::schema::ToOneDescriptor;

/// Value of a to-one relationship: an entity, or the "no association" sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Association {
    /// Associated entity.
    Entity(EntityRef),
    /// The relationship's default sentinel (usually `null`).
    Default(Value),
}

impl Association {
    /// The `null` sentinel.
    pub fn none() -> Self {
        Self::Default(Value::Null)
    }

    /// Associated entity, if any.
    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Entity(e) => Some(e),
            Self::Default(_) => None,
        }
    }

    /// `true` for the default sentinel.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default(_))
    }

    /// `true` if both are the same entity handle, or equal sentinels.
    pub fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Entity(a), Self::Entity(b)) => a.ptr_eq(b),
            (Self::Default(a), Self::Default(b)) => a == b,
            _ => false,
        }
    }

    /// Typed form recorded in the change ledger.
    pub fn to_typed(&self) -> TypedValue {
        match self {
            Self::Entity(e) => TypedValue::Entity(e.clone()),
            Self::Default(Value::Null) => TypedValue::Null,
            Self::Default(other) => TypedValue::Json(other.clone()),
        }
    }
}

impl From<EntityRef> for Association {
    fn from(entity: EntityRef) -> Self {
        Self::Entity(entity)
    }
}

/// Accessor bundle for one declared to-one relationship.
///
/// Obtained from [`EntityType::to_one`](crate::EntityType::to_one); holds no
/// per-instance state, so one bundle serves every owner of that type.
#[derive(Debug, Clone)]
pub struct ToOne {
    descriptor: Rc<ToOneDescriptor>,
}

impl ToOne {
    /// Accessor for `descriptor`.
    pub fn new(descriptor: Rc<ToOneDescriptor>) -> Self {
        Self { descriptor }
    }

    /// Relationship name.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Declaration this accessor was built from.
    pub fn descriptor(&self) -> &ToOneDescriptor {
        &self.descriptor
    }

    /// Resolve the relationship.
    ///
    /// A memoized value is returned without touching the transport. Otherwise
    /// an absent GUID resolves to the default; a present GUID is served from
    /// the inline body under `R` when that body describes the same GUID, and
    /// fetched once otherwise. A failed fetch leaves the relationship
    /// unresolved.
    pub fn get(&self, owner: &mut Entity) -> Result<Association, ModelError> {
        let name = self.descriptor.name();
        if let Some(hit) = owner.cached_association(name) {
            return Ok(hit.clone());
        }

        let client = owner.client().clone();
        let associated = self.descriptor.associated_type();
        let resolved = match self.guid(owner)? {
            None => Association::Default(self.descriptor.resolved_default()),
            Some(guid) => match self.inline_body(owner, &guid) {
                Some(body) => {
                    trace!(relationship = name, %guid, "resolving from inline body");
                    Association::Entity(client.load(associated, body)?)
                }
                None => {
                    debug!(relationship = name, %guid, "resolving association");
                    Association::Entity(client.fetch(associated, &guid)?)
                }
            },
        };

        owner.cache_association(name, resolved.clone());
        Ok(resolved)
    }

    /// Assign the relationship and return `value`.
    ///
    /// Manifest and diff receive `R_guid` (`null` for the default), the change
    /// ledger records `R` as `(value before this call, value)`, and the memo is
    /// overwritten, all in one step.
    ///
    /// # Errors
    /// [`ModelError::TypeMismatch`] for an entity of another type, or for a
    /// sentinel that is not this relationship's configured default;
    /// [`ModelError::MissingGuid`] for an entity that has not been saved yet.
    /// Nothing is written in either case.
    pub fn set(&self, owner: &mut Entity, value: Association) -> Result<Association, ModelError> {
        let guid_to_store = self.guid_to_store(&value)?;
        let previous = self.previous_value(owner)?;
        let name = self.descriptor.name();

        trace!(relationship = name, guid = %guid_to_store, "assigning association");
        owner.stage_raw(&self.descriptor.guid_key(), guid_to_store);
        owner.record_change(name, Change::new(previous, value.to_typed()));
        owner.cache_association(name, value.clone());
        Ok(value)
    }

    /// Create a new remote entity of the associated type with `attributes`,
    /// then assign it. If the create fails, the owner is not touched.
    ///
    /// The remote resource is not cleaned up if a later step fails.
    pub fn create(
        &self,
        owner: &mut Entity,
        attributes: Map<String, Value>,
    ) -> Result<EntityRef, ModelError> {
        let created = owner.client().build(self.descriptor.associated_type())?;
        {
            let mut entity = created.try_borrow_mut()?;
            for (field, raw) in attributes {
                entity.set_field(&field, raw)?;
            }
            entity.save()?;
        }
        debug!(relationship = self.descriptor.name(), "created association");
        self.set(owner, Association::Entity(created.clone()))?;
        Ok(created)
    }

    /// Foreign GUID currently stored on `owner`, decoded through the GUID codec.
    pub fn guid(&self, owner: &Entity) -> Result<Option<Guid>, ModelError> {
        match owner.get_field(&self.descriptor.guid_key())? {
            TypedValue::Guid(guid) => Ok(Some(guid)),
            _ => Ok(None),
        }
    }

    /// `R_url` from the owner's manifest, when the server supplied one.
    pub fn url(&self, owner: &Entity) -> Option<String> {
        owner
            .raw_field(&url_key(self.descriptor.name()))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Inline body under `R`, only if it describes `guid`. A body left over
    /// from before a reassignment is ignored.
    fn inline_body(&self, owner: &Entity, guid: &Guid) -> Option<Value> {
        owner
            .raw_field(self.descriptor.name())
            .filter(|body| guid_from_body(body).as_ref() == Some(guid))
            .cloned()
    }

    fn guid_to_store(&self, value: &Association) -> Result<Value, ModelError> {
        match value {
            Association::Entity(entity) => {
                if entity.type_name() != self.descriptor.associated_type() {
                    return Err(self.mismatch(entity.type_name().to_string()));
                }
                entity
                    .guid()?
                    .map(|g| g.to_value())
                    .ok_or_else(|| ModelError::MissingGuid(entity.type_name().to_string()))
            }
            Association::Default(sentinel) => {
                if !self.descriptor.is_default(sentinel) {
                    return Err(self.mismatch(format!("sentinel {sentinel}")));
                }
                Ok(Value::Null)
            }
        }
    }

    /// Memoized value if resolved; otherwise a reference built from the stored
    /// GUID, without fetching; otherwise absent.
    fn previous_value(&self, owner: &Entity) -> Result<TypedValue, ModelError> {
        if let Some(cached) = owner.cached_association(self.descriptor.name()) {
            return Ok(cached.to_typed());
        }
        match self.guid(owner)? {
            Some(guid) => {
                let reference = owner
                    .client()
                    .entity(self.descriptor.associated_type(), guid)?;
                Ok(TypedValue::Entity(reference))
            }
            None => Ok(TypedValue::Absent),
        }
    }

    fn mismatch(&self, found: String) -> ModelError {
        let expected = if self.descriptor.has_default() {
            format!(
                "{} or {}",
                self.descriptor.associated_type(),
                self.descriptor.resolved_default()
            )
        } else {
            self.descriptor.associated_type().to_string()
        };
        ModelError::TypeMismatch {
            relationship: self.descriptor.name().to_string(),
            expected,
            found,
        }
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client handle shared by every entity it produces.

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::entity::{Entity, EntityRef};
use crate::error::ModelError;
use crate::guid::{guid_from_body, Guid};
use crate::manifest::Manifest;
use crate::schema::{EntityType, Schema};
use crate::transport::Transport;

/// Cheap-to-clone handle over the transport, schema, and configuration.
///
/// The transport is only ever called through `&self`; this layer never mutates
/// it, so one client can back any number of entities.
#[derive(Clone)]
pub struct Client {
    inner: Rc<ClientInner>,
}

struct ClientInner {
    transport: Rc<dyn Transport>,
    schema: Schema,
    config: ClientConfig,
}

impl Client {
    /// Create a client.
    pub fn new(transport: Rc<dyn Transport>, schema: Schema, config: ClientConfig) -> Self {
        Self {
            inner: Rc::new(ClientInner {
                transport,
                schema,
                config,
            }),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Entity type tables.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Entity type named `name`.
    pub fn entity_type(&self, name: &str) -> Result<Rc<EntityType>, ModelError> {
        self.inner
            .schema
            .entity_type(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownEntityType(name.to_string()))
    }

    /// Collection path for `ty`, e.g. `v2/test_models`.
    pub fn resource_path(&self, ty: &EntityType) -> String {
        self.inner.config.resource_path(ty.plural())
    }

    /// Brand-new entity with no GUID; `save` will create it remotely.
    pub fn build(&self, type_name: &str) -> Result<EntityRef, ModelError> {
        let ty = self.entity_type(type_name)?;
        Ok(EntityRef::new(Entity::new(ty, self.clone(), None, false)))
    }

    /// Entity for a known GUID with an empty manifest. Nothing is fetched.
    pub fn entity(&self, type_name: &str, guid: Guid) -> Result<EntityRef, ModelError> {
        let ty = self.entity_type(type_name)?;
        Ok(EntityRef::new(Entity::new(ty, self.clone(), Some(guid), true)))
    }

    /// Fetch the manifest for `guid` and build a loaded entity from it.
    pub fn fetch(&self, type_name: &str, guid: &Guid) -> Result<EntityRef, ModelError> {
        let ty = self.entity_type(type_name)?;
        let resource = self.resource_path(&ty);
        debug!(entity_type = ty.name(), %guid, %resource, "fetching manifest");
        let body = self.transport().get(&resource, guid)?;
        let manifest = Manifest::from_body(body)?;
        Ok(EntityRef::new(Entity::loaded(
            ty,
            self.clone(),
            guid.clone(),
            manifest,
        )))
    }

    /// Build a loaded entity from a response body already in hand (for
    /// example an inline association). The body must carry `metadata.guid`.
    pub fn load(&self, type_name: &str, body: Value) -> Result<EntityRef, ModelError> {
        let ty = self.entity_type(type_name)?;
        let guid =
            guid_from_body(&body).ok_or_else(|| ModelError::MissingGuid(ty.name().to_string()))?;
        let manifest = Manifest::from_body(body)?;
        Ok(EntityRef::new(Entity::loaded(ty, self.clone(), guid, manifest)))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("schema", &self.inner.schema)
            .finish_non_exhaustive()
    }
}

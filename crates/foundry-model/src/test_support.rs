// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Minimal transport stub and schema for in-crate unit tests.
#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::client::Client;
use crate::codec::{IntegerCodec, StringCodec};
use crate::config::ClientConfig;
use crate::guid::Guid;
use crate::schema::{EntityType, Schema, ToOneDescriptor};
use crate::transport::{Transport, TransportError};

/// Canned-response transport. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct StubTransport {
    inner: Rc<RefCell<StubState>>,
}

#[derive(Default)]
struct StubState {
    get: Option<Value>,
    post: Option<Value>,
    put: Option<Value>,
    failure: Option<TransportError>,
    calls: usize,
    last_resource: Option<String>,
    last_body: Option<Value>,
}

impl StubTransport {
    pub(crate) fn with_get(self, body: Value) -> Self {
        self.inner.borrow_mut().get = Some(body);
        self
    }

    pub(crate) fn with_post(self, body: Value) -> Self {
        self.inner.borrow_mut().post = Some(body);
        self
    }

    pub(crate) fn with_put(self, body: Value) -> Self {
        self.inner.borrow_mut().put = Some(body);
        self
    }

    pub(crate) fn failing(self, err: TransportError) -> Self {
        self.inner.borrow_mut().failure = Some(err);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.inner.borrow().calls
    }

    pub(crate) fn last_resource(&self) -> Option<String> {
        self.inner.borrow().last_resource.clone()
    }

    pub(crate) fn last_body(&self) -> Option<Value> {
        self.inner.borrow().last_body.clone()
    }

    fn record(&self, resource: &str, body: Option<&Value>) -> Result<(), TransportError> {
        let mut state = self.inner.borrow_mut();
        state.calls += 1;
        state.last_resource = Some(resource.to_string());
        state.last_body = body.cloned();
        state.failure.clone().map_or(Ok(()), Err)
    }
}

impl Transport for StubTransport {
    fn get(&self, resource: &str, _guid: &Guid) -> Result<Value, TransportError> {
        self.record(resource, None)?;
        Ok(self.inner.borrow().get.clone().unwrap_or_else(|| json!({ "entity": {} })))
    }

    fn post(&self, resource: &str, body: &Value) -> Result<Value, TransportError> {
        self.record(resource, Some(body))?;
        Ok(self
            .inner
            .borrow()
            .post
            .clone()
            .unwrap_or_else(|| json!({ "metadata": { "guid": "stub-guid" } })))
    }

    fn put(&self, resource: &str, _guid: &Guid, body: &Value) -> Result<Value, TransportError> {
        self.record(resource, Some(body))?;
        Ok(self.inner.borrow().put.clone().unwrap_or(Value::Null))
    }

    fn delete(&self, resource: &str, _guid: &Guid) -> Result<(), TransportError> {
        self.record(resource, None)
    }
}

/// `test_model` → `associated_model`, plus a defaulted alias and an
/// unrelated `other_model` for type-mismatch cases.
pub(crate) fn test_schema() -> Schema {
    Schema::builder()
        .entity(EntityType::builder("associated_model", "associated_models").attribute("attribute", StringCodec))
        .entity(EntityType::builder("other_model", "other_models"))
        .entity(
            EntityType::builder("test_model", "test_models")
                .attribute("name", StringCodec)
                .attribute_at("instance_count", "instances", IntegerCodec)
                .to_one("associated_model")
                .relationship(
                    ToOneDescriptor::new("fallback_model")
                        .associated("associated_model")
                        .default_value(Value::Null),
                ),
        )
        .build()
        .unwrap()
}

pub(crate) fn client_with(stub: StubTransport) -> (Client, StubTransport) {
    let client = Client::new(Rc::new(stub.clone()), test_schema(), ClientConfig::default());
    (client, stub)
}

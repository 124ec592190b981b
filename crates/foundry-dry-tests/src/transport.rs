// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording fake of the remote API.
//!
//! Resources live in memory, keyed by collection path and GUID. Every call is
//! logged before failure injection is consulted, so a failed call still shows
//! up in [`RecordingTransport::calls`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use foundry_model::{Guid, Transport, TransportError};
use serde_json::{json, Map, Value};

/// One call made through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `GET resource/guid`.
    Get {
        /// Collection path.
        resource: String,
        /// Member GUID.
        guid: Guid,
    },
    /// `POST resource`.
    Post {
        /// Collection path.
        resource: String,
        /// Request body.
        body: Value,
    },
    /// `PUT resource/guid`.
    Put {
        /// Collection path.
        resource: String,
        /// Member GUID.
        guid: Guid,
        /// Request body.
        body: Value,
    },
    /// `DELETE resource/guid`.
    Delete {
        /// Collection path.
        resource: String,
        /// Member GUID.
        guid: Guid,
    },
}

/// In-memory [`Transport`] with a call log and failure injection.
///
/// Clones share state: hand one clone to the client and keep another to seed
/// resources and inspect calls.
///
/// # Example
///
/// ```
/// use foundry_dry_tests::{RecordingTransport, ASSOCIATED_MODELS};
/// use foundry_model::{Guid, Transport};
/// use serde_json::json;
///
/// let transport = RecordingTransport::new()
///     .with_resource(ASSOCIATED_MODELS, "g2", json!({ "attribute": "seeded" }));
///
/// let body = transport.get(ASSOCIATED_MODELS, &Guid::new("g2")).unwrap();
/// assert_eq!(body["entity"]["attribute"], "seeded");
/// assert_eq!(transport.get_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<TransportState>>,
}

#[derive(Default)]
struct TransportState {
    resources: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
    calls: Vec<TransportCall>,
    generated: u64,
    fail_on_get: Option<TransportError>,
    fail_on_post: Option<TransportError>,
    fail_on_put: Option<TransportError>,
    fail_on_delete: Option<TransportError>,
    post_response: Option<Value>,
}

impl RecordingTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource; `entity` must be a JSON object (anything else seeds
    /// an empty one).
    pub fn with_resource(self, resource: &str, guid: &str, entity: Value) -> Self {
        self.insert(resource, guid, entity);
        self
    }

    /// Seed or replace a resource.
    pub fn insert(&self, resource: &str, guid: &str, entity: Value) {
        let entity = match entity {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.state()
            .resources
            .entry(resource.to_string())
            .or_default()
            .insert(guid.to_string(), entity);
    }

    /// Stored `entity` section of a resource.
    pub fn resource(&self, resource: &str, guid: &str) -> Option<Value> {
        self.state()
            .resources
            .get(resource)
            .and_then(|members| members.get(guid))
            .map(|entity| Value::Object(entity.clone()))
    }

    /// Fail every GET with `err` until cleared with `None`.
    pub fn set_fail_on_get(&self, err: Option<TransportError>) {
        self.state().fail_on_get = err;
    }

    /// Fail every POST with `err` until cleared with `None`.
    pub fn set_fail_on_post(&self, err: Option<TransportError>) {
        self.state().fail_on_post = err;
    }

    /// Fail every PUT with `err` until cleared with `None`.
    pub fn set_fail_on_put(&self, err: Option<TransportError>) {
        self.state().fail_on_put = err;
    }

    /// Fail every DELETE with `err` until cleared with `None`.
    pub fn set_fail_on_delete(&self, err: Option<TransportError>) {
        self.state().fail_on_delete = err;
    }

    /// Answer POSTs with `body` instead of the stored manifest. The resource
    /// is still stored under a generated GUID.
    pub fn script_post_response(&self, body: Value) {
        self.state().post_response = Some(body);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    /// Total number of calls.
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Number of GET calls.
    pub fn get_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Get { .. }))
    }

    /// Number of POST calls.
    pub fn post_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Post { .. }))
    }

    /// Number of PUT calls.
    pub fn put_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Put { .. }))
    }

    /// Number of DELETE calls.
    pub fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Delete { .. }))
    }

    /// Forget the call log; resources and failure toggles stay.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    fn state(&self) -> MutexGuard<'_, TransportState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn manifest(resource: &str, guid: &str, entity: &Map<String, Value>) -> Value {
    json!({
        "metadata": { "guid": guid, "url": format!("/{resource}/{guid}") },
        "entity": entity,
    })
}

fn not_found(resource: &str, guid: &Guid) -> TransportError {
    TransportError::Status {
        status: 404,
        body: format!("{resource}/{guid} not found"),
    }
}

impl Transport for RecordingTransport {
    fn get(&self, resource: &str, guid: &Guid) -> Result<Value, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Get {
            resource: resource.to_string(),
            guid: guid.clone(),
        });
        if let Some(err) = state.fail_on_get.clone() {
            return Err(err);
        }
        state
            .resources
            .get(resource)
            .and_then(|members| members.get(guid.as_str()))
            .map(|entity| manifest(resource, guid.as_str(), entity))
            .ok_or_else(|| not_found(resource, guid))
    }

    fn post(&self, resource: &str, body: &Value) -> Result<Value, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Post {
            resource: resource.to_string(),
            body: body.clone(),
        });
        if let Some(err) = state.fail_on_post.clone() {
            return Err(err);
        }
        state.generated += 1;
        let guid = format!("generated-guid-{}", state.generated);
        let entity = body.as_object().cloned().unwrap_or_default();
        let response = state
            .post_response
            .clone()
            .unwrap_or_else(|| manifest(resource, &guid, &entity));
        state
            .resources
            .entry(resource.to_string())
            .or_default()
            .insert(guid, entity);
        Ok(response)
    }

    fn put(&self, resource: &str, guid: &Guid, body: &Value) -> Result<Value, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Put {
            resource: resource.to_string(),
            guid: guid.clone(),
            body: body.clone(),
        });
        if let Some(err) = state.fail_on_put.clone() {
            return Err(err);
        }
        let entity = state
            .resources
            .get_mut(resource)
            .and_then(|members| members.get_mut(guid.as_str()))
            .ok_or_else(|| not_found(resource, guid))?;
        if let Some(changes) = body.as_object() {
            entity.extend(changes.clone());
        }
        Ok(manifest(resource, guid.as_str(), entity))
    }

    fn delete(&self, resource: &str, guid: &Guid) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Delete {
            resource: resource.to_string(),
            guid: guid.clone(),
        });
        if let Some(err) = state.fail_on_delete.clone() {
            return Err(err);
        }
        state
            .resources
            .get_mut(resource)
            .and_then(|members| members.remove(guid.as_str()))
            .map(|_| ())
            .ok_or_else(|| not_found(resource, guid))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RES: &str = "v2/widgets";

    #[test]
    fn post_generates_guid_and_stores_body() {
        let transport = RecordingTransport::new();
        let response = transport.post(RES, &json!({ "name": "w" })).unwrap();

        assert_eq!(response["metadata"]["guid"], "generated-guid-1");
        assert_eq!(response["metadata"]["url"], "/v2/widgets/generated-guid-1");
        assert_eq!(
            transport.resource(RES, "generated-guid-1"),
            Some(json!({ "name": "w" }))
        );
        let second = transport.post(RES, &json!({})).unwrap();
        assert_eq!(second["metadata"]["guid"], "generated-guid-2");
    }

    #[test]
    fn put_merges_into_stored_entity() {
        let transport = RecordingTransport::new().with_resource(RES, "g", json!({ "a": 1, "b": 2 }));
        let response = transport.put(RES, &Guid::new("g"), &json!({ "b": 3 })).unwrap();

        assert_eq!(response["entity"], json!({ "a": 1, "b": 3 }));
        assert_eq!(transport.put_count(), 1);
    }

    #[test]
    fn missing_member_is_not_found() {
        let transport = RecordingTransport::new();
        let err = transport.get(RES, &Guid::new("nope")).unwrap_err();
        assert!(err.is_not_found());
        assert!(transport.delete(RES, &Guid::new("nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn injected_failure_is_logged_and_leaves_resources_alone() {
        let transport = RecordingTransport::new();
        transport.set_fail_on_post(Some(TransportError::Network("down".into())));

        assert_eq!(
            transport.post(RES, &json!({})).unwrap_err(),
            TransportError::Network("down".into())
        );
        assert_eq!(transport.post_count(), 1);
        assert_eq!(transport.resource(RES, "generated-guid-1"), None);

        transport.set_fail_on_post(None);
        assert!(transport.post(RES, &json!({})).is_ok());
    }

    #[test]
    fn delete_removes_member() {
        let transport = RecordingTransport::new().with_resource(RES, "g", json!({}));
        transport.delete(RES, &Guid::new("g")).unwrap();
        assert_eq!(transport.resource(RES, "g"), None);
        assert_eq!(
            transport.calls(),
            vec![TransportCall::Delete {
                resource: RES.into(),
                guid: Guid::new("g"),
            }]
        );
    }

    #[test]
    fn scripted_post_response_replaces_manifest() {
        let transport = RecordingTransport::new();
        transport.script_post_response(json!({ "entity": {} }));
        assert_eq!(transport.post(RES, &json!({})).unwrap(), json!({ "entity": {} }));
        assert!(transport.resource(RES, "generated-guid-1").is_some());
    }

    #[test]
    fn clones_share_log() {
        let transport = RecordingTransport::new().with_resource(RES, "g", json!({}));
        let handle = transport.clone();
        transport.get(RES, &Guid::new("g")).unwrap();
        assert_eq!(handle.get_count(), 1);
        handle.clear_calls();
        assert_eq!(transport.call_count(), 0);
    }
}

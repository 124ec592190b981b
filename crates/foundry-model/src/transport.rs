// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transport port for the remote API.
//!
//! `resource` is the collection path (for example `v2/test_models`); the
//! adapter appends `/<guid>` for member operations. Calls are synchronous and
//! either return a parsed JSON body or fail; retries and authentication belong
//! to the adapter, not to this layer.

use serde_json::Value;
use thiserror::Error;

use crate::guid::Guid;

/// Synchronous JSON transport against the remote API.
pub trait Transport {
    /// `GET <resource>/<guid>`; returns `{ metadata: { guid }, entity: {...} }`.
    fn get(&self, resource: &str, guid: &Guid) -> Result<Value, TransportError>;

    /// `POST <resource>` with the initial attributes; returns at least
    /// `{ metadata: { guid } }` for the created resource.
    fn post(&self, resource: &str, body: &Value) -> Result<Value, TransportError>;

    /// `PUT <resource>/<guid>` with the changed attributes; returns the updated
    /// manifest, or `null` when the server sends no body.
    fn put(&self, resource: &str, guid: &Guid, body: &Value) -> Result<Value, TransportError>;

    /// `DELETE <resource>/<guid>`.
    fn delete(&self, resource: &str, guid: &Guid) -> Result<(), TransportError>;
}

/// Failure of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("request failed with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },
    /// The request never produced a response (connect, TLS, timeout, ...).
    #[error("network error: {0}")]
    Network(String),
    /// The response body was not valid JSON.
    #[error("undecodable response: {0}")]
    Decode(String),
}

impl TransportError {
    /// `true` for a `404 Not Found` response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! GUID newtype and the helpers that derive relationship keys from names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier of a remote resource.
///
/// The server owns the format; the client only compares and forwards it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    /// Wrap an identifier string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// View the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw wire representation (a JSON string).
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Guid {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Extract `metadata.guid` from a response body, if present and a string.
pub fn guid_from_body(body: &Value) -> Option<Guid> {
    body.get("metadata")?
        .get("guid")?
        .as_str()
        .map(Guid::new)
}

/// Manifest key holding the foreign GUID for relationship `name`.
pub(crate) fn guid_key(name: &str) -> String {
    format!("{name}_guid")
}

/// Manifest key holding the resource url for relationship `name`.
pub(crate) fn url_key(name: &str) -> String {
    format!("{name}_url")
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Manifest, diff, and change-ledger bookkeeping.
//!
//! The manifest mirrors the server body verbatim. The diff holds raw wire
//! values keyed by manifest key; the ledger holds typed values keyed by the
//! attribute or relationship name. Both are cleared together on save.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::TypedValue;
use crate::guid::Guid;

/// Identity metadata of a remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Resource GUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    /// Canonical resource url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Server creation timestamp, unparsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Server update timestamp, unparsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Last-known server state of one entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Identity metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Raw field values keyed by manifest key.
    #[serde(default)]
    pub entity: Map<String, Value>,
}

impl Manifest {
    /// Empty manifest carrying only `guid`.
    pub fn with_guid(guid: Option<Guid>) -> Self {
        Self {
            metadata: Metadata {
                guid,
                ..Metadata::default()
            },
            entity: Map::new(),
        }
    }

    /// Parse a response body. `null` (an empty response) parses as an empty
    /// manifest.
    pub fn from_body(body: Value) -> Result<Self, serde_json::Error> {
        if body.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(body)
    }

    /// Raw value stored under `key`, if any.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.entity.get(key)
    }

    /// The manifest as a JSON body.
    pub fn to_body(&self) -> Value {
        serde_json::json!({
            "metadata": self.metadata,
            "entity": self.entity,
        })
    }
}

/// Locally staged raw writes, keyed by manifest key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diff(BTreeMap<String, Value>);

impl Diff {
    /// Staged raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// `true` if `key` has a staged write.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of staged keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Staged keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The diff as a JSON object, ready to send as a request body.
    pub fn to_body(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub(crate) fn stage(&mut self, key: &str, raw: Value) {
        self.0.insert(key.to_string(), raw);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

/// Latest typed transition of one attribute or relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Value immediately before the most recent write.
    pub previous: TypedValue,
    /// Value written by the most recent write.
    pub current: TypedValue,
}

impl Change {
    /// Build a transition.
    pub fn new(previous: TypedValue, current: TypedValue) -> Self {
        Self { previous, current }
    }
}

/// Typed transitions since the last save or load. Not a history: each name
/// keeps only its latest transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeLedger(BTreeMap<String, Change>);

impl ChangeLedger {
    /// Latest transition recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&Change> {
        self.0.get(name)
    }

    /// Number of changed names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Changed names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Transitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn record(&mut self, name: &str, change: Change) {
        self.0.insert(name.to_string(), change);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

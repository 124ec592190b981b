// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for entity bookkeeping and schema construction.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised by entity reads, writes, and persistence.
///
/// Every variant is returned before any local state is mutated: a failed call
/// leaves manifest, diff, changes, and the association cache as they were.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The remote call failed; the transport's error is passed through as-is.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A raw value could not be decoded through the field's codec.
    #[error("malformed value for `{field}` (expected {expected}): {raw}")]
    MalformedAttribute {
        /// Attribute name.
        field: String,
        /// Offending raw value.
        raw: Value,
        /// Codec that rejected it.
        expected: &'static str,
    },
    /// A to-one write was given an entity of the wrong type, or a
    /// non-default sentinel.
    #[error("relationship `{relationship}` expects {expected}, got {found}")]
    TypeMismatch {
        /// Relationship name.
        relationship: String,
        /// Associated entity type (or the configured default).
        expected: String,
        /// What was supplied.
        found: String,
    },
    /// No attribute with this name is declared on the entity type.
    #[error("`{entity_type}` has no attribute `{field}`")]
    UnknownField {
        /// Entity type name.
        entity_type: String,
        /// Requested attribute.
        field: String,
    },
    /// No to-one relationship with this name is declared on the entity type.
    #[error("`{entity_type}` has no to-one relationship `{relationship}`")]
    UnknownRelationship {
        /// Entity type name.
        entity_type: String,
        /// Requested relationship.
        relationship: String,
    },
    /// The schema has no entity type with this name.
    #[error("unknown entity type `{0}`")]
    UnknownEntityType(String),
    /// The entity (or a response body) carries no GUID where one is required.
    #[error("`{0}` has no guid")]
    MissingGuid(String),
    /// The entity is already borrowed elsewhere (for example, assigned to itself).
    #[error("entity `{0}` is already borrowed")]
    EntityBusy(String),
    /// A manifest body did not have the expected shape.
    #[error("manifest body: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised while building a [`Schema`](crate::Schema).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two entity types share a name.
    #[error("entity type `{0}` declared twice")]
    DuplicateEntityType(String),
    /// An attribute (or a relationship's implicit `_guid` key) was declared twice.
    #[error("`{entity_type}` declares `{field}` twice")]
    DuplicateField {
        /// Entity type name.
        entity_type: String,
        /// Attribute or relationship name.
        field: String,
    },
    /// A relationship points at an entity type the schema does not contain.
    #[error("`{entity_type}.{relationship}` refers to unknown entity type `{associated}`")]
    UnresolvedAssociation {
        /// Owning entity type.
        entity_type: String,
        /// Relationship name.
        relationship: String,
        /// Missing associated type.
        associated: String,
    },
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field codecs: raw JSON wire values in, typed values out.
//!
//! Codecs are pure. They never consult the entity, the transport, or any
//! ambient state, so the same raw value always decodes the same way. `null`
//! decodes to [`TypedValue::Null`] for every built-in codec; a key missing from
//! the manifest is represented by the codec's [`FieldCodec::absent`] value.

use serde_json::Value;
use thiserror::Error;

use crate::entity::EntityRef;
use crate::guid::Guid;

/// Decoded value of an attribute or relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Key not present in the manifest.
    Absent,
    /// Explicit `null` on the wire.
    Null,
    /// Boolean attribute.
    Bool(bool),
    /// Integer attribute.
    Integer(i64),
    /// String attribute.
    String(String),
    /// Foreign-key or identity GUID.
    Guid(Guid),
    /// Uninterpreted JSON payload.
    Json(Value),
    /// Resolved (or referenced) associated entity.
    Entity(EntityRef),
}

impl TypedValue {
    /// `true` for [`TypedValue::Absent`] and [`TypedValue::Null`].
    pub fn is_absent_or_null(&self) -> bool {
        matches!(self, Self::Absent | Self::Null)
    }

    /// Borrow the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the GUID payload, if this is a GUID.
    pub fn as_guid(&self) -> Option<&Guid> {
        match self {
            Self::Guid(g) => Some(g),
            _ => None,
        }
    }

    /// Borrow the entity payload, if this is an entity.
    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }
}

/// A raw value did not match the shape a codec expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}")]
pub struct CodecError {
    /// Name of the codec that rejected the value.
    pub expected: &'static str,
}

/// Per-field decoder from raw wire values to [`TypedValue`].
///
/// Implement this to add a scalar type; association and diff logic never need
/// to change for it.
pub trait FieldCodec {
    /// Human-readable codec name, used in error messages.
    fn name(&self) -> &'static str;

    /// Decode a raw wire value.
    ///
    /// # Errors
    /// Returns [`CodecError`] when `raw` is not a valid encoding for this codec.
    fn decode(&self, raw: &Value) -> Result<TypedValue, CodecError>;

    /// Value reported for a key missing from the manifest.
    fn absent(&self) -> TypedValue {
        TypedValue::Absent
    }
}

fn reject(codec: &dyn FieldCodec) -> CodecError {
    CodecError {
        expected: codec.name(),
    }
}

/// UTF-8 string attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl FieldCodec for StringCodec {
    fn name(&self) -> &'static str {
        "string"
    }

    fn decode(&self, raw: &Value) -> Result<TypedValue, CodecError> {
        match raw {
            Value::Null => Ok(TypedValue::Null),
            Value::String(s) => Ok(TypedValue::String(s.clone())),
            _ => Err(reject(self)),
        }
    }
}

/// Signed 64-bit integer attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl FieldCodec for IntegerCodec {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn decode(&self, raw: &Value) -> Result<TypedValue, CodecError> {
        match raw {
            Value::Null => Ok(TypedValue::Null),
            Value::Number(n) => n.as_i64().map(TypedValue::Integer).ok_or_else(|| reject(self)),
            _ => Err(reject(self)),
        }
    }
}

/// Boolean attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCodec;

impl FieldCodec for BooleanCodec {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn decode(&self, raw: &Value) -> Result<TypedValue, CodecError> {
        match raw {
            Value::Null => Ok(TypedValue::Null),
            Value::Bool(b) => Ok(TypedValue::Bool(*b)),
            _ => Err(reject(self)),
        }
    }
}

/// GUID attribute; backs every `<relationship>_guid` foreign key.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuidCodec;

impl FieldCodec for GuidCodec {
    fn name(&self) -> &'static str {
        "guid"
    }

    fn decode(&self, raw: &Value) -> Result<TypedValue, CodecError> {
        match raw {
            Value::Null => Ok(TypedValue::Null),
            Value::String(s) => Ok(TypedValue::Guid(Guid::new(s.as_str()))),
            _ => Err(reject(self)),
        }
    }
}

/// Pass-through codec for structured or loosely typed attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl FieldCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, raw: &Value) -> Result<TypedValue, CodecError> {
        match raw {
            Value::Null => Ok(TypedValue::Null),
            other => Ok(TypedValue::Json(other.clone())),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Entity type descriptors.
//!
//! Declarations are explicit builder calls that produce immutable
//! [`EntityType`] tables, collected once into a [`Schema`]. Nothing is
//! registered globally; instances read their type's table through an `Rc`.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::codec::{FieldCodec, GuidCodec, TypedValue};
use crate::error::{ModelError, SchemaError};
use crate::guid::guid_key;
use crate::to_one::ToOne;

/// One declared attribute: its name, manifest key, codec, and default.
#[derive(Clone)]
pub struct AttributeDescriptor {
    name: String,
    wire_key: String,
    codec: Rc<dyn FieldCodec>,
    default: Option<Value>,
}

impl AttributeDescriptor {
    /// Attribute stored under a manifest key equal to its name.
    pub fn new(name: impl Into<String>, codec: impl FieldCodec + 'static) -> Self {
        let name = name.into();
        Self {
            wire_key: name.clone(),
            name,
            codec: Rc::new(codec),
            default: None,
        }
    }

    /// Store the attribute under a different manifest key.
    pub fn at(mut self, wire_key: impl Into<String>) -> Self {
        self.wire_key = wire_key.into();
        self
    }

    /// Raw value reported when the manifest has no entry for this attribute.
    pub fn with_default(mut self, raw: Value) -> Self {
        self.default = Some(raw);
        self
    }

    /// Attribute name (the change-ledger key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Manifest and diff key.
    pub fn wire_key(&self) -> &str {
        &self.wire_key
    }

    /// Codec used to decode raw values.
    pub fn codec(&self) -> &dyn FieldCodec {
        self.codec.as_ref()
    }

    /// Decode `raw`, naming this attribute in the error.
    pub fn decode(&self, raw: &Value) -> Result<TypedValue, ModelError> {
        self.codec
            .decode(raw)
            .map_err(|e| ModelError::MalformedAttribute {
                field: self.name.clone(),
                raw: raw.clone(),
                expected: e.expected,
            })
    }

    /// Decode the stored raw value, or the default/absent value when missing.
    pub(crate) fn decode_stored(&self, stored: Option<&Value>) -> Result<TypedValue, ModelError> {
        match (stored, &self.default) {
            (Some(raw), _) | (None, Some(raw)) => self.decode(raw),
            (None, None) => Ok(self.codec.absent()),
        }
    }
}

impl std::fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("wire_key", &self.wire_key)
            .field("codec", &self.codec.name())
            .field("default", &self.default)
            .finish()
    }
}

/// Declared to-one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToOneDescriptor {
    name: String,
    associated: String,
    default: Option<Value>,
}

impl ToOneDescriptor {
    /// Relationship whose associated entity type has the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            associated: name.clone(),
            name,
            default: None,
        }
    }

    /// Resolve to a differently named entity type (e.g. `owner` → `user`).
    pub fn associated(mut self, entity_type: impl Into<String>) -> Self {
        self.associated = entity_type.into();
        self
    }

    /// Configure the "no association" sentinel.
    pub fn default_value(mut self, sentinel: Value) -> Self {
        self.default = Some(sentinel);
        self
    }

    /// Relationship name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Associated entity type name.
    pub fn associated_type(&self) -> &str {
        &self.associated
    }

    /// Manifest key of the foreign GUID.
    pub fn guid_key(&self) -> String {
        guid_key(&self.name)
    }

    /// `true` when a default was configured at declaration time.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Value a read resolves to when no GUID is stored: the configured
    /// default, or `null`.
    pub fn resolved_default(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    /// `true` if `value` is the configured default sentinel.
    pub fn is_default(&self, value: &Value) -> bool {
        self.default.as_ref() == Some(value)
    }
}

/// Attribute table of one entity type, keyed by attribute name.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    fields: BTreeMap<String, AttributeDescriptor>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attribute.
    ///
    /// # Errors
    /// Returns [`SchemaError::DuplicateField`] when the name or the
    /// manifest key is already taken.
    pub fn register(
        &mut self,
        entity_type: &str,
        descriptor: AttributeDescriptor,
    ) -> Result<(), SchemaError> {
        let clash = self.fields.contains_key(descriptor.name())
            || self.by_wire_key(descriptor.wire_key()).is_some();
        if clash {
            return Err(SchemaError::DuplicateField {
                entity_type: entity_type.to_string(),
                field: descriptor.name().to_string(),
            });
        }
        self.fields.insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    /// Attribute declared as `name`.
    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.fields.get(name)
    }

    /// Attribute stored under manifest key `wire_key`.
    pub fn by_wire_key(&self, wire_key: &str) -> Option<&AttributeDescriptor> {
        self.fields.values().find(|d| d.wire_key() == wire_key)
    }

    /// Declared attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.fields.values()
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` when no attribute is declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Immutable descriptor table for one entity type.
#[derive(Debug)]
pub struct EntityType {
    name: String,
    plural: String,
    attributes: CodecRegistry,
    to_one: BTreeMap<String, Rc<ToOneDescriptor>>,
}

impl EntityType {
    /// Start declaring an entity type. `plural` is the collection name used in
    /// resource paths.
    pub fn builder(name: impl Into<String>, plural: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.into(),
            plural: plural.into(),
            attributes: Vec::new(),
            to_one: Vec::new(),
        }
    }

    /// Entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection name.
    pub fn plural(&self) -> &str {
        &self.plural
    }

    /// Attribute table.
    pub fn attributes(&self) -> &CodecRegistry {
        &self.attributes
    }

    /// Attribute declared as `name`.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    /// To-one relationship declared as `name`.
    pub fn to_one_descriptor(&self, name: &str) -> Option<&Rc<ToOneDescriptor>> {
        self.to_one.get(name)
    }

    /// Declared to-one relationships in name order.
    pub fn to_one_relationships(&self) -> impl Iterator<Item = &ToOneDescriptor> {
        self.to_one.values().map(|d| d.as_ref())
    }

    /// Accessor bundle for the to-one relationship `name`.
    pub fn to_one(&self, name: &str) -> Result<ToOne, ModelError> {
        self.to_one
            .get(name)
            .map(|d| ToOne::new(Rc::clone(d)))
            .ok_or_else(|| ModelError::UnknownRelationship {
                entity_type: self.name.clone(),
                relationship: name.to_string(),
            })
    }
}

/// Builder for [`EntityType`].
#[derive(Debug)]
pub struct EntityTypeBuilder {
    name: String,
    plural: String,
    attributes: Vec<AttributeDescriptor>,
    to_one: Vec<ToOneDescriptor>,
}

impl EntityTypeBuilder {
    /// Declare an attribute stored under its own name.
    pub fn attribute(self, name: &str, codec: impl FieldCodec + 'static) -> Self {
        self.attribute_descriptor(AttributeDescriptor::new(name, codec))
    }

    /// Declare an attribute stored under a different manifest key.
    pub fn attribute_at(self, name: &str, wire_key: &str, codec: impl FieldCodec + 'static) -> Self {
        self.attribute_descriptor(AttributeDescriptor::new(name, codec).at(wire_key))
    }

    /// Declare a fully configured attribute.
    pub fn attribute_descriptor(mut self, descriptor: AttributeDescriptor) -> Self {
        self.attributes.push(descriptor);
        self
    }

    /// Declare a to-one relationship to the entity type of the same name.
    pub fn to_one(self, name: &str) -> Self {
        self.relationship(ToOneDescriptor::new(name))
    }

    /// Declare a to-one relationship to a differently named entity type.
    pub fn to_one_as(self, name: &str, associated: &str) -> Self {
        self.relationship(ToOneDescriptor::new(name).associated(associated))
    }

    /// Declare a to-one relationship with a default sentinel.
    pub fn to_one_with_default(self, name: &str, default: Value) -> Self {
        self.relationship(ToOneDescriptor::new(name).default_value(default))
    }

    /// Declare a fully configured to-one relationship.
    pub fn relationship(mut self, descriptor: ToOneDescriptor) -> Self {
        self.to_one.push(descriptor);
        self
    }

    /// Finish the table. Every relationship also registers its `<name>_guid`
    /// attribute with the GUID codec.
    pub fn build(self) -> Result<EntityType, SchemaError> {
        let mut attributes = CodecRegistry::new();
        for descriptor in self.attributes {
            attributes.register(&self.name, descriptor)?;
        }

        let mut to_one = BTreeMap::new();
        for descriptor in self.to_one {
            if to_one.contains_key(descriptor.name()) {
                return Err(SchemaError::DuplicateField {
                    entity_type: self.name,
                    field: descriptor.name().to_string(),
                });
            }
            let key = descriptor.guid_key();
            attributes.register(&self.name, AttributeDescriptor::new(key, GuidCodec))?;
            to_one.insert(descriptor.name().to_string(), Rc::new(descriptor));
        }

        Ok(EntityType {
            name: self.name,
            plural: self.plural,
            attributes,
            to_one,
        })
    }
}

/// All entity types known to a client.
#[derive(Debug, Default)]
pub struct Schema {
    types: BTreeMap<String, Rc<EntityType>>,
}

impl Schema {
    /// Start collecting entity types.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder { types: Vec::new() }
    }

    /// Entity type named `name`.
    pub fn entity_type(&self, name: &str) -> Option<&Rc<EntityType>> {
        self.types.get(name)
    }

    /// Entity types in name order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values().map(|d| d.as_ref())
    }
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    types: Vec<EntityTypeBuilder>,
}

impl SchemaBuilder {
    /// Add an entity type declaration.
    pub fn entity(mut self, builder: EntityTypeBuilder) -> Self {
        self.types.push(builder);
        self
    }

    /// Build every table and check that all relationships resolve.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut types = BTreeMap::new();
        for builder in self.types {
            let ty = builder.build()?;
            if types.contains_key(ty.name()) {
                return Err(SchemaError::DuplicateEntityType(ty.name().to_string()));
            }
            types.insert(ty.name().to_string(), Rc::new(ty));
        }

        for ty in types.values() {
            for rel in ty.to_one_relationships() {
                if !types.contains_key(rel.associated_type()) {
                    return Err(SchemaError::UnresolvedAssociation {
                        entity_type: ty.name().to_string(),
                        relationship: rel.name().to_string(),
                        associated: rel.associated_type().to_string(),
                    });
                }
            }
        }

        Ok(Schema { types })
    }
}

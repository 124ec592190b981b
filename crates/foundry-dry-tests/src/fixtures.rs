// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixture schema and client constructors.
//!
//! `test_model` owns a to-one `associated_model` and a `defaulted_model`
//! alias (also resolving to `associated_model`) whose default is `null`.
//! `other_model` exists only to trigger type mismatches.

use std::rc::Rc;

use foundry_model::{
    Client, ClientConfig, EntityType, IntegerCodec, Schema, SchemaError, StringCodec,
    ToOneDescriptor,
};
use serde_json::Value;

use crate::transport::RecordingTransport;

/// Owner entity type.
pub const TEST_MODEL: &str = "test_model";
/// Associated entity type, and the relationship of the same name.
pub const ASSOCIATED_MODEL: &str = "associated_model";
/// Relationship on `test_model` with a `null` default.
pub const DEFAULTED_MODEL: &str = "defaulted_model";
/// Entity type unrelated to `test_model`.
pub const OTHER_MODEL: &str = "other_model";
/// Collection path of `test_model` under the default config.
pub const TEST_MODELS: &str = "v2/test_models";
/// Collection path of `associated_model` under the default config.
pub const ASSOCIATED_MODELS: &str = "v2/associated_models";

fn declare(associated: ToOneDescriptor) -> Result<Schema, SchemaError> {
    Schema::builder()
        .entity(
            EntityType::builder(ASSOCIATED_MODEL, "associated_models")
                .attribute("attribute", StringCodec),
        )
        .entity(EntityType::builder(OTHER_MODEL, "other_models"))
        .entity(
            EntityType::builder(TEST_MODEL, "test_models")
                .attribute("name", StringCodec)
                .attribute_at("instance_count", "instances", IntegerCodec)
                .relationship(associated)
                .relationship(
                    ToOneDescriptor::new(DEFAULTED_MODEL)
                        .associated(ASSOCIATED_MODEL)
                        .default_value(Value::Null),
                ),
        )
        .build()
}

/// Fixture schema; `associated_model` has no default.
pub fn test_schema() -> Result<Schema, SchemaError> {
    declare(ToOneDescriptor::new(ASSOCIATED_MODEL))
}

/// Fixture schema where `associated_model` itself defaults to `null`.
pub fn nullable_test_schema() -> Result<Schema, SchemaError> {
    declare(ToOneDescriptor::new(ASSOCIATED_MODEL).default_value(Value::Null))
}

/// Client over `transport` with `schema` and the default config.
pub fn test_client(transport: &RecordingTransport, schema: Schema) -> Client {
    Client::new(Rc::new(transport.clone()), schema, ClientConfig::default())
}

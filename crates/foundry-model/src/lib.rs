// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! foundry-model: client-side mirror of server-held entities.
//!
//! Every entity keeps three views of the same remote resource:
//! - the **manifest**, the last-known server state (`metadata` + `entity`),
//! - the **diff**, raw wire values staged locally and not yet saved,
//! - the **change ledger**, typed `(previous, current)` pairs for introspection.
//!
//! To-one relationships store the associated entity's GUID in the owner's
//! manifest under `<name>_guid` and resolve it lazily through the
//! [`Transport`] port, memoizing the result per relationship. Writes go
//! through a single staging path so the three views never disagree.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod client;
mod codec;
/// Config port and the client configuration record.
pub mod config;
mod entity;
mod error;
mod guid;
mod manifest;
mod schema;
mod to_one;
/// Transport port: the remote API seen as GET/POST/PUT/DELETE on JSON bodies.
pub mod transport;

#[cfg(test)]
mod test_support;

/// Client handle: transport, schema, and configuration shared by entities.
pub use client::Client;
/// Client configuration and its config-store plumbing.
pub use config::{ClientConfig, ConfigError, ConfigService, ConfigStore};
/// Built-in codecs and the typed value they produce.
pub use codec::{
    BooleanCodec, CodecError, FieldCodec, GuidCodec, IntegerCodec, JsonCodec, StringCodec,
    TypedValue,
};
/// Entity base and its shared handle.
pub use entity::{Entity, EntityRef};
/// Error taxonomy for entity and schema operations.
pub use error::{ModelError, SchemaError};
/// GUID newtype and extraction helpers.
pub use guid::{guid_from_body, Guid};
/// Manifest, diff, and change-ledger bookkeeping types.
pub use manifest::{Change, ChangeLedger, Diff, Manifest, Metadata};
/// Entity type descriptors and the schema that owns them.
pub use schema::{
    AttributeDescriptor, CodecRegistry, EntityType, EntityTypeBuilder, Schema, SchemaBuilder,
    ToOneDescriptor,
};
/// To-one accessor bundle and the association value it resolves to.
pub use to_one::{Association, ToOne};
/// Transport port and its error type.
pub use transport::{Transport, TransportError};

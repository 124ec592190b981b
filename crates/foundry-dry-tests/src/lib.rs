// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for foundry crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`fixtures`] - Fixture schema and client constructors
//! - [`transport`] - Recording fake of the remote API

pub mod config;
pub mod fixtures;
pub mod transport;

pub use config::InMemoryConfigStore;
pub use fixtures::{
    nullable_test_schema, test_client, test_schema, ASSOCIATED_MODEL, ASSOCIATED_MODELS,
    DEFAULTED_MODEL, OTHER_MODEL, TEST_MODEL, TEST_MODELS,
};
pub use transport::{RecordingTransport, TransportCall};

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client configuration and where it is persisted.
//!
//! [`ClientConfig`] names the API endpoint, the path prefix placed before
//! every collection, and the request timeout handed to network adapters. It
//! is stored as JSON through a [`ConfigStore`]; `foundry-config-fs` keeps it
//! on disk and `foundry-dry-tests` in memory.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Key under which [`ClientConfig`] is stored.
pub const CLIENT_CONFIG_KEY: &str = "client";

/// Where serialized client settings live, one blob per key (for example
/// [`CLIENT_CONFIG_KEY`]).
pub trait ConfigStore {
    /// Stored bytes for `key`, or [`ConfigError::NotFound`].
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Replace the bytes stored for `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failure to read or write stored client settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing stored under the key; callers fall back to defaults.
    #[error("not found")]
    NotFound,
    /// Filesystem failure in a disk-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored settings are not valid JSON for the requested type.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Store-specific failure (unresolvable config dir, injected test failure).
    #[error("other: {0}")]
    Other(String),
}

/// JSON codec over a [`ConfigStore`], used by [`ClientConfig::load`] and
/// [`ClientConfig::save`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Unwrap the store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Decode the value under `key`. A missing key or an empty blob is `Ok(None)`.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encode `value` as pretty JSON and store it under `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// Where the remote API lives and how resource paths are formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the API endpoint.
    pub target: String,
    /// Path prefix placed before every collection name.
    pub api_prefix: String,
    /// Per-request timeout used by network adapters, in seconds.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target: "http://localhost:8181".to_string(),
            api_prefix: "v2".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Load the stored client config, falling back to defaults when none is saved.
    pub fn load<S: ConfigStore>(service: &ConfigService<S>) -> Result<Self, ConfigError> {
        Ok(service.load(CLIENT_CONFIG_KEY)?.unwrap_or_default())
    }

    /// Persist this config under [`CLIENT_CONFIG_KEY`].
    pub fn save<S: ConfigStore>(&self, service: &ConfigService<S>) -> Result<(), ConfigError> {
        service.save(CLIENT_CONFIG_KEY, self)
    }

    /// Collection path for a plural resource name, e.g. `v2/apps`.
    pub fn resource_path(&self, plural: &str) -> String {
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            plural.to_string()
        } else {
            format!("{prefix}/{plural}")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore(RefCell<HashMap<String, Vec<u8>>>);

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0.borrow().get(key).cloned().ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_client_config_falls_back_to_defaults() {
        let service = ConfigService::new(MapStore::default());
        assert_eq!(ClientConfig::load(&service).unwrap(), ClientConfig::default());
    }

    #[test]
    fn client_config_round_trips_through_the_store() {
        let service = ConfigService::new(MapStore::default());
        let config = ClientConfig {
            target: "https://api.example.test".into(),
            api_prefix: "v3".into(),
            timeout_secs: 5,
        };
        config.save(&service).unwrap();
        assert_eq!(ClientConfig::load(&service).unwrap(), config);
    }

    #[test]
    fn partial_config_fills_missing_fields_with_defaults() {
        let store = MapStore::default();
        store
            .save_raw(CLIENT_CONFIG_KEY, br#"{ "target": "https://api.example.test" }"#)
            .unwrap();
        let config = ClientConfig::load(&ConfigService::new(store)).unwrap();
        assert_eq!(config.target, "https://api.example.test");
        assert_eq!(config.api_prefix, "v2");
    }

    #[test]
    fn empty_blob_is_treated_as_missing() {
        let store = MapStore::default();
        store.save_raw(CLIENT_CONFIG_KEY, b"").unwrap();
        let service = ConfigService::new(store);
        assert!(service.load::<ClientConfig>(CLIENT_CONFIG_KEY).unwrap().is_none());
    }

    #[test]
    fn resource_path_joins_prefix_and_plural() {
        let mut config = ClientConfig::default();
        assert_eq!(config.resource_path("test_models"), "v2/test_models");
        config.api_prefix = "/v3/".into();
        assert_eq!(config.resource_path("apps"), "v3/apps");
        config.api_prefix = String::new();
        assert_eq!(config.resource_path("apps"), "apps");
    }
}

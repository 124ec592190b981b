// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Disk-backed `ConfigStore` so a foundry client keeps its endpoint and
//! timeout between runs (`client.json` under the platform config dir).

use directories::ProjectDirs;
use foundry_model::config::{ConfigError, ConfigStore};
use std::fs;
use std::path::{Path, PathBuf};

/// One `<key>.json` file per config key under a base directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store under the user config directory (e.g. `~/.config/foundry`), created
    /// if missing.
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "foundry")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Self::with_base(proj.config_dir())
    }

    /// Create a store rooted at `base`, creating the directory if needed.
    pub fn with_base(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory holding the config files.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use foundry_model::{ClientConfig, ConfigService};

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::with_base(dir.path()).unwrap();
        assert!(matches!(store.load_raw("client"), Err(ConfigError::NotFound)));
    }

    #[test]
    fn client_config_is_written_as_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::new(FsConfigStore::with_base(dir.path().join("nested")).unwrap());
        let config = ClientConfig {
            target: "https://api.example.test".into(),
            ..ClientConfig::default()
        };

        config.save(&service).unwrap();
        assert!(dir.path().join("nested").join("client.json").is_file());
        assert_eq!(ClientConfig::load(&service).unwrap(), config);
    }

    #[test]
    fn empty_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("client.json"), b"").unwrap();
        let service = ConfigService::new(FsConfigStore::with_base(dir.path()).unwrap());
        assert_eq!(ClientConfig::load(&service).unwrap(), ClientConfig::default());
    }
}

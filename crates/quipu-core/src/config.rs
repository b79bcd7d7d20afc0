//! `.quipu/config.yml` loading (§6).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuipuError, Result};
use crate::ignores::DEFAULT_PATTERNS;

/// The storage backend a repository is configured to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Anchor commits under `refs/quipu/*`, no SQLite mirror. Default.
    #[default]
    GitObject,
    /// Anchor commits plus a double-written SQLite mirror.
    Sqlite,
    /// Legacy `.quipu/history/*.md` files.
    Filesystem,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StorageConfig {
    #[serde(rename = "type", default)]
    storage_type: StorageType,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct SyncConfig {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    subscriptions: Vec<String>,
    #[serde(default)]
    persistent_ignores: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RawConfig {
    #[serde(default)]
    sync: SyncConfig,
    #[serde(default)]
    storage: StorageConfig,
}

/// Parsed `.quipu/config.yml`.
#[derive(Clone, Debug)]
pub struct Config {
    /// This machine's stable user id, if configured.
    pub user_id: Option<String>,
    /// Owner ids this repository subscribes to.
    pub subscriptions: Vec<String>,
    /// Patterns to sync into `.git/info/exclude`. Falls back to
    /// [`DEFAULT_PATTERNS`] when unset.
    pub persistent_ignores: Vec<String>,
    /// Which storage backend to wire up.
    pub storage_type: StorageType,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: None,
            subscriptions: Vec::new(),
            persistent_ignores: DEFAULT_PATTERNS.iter().map(|s| (*s).to_owned()).collect(),
            storage_type: StorageType::default(),
        }
    }
}

impl Config {
    /// Load `.quipu/config.yml` at `path`. Returns the default config if the
    /// file doesn't exist; returns `ConfigError` if it exists but is
    /// malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let raw: RawConfig = serde_yaml::from_str(&text)
            .map_err(|e| QuipuError::ConfigError(format!("{}: {e}", path.display())))?;

        let persistent_ignores = if raw.sync.persistent_ignores.is_empty() {
            DEFAULT_PATTERNS.iter().map(|s| (*s).to_owned()).collect()
        } else {
            raw.sync.persistent_ignores
        };

        Ok(Self {
            user_id: raw.sync.user_id,
            subscriptions: raw.sync.subscriptions,
            persistent_ignores,
            storage_type: raw.storage.storage_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("config.yml")).unwrap();
        assert_eq!(cfg.storage_type, StorageType::GitObject);
        assert!(!cfg.persistent_ignores.is_empty());
    }

    #[test]
    fn parses_storage_type_and_sync_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "storage:\n  type: sqlite\nsync:\n  user_id: me@example.com\n  subscriptions: [u1, u2]\n",
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.storage_type, StorageType::Sqlite);
        assert_eq!(cfg.user_id.as_deref(), Some("me@example.com"));
        assert_eq!(cfg.subscriptions, vec!["u1".to_owned(), "u2".to_owned()]);
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "storage: [this is not a map").unwrap();
        assert!(matches!(Config::load(&path), Err(QuipuError::ConfigError(_))));
    }
}

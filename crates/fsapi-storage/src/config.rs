use std::path::Path;

use fsapi_watch::WatchConfig;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Tunables for a [`FileStore`](crate::FileStore).
///
/// Usually read from a TOML file:
///
/// ```toml
/// validate_labels = true
///
/// [watch]
/// channel_capacity = 100
/// history_capacity = 1000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub watch: WatchConfig,
    /// Reject objects whose label keys or values are malformed.
    pub validate_labels: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            validate_labels: true,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert!(c.validate_labels);
        assert_eq!(c.watch.channel_capacity, 100);
        assert_eq!(c.watch.history_capacity, 1000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = StoreConfig::from_toml_str("[watch]\nchannel_capacity = 8\n").unwrap();
        assert_eq!(c.watch.channel_capacity, 8);
        assert_eq!(c.watch.history_capacity, 1000);
        assert!(c.validate_labels);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(StoreConfig::from_toml_str("").unwrap(), StoreConfig::default());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = StoreConfig::from_toml_str("validate_labels = \"yes\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        std::fs::write(&path, "validate_labels = false\n").unwrap();
        assert!(!StoreConfig::load(&path).unwrap().validate_labels);
        assert!(StoreConfig::load(dir.path().join("missing.toml")).is_err());
    }
}

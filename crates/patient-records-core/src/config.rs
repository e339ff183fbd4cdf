//! Store configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::search::DEFAULT_SUGGESTION_THRESHOLD;
use crate::storage::DEFAULT_CAPACITY_BYTES;

/// Default key holding the `{id -> record}` blob.
pub const DEFAULT_RECORDS_KEY: &str = "patients_data";

/// Default key holding the id manifest.
pub const DEFAULT_MANIFEST_KEY: &str = "patients_index";

/// Default key an unparsable records blob is moved to on recovery.
pub const DEFAULT_QUARANTINE_KEY: &str = "patients_data.corrupt";

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage key of the records blob.
    pub records_key: String,

    /// Storage key of the manifest.
    pub manifest_key: String,

    /// Storage key a corrupt records blob is copied to before reset.
    pub quarantine_key: String,

    /// Capacity in bytes for adapters created from this configuration.
    pub capacity_bytes: usize,

    /// Minimum similarity for fuzzy name suggestions.
    pub suggestion_threshold: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            records_key: DEFAULT_RECORDS_KEY.to_string(),
            manifest_key: DEFAULT_MANIFEST_KEY.to_string(),
            quarantine_key: DEFAULT_QUARANTINE_KEY.to_string(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            suggestion_threshold: DEFAULT_SUGGESTION_THRESHOLD,
        }
    }
}

impl StoreConfig {
    /// Set the storage keys.
    pub fn with_keys(
        mut self,
        records_key: impl Into<String>,
        manifest_key: impl Into<String>,
    ) -> Self {
        self.records_key = records_key.into();
        self.manifest_key = manifest_key.into();
        self
    }

    /// Set the quarantine key.
    pub fn with_quarantine_key(mut self, key: impl Into<String>) -> Self {
        self.quarantine_key = key.into();
        self
    }

    /// Set the storage capacity.
    pub fn with_capacity_bytes(mut self, capacity: usize) -> Self {
        self.capacity_bytes = capacity;
        self
    }

    /// Set the suggestion threshold.
    pub fn with_suggestion_threshold(mut self, threshold: f64) -> Self {
        self.suggestion_threshold = threshold;
        self
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.records_key, DEFAULT_RECORDS_KEY);
        assert_eq!(config.manifest_key, DEFAULT_MANIFEST_KEY);
        assert_eq!(config.capacity_bytes, DEFAULT_CAPACITY_BYTES);
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::default()
            .with_keys("records", "manifest")
            .with_quarantine_key("records.bad")
            .with_capacity_bytes(1024)
            .with_suggestion_threshold(0.9);

        assert_eq!(config.records_key, "records");
        assert_eq!(config.manifest_key, "manifest");
        assert_eq!(config.quarantine_key, "records.bad");
        assert_eq!(config.capacity_bytes, 1024);
        assert_eq!(config.suggestion_threshold, 0.9);
    }

    #[test]
    fn test_partial_json() {
        let config = StoreConfig::from_json(r#"{"capacity_bytes": 2048}"#).unwrap();
        assert_eq!(config.capacity_bytes, 2048);
        assert_eq!(config.records_key, DEFAULT_RECORDS_KEY);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{"records_key": "custom"}"#).unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.records_key, "custom");
    }
}

//! Manifest stored next to the records blob.
//!
//! The manifest lists record ids in index order and carries a SHA-256 of the
//! records blob it was written with. Any difference between the two keys
//! means one of them was changed behind the store's back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Id manifest for the records blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    /// Record ids in index order
    pub ids: Vec<String>,
    pub count: usize,
    /// SHA-256 hex of the records blob; empty when unknown
    pub checksum: String,
    pub updated_at: DateTime<Utc>,
}

/// Shapes the manifest key may hold.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredManifest {
    Current(Manifest),
    /// Bare id list written by older browser builds
    Legacy(Vec<String>),
}

impl Manifest {
    /// Build a manifest for `ids` and the records blob they were written with.
    pub fn new(ids: Vec<String>, records_blob: &str) -> Self {
        Self {
            version: MANIFEST_VERSION,
            count: ids.len(),
            ids,
            checksum: hash_data(records_blob.as_bytes()),
            updated_at: Utc::now(),
        }
    }

    /// Parse either the current manifest or a legacy bare id list.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<StoredManifest>(raw).ok()? {
            StoredManifest::Current(manifest) => Some(manifest),
            StoredManifest::Legacy(ids) => Some(Self {
                version: 0,
                count: ids.len(),
                ids,
                checksum: String::new(),
                updated_at: Utc::now(),
            }),
        }
    }

    /// Whether this manifest was written for exactly `records_blob`.
    /// Only legacy id lists may omit the checksum.
    pub fn matches_blob(&self, records_blob: &str) -> bool {
        if self.checksum.is_empty() {
            return self.version == 0;
        }
        self.checksum == hash_data(records_blob.as_bytes())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// SHA-256 hex digest.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

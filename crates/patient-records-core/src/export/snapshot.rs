//! Backup snapshot format.
//!
//! A snapshot is a self-describing JSON document: a manifest (format tag,
//! version, timestamp, record count, checksum), the ids in index order, and
//! the records keyed by id, the same shape as the durable records blob.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::format_violations;
use crate::store::{hash_data, RecordMap};

/// Format tag written into every snapshot.
pub const SNAPSHOT_FORMAT: &str = "patient-records-backup";

/// Current snapshot version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifest {
    /// Always [`SNAPSHOT_FORMAT`]
    pub format: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
    /// SHA-256 hex of the canonical JSON of `records`
    pub checksum: String,
}

/// Full copy of the store's durable state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub manifest: SnapshotManifest,
    /// Record ids in index order
    pub ids: Vec<String>,
    pub records: RecordMap,
}

impl Snapshot {
    /// Build a snapshot of `records` with index order `ids`.
    pub fn new(ids: Vec<String>, records: RecordMap) -> Result<Self, serde_json::Error> {
        let checksum = records_checksum(&records)?;
        Ok(Self {
            manifest: SnapshotManifest {
                format: SNAPSHOT_FORMAT.to_string(),
                version: SNAPSHOT_VERSION,
                created_at: Utc::now(),
                record_count: records.len(),
                checksum,
            },
            ids,
            records,
        })
    }

    /// Check the snapshot is complete and self-consistent.
    ///
    /// Returns the first problem found. Every record must also be stored in
    /// sanitized form under a trimmed key and pass validation.
    pub fn verify(&self) -> Result<(), String> {
        if self.manifest.format != SNAPSHOT_FORMAT {
            return Err(format!("unknown format {:?}", self.manifest.format));
        }
        if self.manifest.version == 0 || self.manifest.version > SNAPSHOT_VERSION {
            return Err(format!("unsupported version {}", self.manifest.version));
        }
        if self.manifest.record_count != self.records.len() {
            return Err(format!(
                "manifest declares {} records, snapshot holds {}",
                self.manifest.record_count,
                self.records.len()
            ));
        }

        let mut seen = HashSet::new();
        for id in &self.ids {
            if !seen.insert(id.as_str()) {
                return Err(format!("duplicate id {} in id list", id));
            }
            if !self.records.contains_key(id) {
                return Err(format!("id {} listed without a record", id));
            }
        }
        if seen.len() != self.records.len() {
            return Err("id list does not cover every record".to_string());
        }

        for (key, record) in &self.records {
            if key.is_empty() || key.trim() != key {
                return Err(format!("record key {:?} is blank or padded", key));
            }
            if record.id != *key {
                return Err(format!("record under key {} carries id {}", key, record.id));
            }
            if record.updated_at < record.created_at {
                return Err(format!("record {} was updated before it was created", key));
            }
            if record.clone().sanitize() != *record {
                return Err(format!("record {} is not in sanitized form", key));
            }
            let violations = record.validate();
            if !violations.is_empty() {
                return Err(format!(
                    "record {} is invalid: {}",
                    key,
                    format_violations(&violations)
                ));
            }
        }

        let actual = records_checksum(&self.records).map_err(|e| e.to_string())?;
        if actual != self.manifest.checksum {
            return Err("checksum mismatch".to_string());
        }

        Ok(())
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON. Does not [`verify`](Self::verify).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write the JSON document to a file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_json()?)
    }

    /// Read a JSON document from a file.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(Into::into)
    }
}

/// SHA-256 hex of the canonical (key-ordered, compact) JSON of `records`.
pub fn records_checksum(records: &RecordMap) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(records)?;
    Ok(hash_data(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;

    fn make_snapshot() -> Snapshot {
        let mut records = RecordMap::new();
        let mut ids = Vec::new();
        for (first, last) in [("John", "Doe"), ("Amal", "Haddad")] {
            let p = Patient::new(first, last, "1980-01-01", "Oran", "male");
            ids.push(p.id.clone());
            records.insert(p.id.clone(), p);
        }
        Snapshot::new(ids, records).unwrap()
    }

    #[test]
    fn test_new_snapshot_verifies() {
        let snapshot = make_snapshot();
        assert_eq!(snapshot.manifest.record_count, 2);
        assert_eq!(snapshot.manifest.format, SNAPSHOT_FORMAT);
        assert!(snapshot.verify().is_ok());
    }

    #[test]
    fn test_json_roundtrip_keeps_checksum_valid() {
        let snapshot = make_snapshot();
        let parsed = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
        assert!(parsed.verify().is_ok());
    }

    #[test]
    fn test_tampered_record_fails_checksum() {
        let mut snapshot = make_snapshot();
        let id = snapshot.ids[0].clone();
        snapshot.records.get_mut(&id).unwrap().first_name = "Johnny".into();
        assert_eq!(snapshot.verify().unwrap_err(), "checksum mismatch");
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut snapshot = make_snapshot();
        snapshot.manifest.record_count = 5;
        assert!(snapshot.verify().unwrap_err().contains("declares 5"));
    }

    #[test]
    fn test_id_list_must_cover_records() {
        let mut snapshot = make_snapshot();
        snapshot.ids.pop();
        assert!(snapshot.verify().is_err());

        let mut snapshot = make_snapshot();
        snapshot.ids.push("ghost".into());
        assert!(snapshot.verify().unwrap_err().contains("ghost"));
    }

    #[test]
    fn test_invalid_record_rejected() {
        let mut records = RecordMap::new();
        let mut p = Patient::new("John", "Doe", "1980-01-01", "Oran", "male");
        p.gender = String::new();
        records.insert(p.id.clone(), p.clone());
        let snapshot = Snapshot::new(vec![p.id.clone()], records).unwrap();

        assert!(snapshot.verify().unwrap_err().contains("gender"));
    }

    fn single_record_snapshot(key: &str, patient: Patient) -> Snapshot {
        let mut records = RecordMap::new();
        records.insert(key.to_string(), patient);
        Snapshot::new(vec![key.to_string()], records).unwrap()
    }

    #[test]
    fn test_blank_or_padded_key_rejected() {
        for key in ["", "  ", " padded "] {
            let mut p = Patient::new("John", "Doe", "1980-01-01", "Oran", "male");
            p.id = key.to_string();
            let err = single_record_snapshot(key, p).verify().unwrap_err();
            assert!(err.contains("blank or padded"), "key {key:?}: {err}");
        }
    }

    #[test]
    fn test_unsanitized_record_rejected() {
        let p = Patient::new("  John ", "Doe", "1980-01-01", "Oran", "MALE");
        let id = p.id.clone();
        let err = single_record_snapshot(&id, p).verify().unwrap_err();
        assert!(err.contains("sanitized"));
    }

    #[test]
    fn test_wrong_format_rejected() {
        let mut snapshot = make_snapshot();
        snapshot.manifest.format = "something-else".into();
        assert!(snapshot.verify().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let snapshot = make_snapshot();

        snapshot.write_to_file(&path).unwrap();
        let read = Snapshot::read_from_file(&path).unwrap();
        assert_eq!(read, snapshot);
    }
}

//! Consistency checks between the records blob, the manifest and the index.
//!
//! The records blob is the source of truth. The manifest and the index are
//! derived from it, so [`PatientStore::repair`] only ever rewrites those two.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{
    build_index, ordered_ids, parse_records, reconcile_embedded_ids, Manifest, PatientStore,
    StoreResult,
};
use crate::storage::KeyValueStore;

/// Broad class of an [`Inconsistency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// The index holds an entry with no durable record
    OrphanIndexEntry,
    /// A durable record has no index entry
    MissingIndexEntry,
    /// The manifest disagrees with the records blob
    ManifestDivergence,
}

/// A single detected inconsistency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inconsistency {
    OrphanIndexEntry { id: String },
    MissingIndexEntry { id: String },
    /// Durable record the manifest does not list
    UnlistedRecord { id: String },
    /// Manifest id with no durable record
    UnknownManifestId { id: String },
    ManifestMissing,
    ManifestUnreadable,
    ManifestCountMismatch { declared: usize, actual: usize },
    /// Manifest was written for a different records blob
    ChecksumMismatch,
}

impl Inconsistency {
    pub fn kind(&self) -> InconsistencyKind {
        match self {
            Inconsistency::OrphanIndexEntry { .. } => InconsistencyKind::OrphanIndexEntry,
            Inconsistency::MissingIndexEntry { .. } => InconsistencyKind::MissingIndexEntry,
            _ => InconsistencyKind::ManifestDivergence,
        }
    }
}

/// Result of [`PatientStore::health_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Records in the durable blob
    pub record_count: usize,
    /// Ids listed by the manifest, when it is readable
    pub manifest_count: Option<usize>,
    /// Entries in the in-memory index
    pub index_count: usize,
    pub issues: Vec<Inconsistency>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    /// Whether any issue of `kind` was found.
    pub fn has(&self, kind: InconsistencyKind) -> bool {
        self.issues.iter().any(|issue| issue.kind() == kind)
    }

    /// Ids of orphan index entries.
    pub fn orphan_ids(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                Inconsistency::OrphanIndexEntry { id } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Ids of durable records missing from the index.
    pub fn missing_ids(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                Inconsistency::MissingIndexEntry { id } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Result of [`PatientStore::repair`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Health before the repair
    pub before: HealthReport,
    /// Records now indexed
    pub record_count: usize,
    /// Records whose embedded id was aligned with their key
    pub reconciled_ids: usize,
}

impl<S: KeyValueStore> PatientStore<S> {
    /// Compare the records blob, the manifest and the index.
    ///
    /// Fails with `StorageCorrupted` when the records blob cannot be parsed,
    /// since nothing can be reconciled against it.
    pub fn health_check(&self) -> StoreResult<HealthReport> {
        self.ensure_ready()?;

        let blob = self.read_records_blob()?;
        let records = parse_records(&blob)?;
        let mut issues = Vec::new();

        let index_ids: HashSet<&str> = self.index.iter().map(|e| e.id.as_str()).collect();
        for entry in &self.index {
            if !records.contains_key(&entry.id) {
                issues.push(Inconsistency::OrphanIndexEntry {
                    id: entry.id.clone(),
                });
            }
        }
        for id in records.keys() {
            if !index_ids.contains(id.as_str()) {
                issues.push(Inconsistency::MissingIndexEntry { id: id.clone() });
            }
        }

        let manifest_count = match self.storage.get(&self.config.manifest_key)? {
            None => {
                issues.push(Inconsistency::ManifestMissing);
                None
            }
            Some(raw) => match Manifest::parse(&raw) {
                None => {
                    issues.push(Inconsistency::ManifestUnreadable);
                    None
                }
                Some(manifest) => {
                    check_manifest(&manifest, &records, &blob, &mut issues);
                    Some(manifest.ids.len())
                }
            },
        };

        Ok(HealthReport {
            record_count: records.len(),
            manifest_count,
            index_count: self.index.len(),
            issues,
        })
    }

    /// Rebuild the index from the records blob and rewrite the manifest.
    ///
    /// Never adds or drops a record. The only change made to the records blob
    /// is aligning embedded ids with their keys, written together with the
    /// manifest so a failed write leaves the blob as it was. Index order is
    /// kept for surviving
    /// entries; records the index did not know are appended in manifest
    /// order, then key order. Running it twice gives the same index.
    pub fn repair(&mut self) -> StoreResult<RepairReport> {
        let before = self.health_check()?;

        let mut records = self.read_records()?;
        let reconciled_ids = reconcile_embedded_ids(&mut records);

        let mut preferred = self.index_ids();
        if let Some(manifest) = self.read_manifest()? {
            preferred.extend(manifest.ids);
        }
        let ids = ordered_ids(&records, Some(preferred.as_slice()));

        if reconciled_ids > 0 {
            // Embedded ids are the one part of the blob repair rewrites
            self.write_state(&records, ids.clone())?;
        } else {
            let blob = self.read_records_blob()?;
            self.write_manifest(ids.clone(), &blob)?;
        }
        self.index = build_index(&records, &ids);

        tracing::info!(
            records = self.index.len(),
            issues = before.issues.len(),
            reconciled_ids,
            "Repaired patient store"
        );

        Ok(RepairReport {
            before,
            record_count: self.index.len(),
            reconciled_ids,
        })
    }
}

fn check_manifest(
    manifest: &Manifest,
    records: &super::RecordMap,
    blob: &str,
    issues: &mut Vec<Inconsistency>,
) {
    let listed: HashSet<&str> = manifest.ids.iter().map(String::as_str).collect();

    for id in records.keys() {
        if !listed.contains(id.as_str()) {
            issues.push(Inconsistency::UnlistedRecord { id: id.clone() });
        }
    }
    for id in &manifest.ids {
        if !records.contains_key(id) {
            issues.push(Inconsistency::UnknownManifestId { id: id.clone() });
        }
    }
    if manifest.count != manifest.ids.len() || manifest.ids.len() != records.len() {
        issues.push(Inconsistency::ManifestCountMismatch {
            declared: manifest.count,
            actual: records.len(),
        });
    }
    if !manifest.matches_blob(blob) {
        issues.push(Inconsistency::ChecksumMismatch);
    }
}

//! Backup, restore, merge-import and export.

use serde::{Deserialize, Serialize};

use super::{build_index, ordered_ids, PatientStore, StoreError, StoreResult};
use crate::export::{index_to_csv, Snapshot};
use crate::models::{IndexEntry, Violation};
use crate::storage::KeyValueStore;

/// Outcome of [`PatientStore::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Ids written, in the order they were applied
    pub imported: Vec<String>,
    /// Records left out, with the reason
    pub rejected: Vec<RejectedRecord>,
}

/// A record [`PatientStore::merge`] refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Key the record was stored under in the snapshot
    pub id: String,
    pub violations: Vec<Violation>,
}

impl<S: KeyValueStore> PatientStore<S> {
    /// Snapshot of all durable records in index order. Read-only.
    pub fn backup(&self) -> StoreResult<Snapshot> {
        self.ensure_ready()?;

        let records = self.read_records()?;
        let index_ids = self.index_ids();
        let ids = ordered_ids(&records, Some(index_ids.as_slice()));
        Ok(Snapshot::new(ids, records)?)
    }

    /// Replace all durable state with `snapshot` and rebuild the index.
    ///
    /// The snapshot is verified first; any problem rejects it entirely and
    /// leaves the store untouched. Returns the number of restored records.
    pub fn restore(&mut self, snapshot: Snapshot) -> StoreResult<usize> {
        self.ensure_ready()?;
        snapshot.verify().map_err(StoreError::InvalidSnapshot)?;

        let Snapshot { ids, records, .. } = snapshot;
        self.write_state(&records, ids.clone())?;
        self.index = build_index(&records, &ids);

        tracing::info!(records = self.index.len(), "Restored patient store from snapshot");
        Ok(self.index.len())
    }

    /// Upsert every valid record of `snapshot` in one write.
    ///
    /// Unlike [`restore`](Self::restore) this keeps existing records and does
    /// not require the snapshot to be internally consistent: each record is
    /// sanitized and validated on its own and invalid ones are reported. A
    /// record stored under a blank key with no id of its own gets a new id.
    pub fn merge(&mut self, snapshot: Snapshot) -> StoreResult<MergeReport> {
        self.ensure_ready()?;

        let Snapshot {
            ids: snapshot_ids,
            records: incoming,
            ..
        } = snapshot;
        let order = ordered_ids(&incoming, Some(snapshot_ids.as_slice()));
        let mut incoming = incoming;

        let mut records = self.read_records()?;
        let mut ids = self.index_ids();
        let mut report = MergeReport::default();
        let mut entries = Vec::new();

        for key in order {
            let Some(mut record) = incoming.remove(&key) else {
                continue;
            };
            if record.id.trim().is_empty() {
                record.id = key.clone();
            }

            let mut record = match record.sanitize_and_validate() {
                Ok(record) => record,
                Err(violations) => {
                    report.rejected.push(RejectedRecord { id: key, violations });
                    continue;
                }
            };
            if record.id.is_empty() {
                record.id = uuid::Uuid::new_v4().to_string();
            } else if record.id != key {
                report.rejected.push(RejectedRecord {
                    id: key,
                    violations: vec![Violation::new("id", "does not match its key")],
                });
                continue;
            }

            if let Some(existing) = records.get(&record.id) {
                record.created_at = existing.created_at;
            }
            record.touch();

            if !ids.contains(&record.id) {
                ids.push(record.id.clone());
            }
            entries.push(IndexEntry::from_patient(&record));
            report.imported.push(record.id.clone());
            records.insert(record.id.clone(), record);
        }

        if report.imported.is_empty() {
            return Ok(report);
        }

        self.write_state(&records, ids)?;
        for entry in entries {
            match self.index_position(&entry.id) {
                Some(pos) => self.index[pos] = entry,
                None => self.index.push(entry),
            }
        }

        tracing::info!(
            imported = report.imported.len(),
            rejected = report.rejected.len(),
            "Merged snapshot into patient store"
        );
        Ok(report)
    }

    /// [`backup`](Self::backup) as a pretty JSON document.
    pub fn backup_json(&self) -> StoreResult<String> {
        Ok(self.backup()?.to_json()?)
    }

    /// [`restore`](Self::restore) from a JSON document.
    pub fn restore_json(&mut self, json: &str) -> StoreResult<usize> {
        let snapshot = Snapshot::from_json(json)
            .map_err(|e| StoreError::InvalidSnapshot(format!("malformed document: {}", e)))?;
        self.restore(snapshot)
    }

    /// The index as CSV, in index order.
    pub fn export_index_csv(&self) -> StoreResult<String> {
        self.ensure_ready()?;
        Ok(index_to_csv(&self.index))
    }
}

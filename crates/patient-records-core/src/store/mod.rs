//! Patient store: durable records, in-memory index, search, backup and repair.
//!
//! Durable state lives in two keys of a [`KeyValueStore`]: a JSON object of
//! records keyed by id, and a [`Manifest`] listing the ids in index order.
//! Every mutation rewrites the records blob in full, then the manifest, then
//! updates the index, so the three agree whenever control returns to the
//! caller. Searches never read storage; they scan the index.

mod backup;
mod crud;
mod health;
mod manifest;
mod query;
#[cfg(test)]
mod test_support;

pub use backup::*;
pub use health::*;
pub use manifest::*;

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::config::StoreConfig;
use crate::models::{format_violations, IndexEntry, Patient, Violation};
use crate::storage::{KeyValueStore, StorageError};

/// Durable records keyed by id.
pub type RecordMap = BTreeMap<String, Patient>;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store is not initialized")]
    NotInitialized,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation failed: {}", format_violations(.0))]
    ValidationFailed(Vec<Violation>),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage corrupted: {0}")]
    StorageCorrupted(String),

    #[error("Storage capacity exceeded: {requested} bytes requested, capacity is {capacity} bytes")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::CapacityExceeded {
                requested,
                capacity,
            } => StoreError::CapacityExceeded {
                requested,
                capacity,
            },
            other => StoreError::Storage(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of [`PatientStore::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Records loaded into the index
    pub record_count: usize,
    /// The records blob was unparsable and the store was reset to empty
    pub recovered_from_corruption: bool,
    /// The manifest was missing or stale and was rewritten
    pub manifest_rewritten: bool,
}

/// Owner of durable patient records and their index.
pub struct PatientStore<S: KeyValueStore> {
    storage: S,
    config: StoreConfig,
    /// Index entries in insertion order
    index: Vec<IndexEntry>,
    ready: bool,
}

impl<S: KeyValueStore> PatientStore<S> {
    /// Create a store over `storage` with the default configuration.
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, StoreConfig::default())
    }

    /// Create a store over `storage`.
    pub fn with_config(storage: S, config: StoreConfig) -> Self {
        Self {
            storage,
            config,
            index: Vec::new(),
            ready: false,
        }
    }

    /// Load durable state and build the index.
    ///
    /// Missing keys are created empty. An unparsable records blob is copied to
    /// the quarantine key and the store starts empty instead of failing.
    pub fn initialize(&mut self) -> StoreResult<InitReport> {
        let mut recovered = false;

        let mut records = match self.storage.get(&self.config.records_key)? {
            None => {
                self.storage.set(&self.config.records_key, "{}")?;
                RecordMap::new()
            }
            Some(raw) => match serde_json::from_str::<RecordMap>(&raw) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        key = %self.config.records_key,
                        "Records blob is unparsable, resetting store to empty"
                    );
                    self.quarantine(&raw);
                    self.storage.set(&self.config.records_key, "{}")?;
                    recovered = true;
                    RecordMap::new()
                }
            },
        };

        let reconciled = reconcile_embedded_ids(&mut records);
        let blob = if reconciled > 0 {
            tracing::warn!(count = reconciled, "Record ids disagreed with their keys, rewrote them");
            let blob = serde_json::to_string(&records)?;
            self.storage.set(&self.config.records_key, &blob)?;
            blob
        } else {
            self.storage
                .get(&self.config.records_key)?
                .unwrap_or_else(|| "{}".to_string())
        };

        let manifest = self.read_manifest()?;
        let ids = ordered_ids(&records, manifest.as_ref().map(|m| m.ids.as_slice()));

        let manifest_current = manifest
            .as_ref()
            .is_some_and(|m| {
                m.version == MANIFEST_VERSION
                    && m.ids == ids
                    && m.count == ids.len()
                    && m.matches_blob(&blob)
            });
        if !manifest_current {
            if manifest.is_some() {
                tracing::warn!(key = %self.config.manifest_key, "Manifest out of date, rewriting");
            }
            self.write_manifest(ids.clone(), &blob)?;
        }

        self.index = build_index(&records, &ids);
        self.ready = true;

        tracing::info!(
            records = self.index.len(),
            recovered,
            "Patient store initialized"
        );

        Ok(InitReport {
            record_count: self.index.len(),
            recovered_from_corruption: recovered,
            manifest_rewritten: !manifest_current,
        })
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Underlying storage adapter.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable access to the storage adapter. Writes made through it bypass
    /// the index; run [`health_check`](Self::health_check) or
    /// [`repair`](Self::repair) afterwards.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Consume the store and return its storage adapter.
    pub fn into_storage(self) -> S {
        self.storage
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn ensure_ready(&self) -> StoreResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    fn read_records_blob(&self) -> StoreResult<String> {
        Ok(self
            .storage
            .get(&self.config.records_key)?
            .unwrap_or_else(|| "{}".to_string()))
    }

    fn read_records(&self) -> StoreResult<RecordMap> {
        let blob = self.read_records_blob()?;
        parse_records(&blob)
    }

    fn read_manifest(&self) -> StoreResult<Option<Manifest>> {
        let Some(raw) = self.storage.get(&self.config.manifest_key)? else {
            return Ok(None);
        };
        let manifest = Manifest::parse(&raw);
        if manifest.is_none() {
            tracing::warn!(key = %self.config.manifest_key, "Manifest is unparsable");
        }
        Ok(manifest)
    }

    fn write_manifest(&mut self, ids: Vec<String>, records_blob: &str) -> StoreResult<()> {
        let manifest = Manifest::new(ids, records_blob);
        self.storage
            .set(&self.config.manifest_key, &manifest.to_json()?)?;
        Ok(())
    }

    /// Write the records blob and its manifest.
    ///
    /// If the manifest write fails the previous records blob is put back, so
    /// the two keys never disagree after an error.
    fn write_state(&mut self, records: &RecordMap, ids: Vec<String>) -> StoreResult<()> {
        let blob = serde_json::to_string(records)?;
        let previous = self.storage.get(&self.config.records_key)?;

        self.storage.set(&self.config.records_key, &blob)?;

        if let Err(e) = self.write_manifest(ids, &blob) {
            let rollback = match &previous {
                Some(prev) => self.storage.set(&self.config.records_key, prev),
                None => self.storage.remove(&self.config.records_key),
            };
            if let Err(rollback_err) = rollback {
                tracing::error!(
                    error = %rollback_err,
                    "Failed to restore records blob after manifest write failure"
                );
            }
            return Err(e);
        }

        Ok(())
    }

    /// Copy an unparsable blob aside. Best effort: failure only logs.
    fn quarantine(&mut self, raw: &str) {
        if let Err(e) = self.storage.set(&self.config.quarantine_key, raw) {
            tracing::warn!(
                error = %e,
                key = %self.config.quarantine_key,
                "Could not quarantine corrupt records blob"
            );
        }
    }

    fn index_position(&self, id: &str) -> Option<usize> {
        self.index.iter().position(|entry| entry.id == id)
    }

    fn index_ids(&self) -> Vec<String> {
        self.index.iter().map(|entry| entry.id.clone()).collect()
    }
}

fn parse_records(blob: &str) -> StoreResult<RecordMap> {
    serde_json::from_str(blob)
        .map_err(|e| StoreError::StorageCorrupted(format!("records blob is unparsable: {}", e)))
}

/// Make each record's embedded id equal its map key. Returns how many changed.
fn reconcile_embedded_ids(records: &mut RecordMap) -> usize {
    let mut changed = 0;
    for (key, record) in records.iter_mut() {
        if record.id != *key {
            record.id = key.clone();
            changed += 1;
        }
    }
    changed
}

/// Ids of `records` in index order: ids from `preferred` that still exist,
/// then the rest in key order.
fn ordered_ids(records: &RecordMap, preferred: Option<&[String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(records.len());

    for id in preferred.unwrap_or_default() {
        if records.contains_key(id) && seen.insert(id.as_str()) {
            ids.push(id.clone());
        }
    }
    for id in records.keys() {
        if seen.insert(id.as_str()) {
            ids.push(id.clone());
        }
    }
    ids
}

fn build_index(records: &RecordMap, ids: &[String]) -> Vec<IndexEntry> {
    ids.iter()
        .filter_map(|id| records.get(id))
        .map(IndexEntry::from_patient)
        .collect()
}

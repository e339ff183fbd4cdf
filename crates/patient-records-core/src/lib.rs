//! Patient Records Core Library
//!
//! Local-first patient record storage with an in-memory search index.
//!
//! # Architecture
//!
//! ```text
//!   UI / session layer
//!          │
//!          ▼
//!   PatientStore ── sanitize + validate ──► Patient
//!      │      │
//!      │      └──────────────► in-memory index ◄── search / suggest
//!      ▼
//!   KeyValueStore (capacity bounded)
//!      ├─ records key   {id -> Patient}
//!      └─ manifest key  {ids, count, sha256(records)}
//! ```
//!
//! # Core Principle
//!
//! **The records blob is the source of truth.** The manifest and the index are
//! derived from it and are rewritten together on every mutation.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Patient, Visit, IndexEntry, Violation)
//! - [`search`]: Name normalization, matching and fuzzy suggestions
//! - [`storage`]: Key/value adapters (memory, SQLite)
//! - [`store`]: The patient store (CRUD, search, backup/restore, health/repair)
//! - [`export`]: Backup snapshot format and CSV export
//! - [`config`]: Store configuration

pub mod config;
pub mod export;
pub mod models;
pub mod search;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::StoreConfig;
pub use export::Snapshot;
pub use models::{IndexEntry, Patient, Violation, Visit};
pub use storage::{KeyValueStore, MemoryStorage, SqliteStorage, StorageError};
pub use store::{
    HealthReport, Inconsistency, InconsistencyKind, MergeReport, PatientStore, RepairReport,
    StoreError, StoreResult,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PatientRecordsError {
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage corrupted: {0}")]
    StorageCorrupted(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StoreError> for PatientRecordsError {
    fn from(e: StoreError) -> Self {
        let message = e.to_string();
        match e {
            StoreError::NotInitialized => PatientRecordsError::NotInitialized(message),
            StoreError::InvalidArgument(_) => PatientRecordsError::InvalidInput(message),
            StoreError::ValidationFailed(violations) => {
                PatientRecordsError::ValidationFailed(models::format_violations(&violations))
            }
            StoreError::NotFound(id) => PatientRecordsError::NotFound(id),
            StoreError::StorageCorrupted(_) => PatientRecordsError::StorageCorrupted(message),
            StoreError::CapacityExceeded { .. } => PatientRecordsError::CapacityExceeded(message),
            StoreError::InvalidSnapshot(_) => PatientRecordsError::InvalidBackup(message),
            StoreError::Storage(_) | StoreError::Io(_) => PatientRecordsError::StorageError(message),
            StoreError::Json(_) => PatientRecordsError::SerializationError(message),
        }
    }
}

impl From<StorageError> for PatientRecordsError {
    fn from(e: StorageError) -> Self {
        StoreError::from(e).into()
    }
}

impl<T> From<std::sync::PoisonError<T>> for PatientRecordsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PatientRecordsError::StorageError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a store backed by a SQLite file at the given path.
#[uniffi::export]
pub fn open_store(path: String) -> Result<Arc<PatientRecordsCore>, PatientRecordsError> {
    let config = StoreConfig::default();
    let storage = SqliteStorage::open(&path)?.with_capacity(config.capacity_bytes);
    PatientRecordsCore::initialize(PatientStore::with_config(storage, config))
}

/// Create an in-memory store (for testing).
#[uniffi::export]
pub fn open_store_in_memory() -> Result<Arc<PatientRecordsCore>, PatientRecordsError> {
    let storage = SqliteStorage::open_in_memory()?;
    PatientRecordsCore::initialize(PatientStore::new(storage))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe store wrapper for FFI.
#[derive(uniffi::Object)]
pub struct PatientRecordsCore {
    store: Arc<Mutex<PatientStore<SqliteStorage>>>,
}

impl PatientRecordsCore {
    fn initialize(
        mut store: PatientStore<SqliteStorage>,
    ) -> Result<Arc<Self>, PatientRecordsError> {
        store.initialize()?;
        Ok(Arc::new(Self {
            store: Arc::new(Mutex::new(store)),
        }))
    }
}

#[uniffi::export]
impl PatientRecordsCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Create or update a patient. Returns the id.
    pub fn save_patient(&self, patient: FfiPatient) -> Result<String, PatientRecordsError> {
        let mut store = self.store.lock()?;
        Ok(store.save(patient.into())?)
    }

    /// Get a patient by id.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, PatientRecordsError> {
        let store = self.store.lock()?;
        let patient = store.load(&id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Delete a patient. Returns the deleted id.
    pub fn delete_patient(&self, id: String) -> Result<String, PatientRecordsError> {
        let mut store = self.store.lock()?;
        Ok(store.delete(&id)?)
    }

    /// Search patients by partial name.
    pub fn search_patients(&self, term: String) -> Result<Vec<FfiIndexEntry>, PatientRecordsError> {
        let store = self.store.lock()?;
        let entries = store.search_patients(&term)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    /// List all patients in index order.
    pub fn list_patients(&self) -> Result<Vec<FfiIndexEntry>, PatientRecordsError> {
        let store = self.store.lock()?;
        let entries = store.list_patients()?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    /// Fuzzy name suggestions, best first.
    pub fn suggest_patients(
        &self,
        term: String,
        limit: u32,
    ) -> Result<Vec<FfiSuggestion>, PatientRecordsError> {
        let store = self.store.lock()?;
        let suggestions = store.suggest_patients(&term, limit as usize)?;
        Ok(suggestions
            .into_iter()
            .map(|s| FfiSuggestion {
                entry: s.entry.into(),
                score: s.score,
            })
            .collect())
    }

    // =========================================================================
    // Backup Operations
    // =========================================================================

    /// Export a full backup as JSON.
    pub fn export_backup_json(&self) -> Result<String, PatientRecordsError> {
        let store = self.store.lock()?;
        Ok(store.backup_json()?)
    }

    /// Replace all records with a JSON backup. Returns the record count.
    pub fn restore_backup_json(&self, json: String) -> Result<u32, PatientRecordsError> {
        let mut store = self.store.lock()?;
        Ok(store.restore_json(&json)? as u32)
    }

    /// Export the patient index as CSV.
    pub fn export_index_csv(&self) -> Result<String, PatientRecordsError> {
        let store = self.store.lock()?;
        Ok(store.export_index_csv()?)
    }

    // =========================================================================
    // Maintenance Operations
    // =========================================================================

    /// Check consistency of durable state and the index.
    pub fn health_check(&self) -> Result<FfiHealthReport, PatientRecordsError> {
        let store = self.store.lock()?;
        Ok(store.health_check()?.into())
    }

    /// Rebuild derived state. Returns the health report from before the repair.
    pub fn repair(&self) -> Result<FfiHealthReport, PatientRecordsError> {
        let mut store = self.store.lock()?;
        Ok(store.repair()?.before.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    /// Empty for a new patient
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub place_of_residence: String,
    pub gender: String,
    pub age: Option<u32>,
    pub visits: Vec<FfiVisit>,
    /// RFC 3339; empty for a new patient
    pub created_at: String,
    /// RFC 3339; empty for a new patient
    pub updated_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            date_of_birth: patient.date_of_birth,
            place_of_residence: patient.place_of_residence,
            gender: patient.gender,
            age: patient.age,
            visits: patient.visits.into_iter().map(|v| v.into()).collect(),
            created_at: patient.created_at.to_rfc3339(),
            updated_at: patient.updated_at.to_rfc3339(),
        }
    }
}

impl From<FfiPatient> for Patient {
    fn from(patient: FfiPatient) -> Self {
        let created_at = parse_timestamp(&patient.created_at);
        Patient {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            date_of_birth: patient.date_of_birth,
            place_of_residence: patient.place_of_residence,
            gender: patient.gender,
            age: patient.age,
            visits: patient.visits.into_iter().map(|v| v.into()).collect(),
            created_at,
            updated_at: parse_timestamp(&patient.updated_at).max(created_at),
        }
    }
}

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub date: String,
    pub reason: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
}

impl From<Visit> for FfiVisit {
    fn from(visit: Visit) -> Self {
        Self {
            date: visit.date,
            reason: visit.reason,
            diagnosis: visit.diagnosis,
            notes: visit.notes,
        }
    }
}

impl From<FfiVisit> for Visit {
    fn from(visit: FfiVisit) -> Self {
        Visit {
            date: visit.date,
            reason: visit.reason,
            diagnosis: visit.diagnosis,
            notes: visit.notes,
        }
    }
}

/// FFI-safe index entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIndexEntry {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub age: Option<u32>,
    pub gender: String,
    pub place_of_residence: String,
    pub last_visit_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<IndexEntry> for FfiIndexEntry {
    fn from(entry: IndexEntry) -> Self {
        Self {
            id: entry.id,
            first_name: entry.first_name,
            last_name: entry.last_name,
            full_name: entry.full_name,
            age: entry.age,
            gender: entry.gender,
            place_of_residence: entry.place_of_residence,
            last_visit_date: entry.last_visit_date,
            created_at: entry.created_at.to_rfc3339(),
            updated_at: entry.updated_at.to_rfc3339(),
        }
    }
}

/// FFI-safe name suggestion.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSuggestion {
    pub entry: FfiIndexEntry,
    pub score: f64,
}

/// FFI-safe health report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHealthReport {
    pub healthy: bool,
    pub record_count: u32,
    pub manifest_count: Option<u32>,
    pub index_count: u32,
    pub orphan_ids: Vec<String>,
    pub missing_ids: Vec<String>,
    pub manifest_diverged: bool,
    /// One line per issue
    pub issues: Vec<String>,
}

impl From<HealthReport> for FfiHealthReport {
    fn from(report: HealthReport) -> Self {
        Self {
            healthy: report.is_healthy(),
            record_count: report.record_count as u32,
            manifest_count: report.manifest_count.map(|c| c as u32),
            index_count: report.index_count as u32,
            orphan_ids: report.orphan_ids().into_iter().map(String::from).collect(),
            missing_ids: report.missing_ids().into_iter().map(String::from).collect(),
            manifest_diverged: report.has(InconsistencyKind::ManifestDivergence),
            issues: report.issues.iter().map(|i| format!("{:?}", i)).collect(),
        }
    }
}

/// Parse an RFC 3339 timestamp, falling back to now for empty or bad input.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

//! Create, read, update and delete.

use super::{PatientStore, StoreError, StoreResult};
use crate::models::{IndexEntry, Patient};
use crate::storage::KeyValueStore;

impl<S: KeyValueStore> PatientStore<S> {
    /// Insert or update a patient. Returns the record id.
    ///
    /// The record is sanitized and validated first; on any violation nothing
    /// is written. A missing id is generated. `created_at` of an existing
    /// record is kept and `updated_at` is refreshed.
    pub fn save(&mut self, patient: Patient) -> StoreResult<String> {
        self.ensure_ready()?;

        let mut patient = patient
            .sanitize_and_validate()
            .map_err(StoreError::ValidationFailed)?;
        if patient.id.is_empty() {
            patient.id = uuid::Uuid::new_v4().to_string();
        }

        let mut records = self.read_records()?;
        let created = match records.get(&patient.id) {
            Some(existing) => {
                patient.created_at = existing.created_at;
                false
            }
            None => true,
        };
        patient.touch();

        let id = patient.id.clone();
        let entry = IndexEntry::from_patient(&patient);
        records.insert(id.clone(), patient);

        let mut ids = self.index_ids();
        if !ids.contains(&id) {
            ids.push(id.clone());
        }
        self.write_state(&records, ids)?;

        match self.index_position(&id) {
            Some(pos) => self.index[pos] = entry,
            None => self.index.push(entry),
        }

        tracing::debug!(id = %id, created, "Saved patient");
        Ok(id)
    }

    /// Load a patient by id. A missing record is `Ok(None)`.
    pub fn load(&self, id: &str) -> StoreResult<Option<Patient>> {
        self.ensure_ready()?;
        let id = require_id(id)?;

        Ok(self.read_records()?.remove(id))
    }

    /// Delete a patient. Returns the deleted id.
    pub fn delete(&mut self, id: &str) -> StoreResult<String> {
        self.ensure_ready()?;
        let id = require_id(id)?;

        let mut records = self.read_records()?;
        if records.remove(id).is_none() {
            if let Some(pos) = self.index_position(id) {
                tracing::warn!(id = %id, "Dropping index entry with no durable record");
                self.index.remove(pos);
            }
            return Err(StoreError::NotFound(id.to_string()));
        }

        let ids = self
            .index_ids()
            .into_iter()
            .filter(|existing| existing != id)
            .collect();
        self.write_state(&records, ids)?;

        if let Some(pos) = self.index_position(id) {
            self.index.remove(pos);
        }

        tracing::debug!(id = %id, "Deleted patient");
        Ok(id.to_string())
    }
}

fn require_id(id: &str) -> StoreResult<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(StoreError::InvalidArgument("id must not be empty".into()));
    }
    Ok(id)
}

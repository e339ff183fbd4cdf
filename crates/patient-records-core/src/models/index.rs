//! Read-optimized projection of a patient record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patient::Patient;

/// One entry of the in-memory patient index.
///
/// Entries are built and replaced by the store only; callers read them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct IndexEntry {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Trimmed `first_name last_name`
    pub full_name: String,
    pub age: Option<u32>,
    pub gender: String,
    pub place_of_residence: String,
    /// Date of the chronologically last visit
    pub last_visit_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexEntry {
    pub(crate) fn from_patient(patient: &Patient) -> Self {
        Self {
            id: patient.id.clone(),
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            full_name: patient.full_name(),
            age: patient.age,
            gender: patient.gender.clone(),
            place_of_residence: patient.place_of_residence.clone(),
            last_visit_date: patient.last_visit_date(),
            created_at: patient.created_at,
            updated_at: patient.updated_at,
        }
    }
}

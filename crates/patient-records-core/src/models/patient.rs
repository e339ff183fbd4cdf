//! Patient models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Date format used for visit dates and dates of birth.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A patient record as persisted by the store.
///
/// Field names serialize in camelCase so the durable blob stays readable by
/// the browser shell that shares the same storage keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Unique identifier, generated on first save when empty
    #[serde(default)]
    pub id: String,
    /// Given name
    #[serde(default)]
    pub first_name: String,
    /// Family name
    #[serde(default)]
    pub last_name: String,
    /// Date of birth (free text, usually `YYYY-MM-DD`)
    #[serde(default)]
    pub date_of_birth: String,
    /// Town or address of residence
    #[serde(default)]
    pub place_of_residence: String,
    /// Gender, lower-cased on save
    #[serde(default)]
    pub gender: String,
    /// Age in years, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Visits in the order they were recorded
    #[serde(default)]
    pub visits: Vec<Visit>,
    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: impl Into<String>,
        place_of_residence: impl Into<String>,
        gender: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: date_of_birth.into(),
            place_of_residence: place_of_residence.into(),
            gender: gender.into(),
            age: None,
            visits: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the recorded age.
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    /// Append a visit.
    pub fn with_visit(mut self, visit: Visit) -> Self {
        self.visits.push(visit);
        self
    }

    /// First and last name joined by a space, trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// The chronologically last visit, if any visit carries a parseable date.
    pub fn last_visit(&self) -> Option<&Visit> {
        self.visits
            .iter()
            .filter_map(|visit| visit.parsed_date().map(|date| (date, visit)))
            .max_by_key(|(date, _)| *date)
            .map(|(_, visit)| visit)
    }

    /// Date of the chronologically last visit.
    pub fn last_visit_date(&self) -> Option<String> {
        self.last_visit().map(|visit| visit.date.clone())
    }

    /// Refresh `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }
}

/// A single consultation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    /// Visit date (`YYYY-MM-DD`)
    #[serde(default)]
    pub date: String,
    /// Reason for the visit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Diagnosis recorded at the visit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    /// Free-form notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Visit {
    /// Create a visit on the given date.
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            reason: None,
            diagnosis: None,
            notes: None,
        }
    }

    /// Set the reason for the visit.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Parse the visit date.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }
}

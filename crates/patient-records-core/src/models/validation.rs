//! Field-level validation and sanitization for patient records.
//!
//! Validation always runs on the sanitized view of a record, so a required
//! field that only contains whitespace is rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::patient::{Patient, Visit};

/// Upper bound accepted for a recorded age.
pub const MAX_AGE: u32 = 150;

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    /// Serialized field name (e.g. `firstName`, `visits[2].date`)
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Join violations into one line for error messages.
pub fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Patient {
    /// Trim string fields, lower-case gender and drop emptied optional fields.
    pub fn sanitize(mut self) -> Self {
        self.id = self.id.trim().to_string();
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.date_of_birth = self.date_of_birth.trim().to_string();
        self.place_of_residence = self.place_of_residence.trim().to_string();
        self.gender = self.gender.trim().to_lowercase();
        self.visits = self.visits.into_iter().map(Visit::sanitize).collect();
        self
    }

    /// Validate required fields and visits. An empty list means valid.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("dateOfBirth", &self.date_of_birth),
            ("placeOfResidence", &self.place_of_residence),
            ("gender", &self.gender),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                violations.push(Violation::new(field, "is required"));
            }
        }

        if let Some(age) = self.age {
            if age > MAX_AGE {
                violations.push(Violation::new(
                    "age",
                    format!("must be at most {}", MAX_AGE),
                ));
            }
        }

        for (i, visit) in self.visits.iter().enumerate() {
            let field = format!("visits[{}].date", i);
            if visit.date.trim().is_empty() {
                violations.push(Violation::new(field, "is required"));
            } else if visit.parsed_date().is_none() {
                violations.push(Violation::new(field, "must be a date in YYYY-MM-DD format"));
            }
        }

        violations
    }

    /// Sanitize, then validate the sanitized record.
    pub fn sanitize_and_validate(self) -> Result<Patient, Vec<Violation>> {
        let sanitized = self.sanitize();
        let violations = sanitized.validate();
        if violations.is_empty() {
            Ok(sanitized)
        } else {
            Err(violations)
        }
    }
}

impl Visit {
    fn sanitize(mut self) -> Self {
        self.date = self.date.trim().to_string();
        self.reason = trim_optional(self.reason);
        self.diagnosis = trim_optional(self.diagnosis);
        self.notes = trim_optional(self.notes);
        self
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

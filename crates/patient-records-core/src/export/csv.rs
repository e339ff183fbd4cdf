//! CSV export of the patient index.

use crate::models::IndexEntry;

const HEADER: &str =
    "id,first_name,last_name,full_name,gender,age,place_of_residence,last_visit_date,created_at,updated_at\n";

/// Render index entries as CSV, one row per entry, in the given order.
pub fn index_to_csv(entries: &[IndexEntry]) -> String {
    let mut csv = String::from(HEADER);

    for entry in entries {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            escape_csv(&entry.id),
            escape_csv(&entry.first_name),
            escape_csv(&entry.last_name),
            escape_csv(&entry.full_name),
            escape_csv(&entry.gender),
            entry.age.map(|a| a.to_string()).unwrap_or_default(),
            escape_csv(&entry.place_of_residence),
            entry.last_visit_date.as_deref().unwrap_or(""),
            entry.created_at.to_rfc3339(),
            entry.updated_at.to_rfc3339(),
        ));
    }

    csv
}

/// Escape a CSV field.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

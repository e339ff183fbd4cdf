//! Search text normalizer.
//!
//! Handles:
//! - Case folding
//! - Punctuation stripping (anything that is not a word character or whitespace)
//! - Whitespace trimming and collapsing

use crate::models::IndexEntry;

/// Canonicalize text for matching.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Check whether an entry matches an already-normalized term.
///
/// An empty term matches every entry.
pub fn entry_matches(entry: &IndexEntry, normalized_term: &str) -> bool {
    if normalized_term.is_empty() {
        return true;
    }

    [&entry.first_name, &entry.last_name, &entry.full_name]
        .iter()
        .any(|name| normalize(name).contains(normalized_term))
}

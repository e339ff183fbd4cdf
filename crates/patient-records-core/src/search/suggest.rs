//! Fuzzy "did you mean" scoring for patient names.
//!
//! Used when a substring search comes back empty, typically because of a
//! misspelled name. Each name part is compared with Jaro-Winkler and the best
//! score wins.

use strsim::jaro_winkler;

use super::normalizer::normalize;
use crate::models::IndexEntry;

/// Default minimum similarity for a suggestion.
pub const DEFAULT_SUGGESTION_THRESHOLD: f64 = 0.75;

/// An index entry paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub entry: IndexEntry,
    /// Similarity score (0.0 - 1.0)
    pub score: f64,
}

/// Best similarity between an already-normalized term and the entry's names.
pub fn name_similarity(entry: &IndexEntry, normalized_term: &str) -> f64 {
    if normalized_term.is_empty() {
        return 0.0;
    }

    [&entry.first_name, &entry.last_name, &entry.full_name]
        .iter()
        .map(|name| jaro_winkler(&normalize(name), normalized_term))
        .fold(0.0, f64::max)
}

/// Rank entries by similarity, best first, keeping those at or above `threshold`.
pub fn rank_suggestions<'a, I>(
    entries: I,
    term: &str,
    threshold: f64,
    limit: usize,
) -> Vec<Suggestion>
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    let normalized_term = normalize(term);

    let mut scored: Vec<Suggestion> = entries
        .into_iter()
        .map(|entry| Suggestion {
            score: name_similarity(entry, &normalized_term),
            entry: entry.clone(),
        })
        .filter(|s| s.score >= threshold)
        .collect();

    // Stable sort keeps index order between equal scores
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

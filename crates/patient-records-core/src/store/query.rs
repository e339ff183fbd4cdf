//! Index queries. None of these touch storage.

use super::{PatientStore, StoreResult};
use crate::models::IndexEntry;
use crate::search::{entry_matches, normalize, rank_suggestions, Suggestion};
use crate::storage::KeyValueStore;

impl<S: KeyValueStore> PatientStore<S> {
    /// Partial, case-insensitive match of `term` against first, last and full
    /// names, in index order.
    ///
    /// An empty or whitespace-only term returns every entry. Callers that want
    /// a minimum query length enforce it themselves.
    pub fn search_patients(&self, term: &str) -> StoreResult<Vec<IndexEntry>> {
        self.ensure_ready()?;

        let normalized = normalize(term);
        Ok(self
            .index
            .iter()
            .filter(|entry| entry_matches(entry, &normalized))
            .cloned()
            .collect())
    }

    /// All index entries in index order.
    pub fn list_patients(&self) -> StoreResult<Vec<IndexEntry>> {
        self.ensure_ready()?;
        Ok(self.index.clone())
    }

    /// Index entry for one id.
    pub fn entry(&self, id: &str) -> StoreResult<Option<&IndexEntry>> {
        self.ensure_ready()?;
        Ok(self.index_position(id.trim()).map(|pos| &self.index[pos]))
    }

    /// Fuzzy name suggestions, best first, for terms that match nothing exactly.
    pub fn suggest_patients(&self, term: &str, limit: usize) -> StoreResult<Vec<Suggestion>> {
        self.ensure_ready()?;
        Ok(rank_suggestions(
            &self.index,
            term,
            self.config.suggestion_threshold,
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;
    use crate::storage::MemoryStorage;

    fn setup_store() -> PatientStore<MemoryStorage> {
        let mut store = PatientStore::new(MemoryStorage::new());
        store.initialize().unwrap();
        for (first, last) in [("John", "Doe"), ("Jane", "Doe"), ("Amal", "Haddad")] {
            store
                .save(Patient::new(first, last, "1980-01-01", "Oran", "male"))
                .unwrap();
        }
        store
    }

    fn names(entries: &[IndexEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.full_name.as_str()).collect()
    }

    #[test]
    fn test_search_by_last_name() {
        let store = setup_store();
        let results = store.search_patients("doe").unwrap();
        assert_eq!(names(&results), vec!["John Doe", "Jane Doe"]);
    }

    #[test]
    fn test_search_ignores_case_and_punctuation() {
        let store = setup_store();
        for term in ["DOE", "  Doe. ", "d.o.e", "Doe!"] {
            let results = store.search_patients(term).unwrap();
            assert_eq!(names(&results), vec!["John Doe", "Jane Doe"], "term {term:?}");
        }
    }

    #[test]
    fn test_search_full_name_and_partial() {
        let store = setup_store();
        assert_eq!(names(&store.search_patients("jane  doe").unwrap()), vec!["Jane Doe"]);
        assert_eq!(names(&store.search_patients("had").unwrap()), vec!["Amal Haddad"]);
    }

    #[test]
    fn test_empty_term_returns_everything() {
        let store = setup_store();
        assert_eq!(store.search_patients("").unwrap().len(), 3);
        assert_eq!(store.search_patients("   ").unwrap().len(), 3);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let store = setup_store();
        assert!(store.search_patients("smith").unwrap().is_empty());
    }

    #[test]
    fn test_entry_lookup() {
        let store = setup_store();
        let id = store.list_patients().unwrap()[2].id.clone();
        assert_eq!(store.entry(&id).unwrap().unwrap().full_name, "Amal Haddad");
        assert!(store.entry("missing").unwrap().is_none());
    }

    #[test]
    fn test_suggestions_for_misspelling() {
        let store = setup_store();
        assert!(store.search_patients("hadad").unwrap().is_empty());

        let suggestions = store.suggest_patients("hadad", 3).unwrap();
        assert_eq!(suggestions[0].entry.full_name, "Amal Haddad");
    }
}

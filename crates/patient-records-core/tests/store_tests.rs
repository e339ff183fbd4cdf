//! Patient store integration tests.

use std::collections::BTreeSet;

use patient_records_core::models::Visit;
use patient_records_core::{
    KeyValueStore, MemoryStorage, Patient, PatientStore, SqliteStorage, StoreConfig, StoreError,
};
use proptest::prelude::*;

fn make_patient(first: &str, last: &str) -> Patient {
    Patient::new(first, last, "1975-06-30", "Tlemcen", "Female").with_age(49)
}

fn ready_store() -> PatientStore<MemoryStorage> {
    let mut store = PatientStore::new(MemoryStorage::new());
    store.initialize().unwrap();
    store
}

fn listed_ids<S: KeyValueStore>(store: &PatientStore<S>) -> Vec<String> {
    store
        .list_patients()
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect()
}

#[test]
fn test_save_then_load_roundtrip() {
    let mut store = ready_store();
    let patient = make_patient("  Amina ", "Benali")
        .with_visit(Visit::new("2024-01-10").with_reason("checkup"))
        .with_visit(Visit::new("2024-05-02"));

    let id = store.save(patient).unwrap();
    let loaded = store.load(&id).unwrap().unwrap();

    assert_eq!(loaded.id, id);
    assert_eq!(loaded.first_name, "Amina");
    assert_eq!(loaded.gender, "female");
    assert_eq!(loaded.visits.len(), 2);
    assert!(loaded.updated_at >= loaded.created_at);

    let entry = store.entry(&id).unwrap().unwrap();
    assert_eq!(entry.full_name, "Amina Benali");
    assert_eq!(entry.last_visit_date.as_deref(), Some("2024-05-02"));
}

#[test]
fn test_update_preserves_created_at() {
    let mut store = ready_store();
    let id = store.save(make_patient("Omar", "Saidi")).unwrap();
    let original = store.load(&id).unwrap().unwrap();

    let mut edited = original.clone();
    edited.place_of_residence = "Annaba".into();
    assert_eq!(store.save(edited).unwrap(), id);

    let updated = store.load(&id).unwrap().unwrap();
    assert_eq!(updated.created_at, original.created_at);
    assert!(updated.updated_at >= original.updated_at);
    assert_eq!(updated.place_of_residence, "Annaba");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_validation_failure_leaves_state_untouched() {
    let mut store = ready_store();
    store.save(make_patient("Omar", "Saidi")).unwrap();
    let config = store.config().clone();
    let blob_before = store.storage().get(&config.records_key).unwrap();

    let invalid = Patient::new("   ", "", "1975-06-30", "", "male");
    match store.save(invalid) {
        Err(StoreError::ValidationFailed(violations)) => {
            let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
            assert_eq!(fields, vec!["firstName", "lastName", "placeOfResidence"]);
        }
        other => panic!("expected validation failure, got {:?}", other),
    }

    assert_eq!(store.storage().get(&config.records_key).unwrap(), blob_before);
    assert_eq!(store.len(), 1);
    assert!(store.health_check().unwrap().is_healthy());
}

#[test]
fn test_load_missing_and_empty_id() {
    let store = ready_store();
    assert!(store.load("no-such-id").unwrap().is_none());
    assert!(matches!(store.load(""), Err(StoreError::InvalidArgument(_))));
}

#[test]
fn test_delete_then_retry() {
    let mut store = ready_store();
    let id = store.save(make_patient("Omar", "Saidi")).unwrap();

    assert_eq!(store.delete(&id).unwrap(), id);
    assert!(store.load(&id).unwrap().is_none());
    assert!(store.search_patients("omar").unwrap().is_empty());

    assert!(matches!(store.delete(&id), Err(StoreError::NotFound(_))));
    assert!(store.health_check().unwrap().is_healthy());
}

#[test]
fn test_search_matches_partial_names() {
    let mut store = ready_store();
    let john = store.save(make_patient("John", "Doe")).unwrap();
    let jane = store.save(make_patient("Jane", "Doe")).unwrap();
    store.save(make_patient("Amal", "Haddad")).unwrap();

    let ids = |term: &str| -> Vec<String> {
        store
            .search_patients(term)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect()
    };

    assert_eq!(ids("doe"), vec![john.clone(), jane.clone()]);
    assert_eq!(ids("  JOHN   d."), vec![john.clone()]);
    assert_eq!(ids("jane doe"), vec![jane]);
    assert!(ids("zzz").is_empty());
    assert_eq!(ids("   ").len(), 3);
}

#[test]
fn test_backup_restore_fidelity() {
    let mut source = ready_store();
    for (first, last) in [("John", "Doe"), ("Jane", "Doe"), ("Amal", "Haddad")] {
        source
            .save(make_patient(first, last).with_visit(Visit::new("2023-11-11")))
            .unwrap();
    }
    let json = source.backup_json().unwrap();

    let mut target = ready_store();
    target.save(make_patient("Stale", "Record")).unwrap();
    assert_eq!(target.restore_json(&json).unwrap(), 3);

    assert_eq!(listed_ids(&target), listed_ids(&source));
    for id in listed_ids(&source) {
        assert_eq!(target.load(&id).unwrap(), source.load(&id).unwrap());
    }
    assert!(target.search_patients("stale").unwrap().is_empty());
    assert!(target.health_check().unwrap().is_healthy());
}

#[test]
fn test_restore_rejects_tampered_snapshot() {
    let mut store = ready_store();
    let id = store.save(make_patient("John", "Doe")).unwrap();
    let mut snapshot = store.backup().unwrap();
    snapshot.records.get_mut(&id).unwrap().first_name = String::new();

    let other = store.save(make_patient("Jane", "Doe")).unwrap();
    assert!(matches!(
        store.restore(snapshot),
        Err(StoreError::InvalidSnapshot(_))
    ));

    // Nothing was applied
    assert_eq!(store.len(), 2);
    assert!(store.load(&other).unwrap().is_some());
}

#[test]
fn test_repair_after_external_write() {
    let mut store = ready_store();
    store.save(make_patient("John", "Doe")).unwrap();
    let config = store.config().clone();
    store
        .storage_mut()
        .set(&config.manifest_key, r#"["ghost"]"#)
        .unwrap();

    let report = store.health_check().unwrap();
    assert!(!report.is_healthy());

    let repaired = store.repair().unwrap();
    assert_eq!(repaired.before, report);
    assert_eq!(repaired.record_count, 1);
    assert!(store.health_check().unwrap().is_healthy());

    // A second repair finds nothing to do
    assert!(store.repair().unwrap().before.is_healthy());
}

#[test]
fn test_sqlite_file_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patients.db");

    let id = {
        let mut store = PatientStore::new(SqliteStorage::open(&path).unwrap());
        store.initialize().unwrap();
        store.save(make_patient("John", "Doe")).unwrap()
    };

    let mut reopened = PatientStore::new(SqliteStorage::open(&path).unwrap());
    let report = reopened.initialize().unwrap();

    assert_eq!(report.record_count, 1);
    assert!(!report.manifest_rewritten);
    assert_eq!(reopened.load(&id).unwrap().unwrap().last_name, "Doe");
    assert_eq!(reopened.search_patients("jo").unwrap().len(), 1);
}

#[test]
fn test_custom_keys_are_used() {
    let config = StoreConfig::default().with_keys("clinic_a.records", "clinic_a.manifest");
    let mut store = PatientStore::with_config(MemoryStorage::new(), config);
    store.initialize().unwrap();
    store.save(make_patient("John", "Doe")).unwrap();

    assert_eq!(
        store.storage().keys().unwrap(),
        vec!["clinic_a.manifest".to_string(), "clinic_a.records".to_string()]
    );
}

#[derive(Debug, Clone)]
enum Op {
    Save(usize),
    Rename(usize, usize),
    Delete(usize),
}

const NAMES: [&str; 6] = ["John", "Jane", "Amal", "Omar", "Lina", "Karim"];

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NAMES.len()).prop_map(Op::Save),
        (0..8usize, 0..NAMES.len()).prop_map(|(slot, name)| Op::Rename(slot, name)),
        (0..8usize).prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// After any sequence of mutations the index, the durable records and the
    /// manifest agree.
    #[test]
    fn prop_index_matches_durable_state(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let mut store = ready_store();
        let mut live: Vec<String> = Vec::new();

        for op in ops {
            match op {
                Op::Save(name) => {
                    let id = store.save(make_patient(NAMES[name], "Test")).unwrap();
                    live.push(id);
                }
                Op::Rename(slot, name) => {
                    if live.is_empty() {
                        continue;
                    }
                    let id = &live[slot % live.len()];
                    let mut patient = store.load(id).unwrap().unwrap();
                    patient.first_name = NAMES[name].to_string();
                    prop_assert_eq!(&store.save(patient).unwrap(), id);
                }
                Op::Delete(slot) => {
                    if live.is_empty() {
                        prop_assert!(matches!(store.delete("missing"), Err(StoreError::NotFound(_))));
                        continue;
                    }
                    let id = live.remove(slot % live.len());
                    prop_assert_eq!(store.delete(&id).unwrap(), id);
                }
            }

            prop_assert_eq!(listed_ids(&store), live.clone());
            prop_assert!(store.health_check().unwrap().is_healthy());
        }

        let durable: BTreeSet<String> = store.backup().unwrap().records.keys().cloned().collect();
        let indexed: BTreeSet<String> = live.iter().cloned().collect();
        prop_assert_eq!(durable, indexed);
    }
}

//! Integration tests for incremental keyword add / delete

mod common;

use std::collections::HashSet;

use ::common::prelude::*;

#[test]
fn test_add_then_search() {
    let (owner, store) = common::setup_test_env();
    let id = common::upload(&owner, &store, "PATIENT_10000", "note", &["sepsis"]);
    let doctor = common::enroll(&owner, "dr", &["admin"]);

    assert_eq!(
        doctor.attempt_access_and_search(&id, "followup", &store, &owner).unwrap(),
        AccessOutcome::Miss
    );
    assert_eq!(owner.add_keywords(&id, &["followup"], &store).unwrap(), 1);
    assert_eq!(
        doctor
            .attempt_access_and_search(&id, "followup", &store, &owner)
            .unwrap()
            .hits()
            .len(),
        1
    );
}

#[test]
fn test_delete_removes_every_historical_trapdoor() {
    let (owner, store) = common::setup_test_env();
    let id = common::upload(&owner, &store, "PATIENT_10000", "note", &["fever"]);
    owner.add_keywords(&id, &["fever", "fever"], &store).unwrap();

    let old_tokens = owner.generate_search_tokens(&id, "fever").unwrap();
    assert_eq!(old_tokens.len(), 3);

    assert_eq!(owner.delete_keywords(&id, &["fever"], &store).unwrap(), 3);
    assert!(owner.generate_search_tokens(&id, "fever").unwrap().is_empty());
    assert!(store.search(&id, &old_tokens).unwrap().is_empty());
    assert_eq!(store.index_len(&id).unwrap(), Some(0));
}

#[test]
fn test_delete_leaves_other_keywords() {
    let (owner, store) = common::setup_test_env();
    let id = common::upload(&owner, &store, "PATIENT_10000", "note", &["fever", "cough"]);
    let doctor = common::enroll(&owner, "dr", &["admin"]);

    owner.delete_keywords(&id, &["fever"], &store).unwrap();
    assert_eq!(
        doctor.attempt_access_and_search(&id, "fever", &store, &owner).unwrap(),
        AccessOutcome::Miss
    );
    assert_eq!(
        doctor
            .attempt_access_and_search(&id, "cough", &store, &owner)
            .unwrap()
            .hits()
            .len(),
        1
    );
}

#[test]
fn test_delete_unknown_keyword_is_noop() {
    let (owner, store) = common::setup_test_env();
    let id = common::upload(&owner, &store, "PATIENT_10000", "note", &["fever"]);
    assert_eq!(owner.delete_keywords(&id, &["never-added"], &store).unwrap(), 0);
    assert_eq!(store.index_len(&id).unwrap(), Some(1));
}

#[test]
fn test_reinsert_after_delete_uses_fresh_trapdoors() {
    let (owner, store) = common::setup_test_env();
    let id = common::upload(&owner, &store, "PATIENT_10000", "note", &["fever"]);
    let before: HashSet<Trapdoor> = owner
        .generate_search_tokens(&id, "fever")
        .unwrap()
        .into_iter()
        .collect();

    owner.delete_keywords(&id, &["fever"], &store).unwrap();
    owner.add_keywords(&id, &["fever"], &store).unwrap();
    let after: HashSet<Trapdoor> = owner
        .generate_search_tokens(&id, "fever")
        .unwrap()
        .into_iter()
        .collect();

    assert_eq!(after.len(), 1);
    assert!(before.is_disjoint(&after));
    assert_eq!(store.search(&id, &Vec::from_iter(after)).unwrap().len(), 1);
}

#[test]
fn test_reuse_mode_repeats_trapdoors_after_delete() {
    let kem = AttributeKem::new(["ADMIN"]);
    let owner = Owner::setup(kem, ChaChaCipher)
        .unwrap()
        .with_reset(CounterReset::Reuse);
    let store = MemoryIndexStore::new();
    let id = EntityId::from("PATIENT_10000");
    owner
        .encrypt_and_upload(&id, b"note", &["fever"], "ADMIN", &store)
        .unwrap();

    let before = owner.generate_search_tokens(&id, "fever").unwrap();
    owner.delete_keywords(&id, &["fever"], &store).unwrap();
    owner.add_keywords(&id, &["fever"], &store).unwrap();
    assert_eq!(owner.generate_search_tokens(&id, "fever").unwrap(), before);
}

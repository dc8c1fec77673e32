//! Integration tests for per-entity index isolation

mod common;

use ::common::prelude::*;

#[test]
fn test_tokens_do_not_cross_entities() {
    let (owner, store) = common::setup_test_env();
    let a = common::upload(&owner, &store, "PATIENT_A", "a", &["diabetes"]);
    let b = common::upload(&owner, &store, "PATIENT_B", "b", &["diabetes"]);

    let tokens_b = owner.generate_search_tokens(&b, "diabetes").unwrap();
    assert!(store.search(&a, &tokens_b).unwrap().is_empty());
    assert_eq!(store.search(&b, &tokens_b).unwrap().len(), 1);

    let tokens_a = owner.generate_search_tokens(&a, "diabetes").unwrap();
    assert_ne!(tokens_a, tokens_b);
}

#[test]
fn test_entity_keys_are_independent() {
    let (owner, store) = common::setup_test_env();
    let a = common::upload(&owner, &store, "PATIENT_A", "a", &["x"]);
    let b = common::upload(&owner, &store, "PATIENT_B", "b", &["x"]);
    assert_ne!(
        store.key_ciphertext(&a).unwrap(),
        store.key_ciphertext(&b).unwrap()
    );
}

#[test]
fn test_policies_are_per_entity() {
    let (owner, store) = common::setup_test_env();
    let open = EntityId::from("PATIENT_OPEN");
    let locked = EntityId::from("PATIENT_LOCKED");
    owner
        .encrypt_and_upload(&open, b"a", &["asthma"], "NURSE OR DOCTOR", &store)
        .unwrap();
    owner
        .encrypt_and_upload(&locked, b"b", &["asthma"], "ADMIN", &store)
        .unwrap();

    let nurse = common::enroll(&owner, "n", &["nurse"]);
    assert_eq!(
        nurse
            .attempt_access_and_search(&open, "asthma", &store, &owner)
            .unwrap()
            .hits()
            .len(),
        1
    );
    assert!(nurse
        .attempt_access_and_search(&locked, "asthma", &store, &owner)
        .unwrap()
        .is_denied());
}

#[test]
fn test_search_query_forms() {
    let (owner, store) = common::setup_test_env();
    let id = common::upload(&owner, &store, "PATIENT_A", "a", &["fever", "fever"]);
    let tokens = owner.generate_search_tokens(&id, "fever").unwrap();

    assert_eq!(store.search_query(&id, tokens[1]).unwrap().len(), 1);
    assert_eq!(store.search_query(&id, tokens.as_slice()).unwrap().len(), 2);
    assert_eq!(store.search_query(&id, tokens).unwrap().len(), 2);
}

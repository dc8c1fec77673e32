//! Shared test utilities for owner / clinician integration tests
#![allow(dead_code)]

use common::prelude::*;

pub type TestOwner = Owner<AttributeKem, ChaChaCipher>;
pub type TestClinician = Clinician<AttributeKem, ChaChaCipher>;

pub const POLICY: &str = "(DOCTOR AND CARDIOLOGY) OR ADMIN";

/// Set up an owner over a small attribute universe and an empty store
pub fn setup_test_env() -> (TestOwner, MemoryIndexStore) {
    let kem = AttributeKem::new(["DOCTOR", "NURSE", "CARDIOLOGY", "ONCOLOGY", "ADMIN"]);
    let owner = Owner::setup(kem, ChaChaCipher).unwrap();
    (owner, MemoryIndexStore::new())
}

/// Enroll a clinician with the given attributes
pub fn enroll(owner: &TestOwner, name: &str, attributes: &[&str]) -> TestClinician {
    let attributes: Vec<String> = attributes.iter().map(|a| a.to_string()).collect();
    Clinician::enroll(name, &attributes, owner).unwrap()
}

/// Upload a record for `id` under the default policy
pub fn upload(
    owner: &TestOwner,
    store: &MemoryIndexStore,
    id: &str,
    content: &str,
    keywords: &[&str],
) -> EntityId {
    let id = EntityId::from(id);
    owner
        .encrypt_and_upload(&id, content.as_bytes(), keywords, POLICY, store)
        .unwrap();
    id
}

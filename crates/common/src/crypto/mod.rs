//! Cryptographic capabilities consumed by the owner and clinicians
//!
//! - **Record encryption**: ChaCha20-Poly1305 over each entity's record, with
//!   nonce and tag kept detached (`RecordCipher`)
//! - **Key encapsulation**: the entity key is bound to an attribute policy
//!   (`PolicyKem`); only holders whose attributes satisfy the policy can
//!   recover it
//! - **Policies**: monotone boolean expressions over attributes
//!
//! The DSSE engine derives its trapdoors from the same entity key, so a
//! clinician who cannot unwrap the key learns nothing about the index.

mod kem;
mod policy;
mod secret;

pub use kem::{
    AttributeKem, AttributeParams, AttributeSecret, KemError, KeyCiphertext, MasterSecret,
    PolicyKem, WrappedClause,
};
pub use policy::{normalize_attribute, Policy, PolicyError};
pub use secret::{
    ChaChaCipher, CipherError, RecordCipher, SealedRecord, Secret, NONCE_SIZE, SECRET_SIZE,
    TAG_SIZE,
};

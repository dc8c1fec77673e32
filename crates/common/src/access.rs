//! Clinician access workflow
//!
//! A clinician first proves they satisfy an entity's access policy by
//! unwrapping the entity key from the key ciphertext the server holds. Only
//! then do they ask the owner for search tokens and run the search on the
//! server.

use std::collections::HashSet;
use std::fmt;

use crate::crypto::{normalize_attribute, KemError, PolicyKem, RecordCipher, Secret};
use crate::owner::{Owner, OwnerError};
use crate::record::{DocPointer, EntityId};
use crate::store::{IndexStore, StoreError};

/// Result of an access-and-search attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The clinician could not recover the entity key
    Denied,
    /// Access granted and the keyword matched
    Hit(Vec<DocPointer>),
    /// Access granted and the keyword did not match
    Miss,
}

impl AccessOutcome {
    pub fn is_denied(&self) -> bool {
        matches!(self, AccessOutcome::Denied)
    }

    pub fn hits(&self) -> &[DocPointer] {
        match self {
            AccessOutcome::Hit(hits) => hits,
            _ => &[],
        }
    }
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOutcome::Denied => write!(f, "denied"),
            AccessOutcome::Hit(hits) => write!(f, "hit ({} matches)", hits.len()),
            AccessOutcome::Miss => write!(f, "miss"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("access denied to entity {0}")]
    Denied(EntityId),
    #[error("no record or key ciphertext stored for entity {0}")]
    MissingData(EntityId),
    #[error("record failed integrity check for entity {0}")]
    Integrity(EntityId),
    #[error("record for entity {0} is not valid UTF-8")]
    Encoding(EntityId),
    #[error("key decapsulation failed: {0}")]
    Kem(#[from] KemError),
    #[error("owner error: {0}")]
    Owner(#[from] OwnerError),
    #[error("index store error: {0}")]
    Store(String),
}

impl<T: fmt::Display> From<StoreError<T>> for AccessError {
    fn from(err: StoreError<T>) -> Self {
        match err {
            StoreError::NotFound(id) => AccessError::MissingData(id),
            StoreError::Provider(e) => AccessError::Store(e.to_string()),
        }
    }
}

/// What the clinician's credentials yield for one entity
enum KeyAccess {
    Granted(Secret),
    /// No key ciphertext is stored for the entity
    Missing,
    /// The policy does not accept the clinician's attributes
    Denied,
}

/// A relying party holding attribute credentials
pub struct Clinician<K: PolicyKem, C: RecordCipher> {
    name: String,
    attributes: HashSet<String>,
    user: K::UserSecret,
    params: K::PublicParams,
    kem: K,
    cipher: C,
}

impl<K: PolicyKem, C: RecordCipher> fmt::Debug for Clinician<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clinician")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl<K: PolicyKem, C: RecordCipher> Clinician<K, C> {
    pub fn new(
        name: impl Into<String>,
        attributes: &[String],
        user: K::UserSecret,
        params: K::PublicParams,
        kem: K,
        cipher: C,
    ) -> Self {
        Self {
            name: name.into(),
            attributes: attributes.iter().map(|a| normalize_attribute(a)).collect(),
            user,
            params,
            kem,
            cipher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &HashSet<String> {
        &self.attributes
    }

    fn unwrap_key<S>(&self, id: &EntityId, store: &S) -> Result<KeyAccess, AccessError>
    where
        S: IndexStore<KeyCiphertext = K::Ciphertext>,
    {
        let ciphertext = match store.key_ciphertext(id) {
            Ok(Some(ct)) => ct,
            Ok(None) | Err(StoreError::NotFound(_)) => return Ok(KeyAccess::Missing),
            Err(e) => return Err(e.into()),
        };

        match self.kem.decrypt(&self.params, &self.user, &ciphertext) {
            Ok(key) => Ok(KeyAccess::Granted(key)),
            Err(KemError::PolicyNotSatisfied) => {
                tracing::info!("{} denied access to {}", self.name, id);
                Ok(KeyAccess::Denied)
            }
            Err(e) => {
                tracing::warn!("{} could not unwrap key for {}: {}", self.name, id, e);
                Err(e.into())
            }
        }
    }

    /// Check access to the entity, then search its index for `keyword`
    ///
    /// Tokens are always minted by the owner; the clinician never sees the
    /// counters. Failures of the owner or the store are errors, never a
    /// `Miss`.
    ///
    /// # Returns
    /// * `Ok(AccessOutcome::Denied)` - no key ciphertext, or the policy
    ///   rejects the clinician's attributes
    /// * `Err(AccessError::Owner)` - the owner holds no index state for the
    ///   entity
    pub fn attempt_access_and_search<S, O>(
        &self,
        id: &EntityId,
        keyword: &str,
        store: &S,
        owner: &Owner<K, O>,
    ) -> Result<AccessOutcome, AccessError>
    where
        S: IndexStore<KeyCiphertext = K::Ciphertext>,
        O: RecordCipher,
    {
        match self.unwrap_key(id, store)? {
            KeyAccess::Granted(_) => {}
            KeyAccess::Missing | KeyAccess::Denied => return Ok(AccessOutcome::Denied),
        }

        let tokens = owner.generate_search_tokens(id, keyword)?;
        if tokens.is_empty() {
            return Ok(AccessOutcome::Miss);
        }

        let hits = store.search(id, &tokens)?;
        if hits.is_empty() {
            Ok(AccessOutcome::Miss)
        } else {
            Ok(AccessOutcome::Hit(hits))
        }
    }

    /// Recover the entity key and decrypt the stored record
    pub fn decrypt_full_record<S>(&self, id: &EntityId, store: &S) -> Result<String, AccessError>
    where
        S: IndexStore<KeyCiphertext = K::Ciphertext>,
    {
        let key = match self.unwrap_key(id, store)? {
            KeyAccess::Granted(key) => key,
            KeyAccess::Missing => return Err(AccessError::MissingData(id.clone())),
            KeyAccess::Denied => return Err(AccessError::Denied(id.clone())),
        };
        let record = store
            .record(id)?
            .ok_or_else(|| AccessError::MissingData(id.clone()))?;

        let plaintext = self.cipher.decrypt(&record, &key).map_err(|e| {
            tracing::warn!("record for {} failed to decrypt: {}", id, e);
            AccessError::Integrity(id.clone())
        })?;
        String::from_utf8(plaintext).map_err(|_| AccessError::Encoding(id.clone()))
    }
}

impl<K, C> Clinician<K, C>
where
    K: PolicyKem + Clone,
    C: RecordCipher + Clone,
{
    /// Issue credentials for `attributes` from the owner's authority
    pub fn enroll(
        name: impl Into<String>,
        attributes: &[String],
        owner: &Owner<K, C>,
    ) -> Result<Self, OwnerError> {
        let user = owner.issue_user_key(attributes)?;
        Ok(Self::new(
            name,
            attributes,
            user,
            owner.public_params().clone(),
            owner.kem().clone(),
            owner.cipher().clone(),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{AttributeKem, ChaChaCipher, SealedRecord};
    use crate::store::MemoryIndexStore;

    type TestOwner = Owner<AttributeKem, ChaChaCipher>;

    fn setup() -> (TestOwner, MemoryIndexStore, EntityId) {
        let owner = Owner::setup(
            AttributeKem::new(["DOCTOR", "NURSE", "CARDIOLOGY"]),
            ChaChaCipher,
        )
        .unwrap();
        let store = MemoryIndexStore::new();
        let id = EntityId::from("PATIENT_10000");
        owner
            .encrypt_and_upload(
                &id,
                "Diagnosis: Sepsis".as_bytes(),
                &["sepsis", "insulin"],
                "DOCTOR AND CARDIOLOGY",
                &store,
            )
            .unwrap();
        (owner, store, id)
    }

    fn clinician(owner: &TestOwner, attrs: &[&str]) -> Clinician<AttributeKem, ChaChaCipher> {
        let attrs: Vec<String> = attrs.iter().map(|a| a.to_string()).collect();
        Clinician::enroll("dr", &attrs, owner).unwrap()
    }

    #[test]
    fn test_authorized_hit_and_miss() {
        let (owner, store, id) = setup();
        let doctor = clinician(&owner, &["doctor", "cardiology"]);

        let outcome = doctor
            .attempt_access_and_search(&id, "SEPSIS", &store, &owner)
            .unwrap();
        assert_eq!(outcome, AccessOutcome::Hit(vec![DocPointer::main_record()]));
        assert_eq!(
            doctor
                .attempt_access_and_search(&id, "fever", &store, &owner)
                .unwrap(),
            AccessOutcome::Miss
        );
    }

    #[test]
    fn test_unauthorized_denied() {
        let (owner, store, id) = setup();
        let nurse = clinician(&owner, &["nurse"]);
        assert!(nurse
            .attempt_access_and_search(&id, "sepsis", &store, &owner)
            .unwrap()
            .is_denied());
        assert!(matches!(
            nurse.decrypt_full_record(&id, &store),
            Err(AccessError::Denied(_))
        ));
    }

    #[test]
    fn test_unknown_entity_denied() {
        let (owner, store, _) = setup();
        let doctor = clinician(&owner, &["doctor", "cardiology"]);
        let ghost = EntityId::from("ghost");
        assert!(doctor
            .attempt_access_and_search(&ghost, "sepsis", &store, &owner)
            .unwrap()
            .is_denied());
        assert!(matches!(
            doctor.decrypt_full_record(&ghost, &store),
            Err(AccessError::MissingData(_))
        ));
    }

    #[test]
    fn test_owner_without_index_state_is_an_error() {
        let (owner, store, id) = setup();
        let doctor = clinician(&owner, &["doctor", "cardiology"]);
        let other_owner: TestOwner = Owner::setup(
            AttributeKem::new(["DOCTOR", "NURSE", "CARDIOLOGY"]),
            ChaChaCipher,
        )
        .unwrap();

        let result = doctor.attempt_access_and_search(&id, "sepsis", &store, &other_owner);
        assert!(matches!(
            result,
            Err(AccessError::Owner(OwnerError::NoEngine(_)))
        ));
    }

    #[test]
    fn test_decrypt_full_record() {
        let (owner, store, id) = setup();
        let doctor = clinician(&owner, &["doctor", "cardiology"]);
        assert_eq!(
            doctor.decrypt_full_record(&id, &store).unwrap(),
            "Diagnosis: Sepsis"
        );
    }

    #[test]
    fn test_tampered_record_fails_integrity() {
        let (owner, store, id) = setup();
        let doctor = clinician(&owner, &["doctor", "cardiology"]);

        let record = store.record(&id).unwrap().unwrap();
        let mut ciphertext = record.ciphertext.clone();
        ciphertext[0] ^= 0xff;
        let tampered = SealedRecord {
            ciphertext,
            ..record
        };
        let key_ct = store.key_ciphertext(&id).unwrap().unwrap();
        store.replace_record(&id, tampered, key_ct).unwrap();

        assert!(matches!(
            doctor.decrypt_full_record(&id, &store),
            Err(AccessError::Integrity(_))
        ));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(AccessOutcome::Denied.to_string(), "denied");
        assert_eq!(AccessOutcome::Miss.to_string(), "miss");
        assert_eq!(
            AccessOutcome::Hit(vec![DocPointer::main_record(); 2]).to_string(),
            "hit (2 matches)"
        );
        assert!(AccessOutcome::Miss.hits().is_empty());
    }
}

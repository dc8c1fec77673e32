//! Data owner
//!
//! The owner runs the policy authority, holds one key and one DSSE engine per
//! entity, and is the only party that can mint search tokens. Every write to
//! an entity happens under that entity's lock, so concurrent writers to the
//! same entity can never derive the same trapdoor twice.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::crypto::{CipherError, KemError, PolicyKem, RecordCipher, Secret};
use crate::dsse::{CounterReset, DsseEngine, Trapdoor};
use crate::record::{DocPointer, EntityId};
use crate::store::{IndexStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum OwnerError {
    #[error("owner error: {0}")]
    Default(#[from] anyhow::Error),
    /// The store holds no bundle for the entity
    #[error("entity not found: {0}")]
    NotFound(EntityId),
    /// The entity was never written through this owner
    #[error("no index engine for entity: {0}")]
    NoEngine(EntityId),
    #[error("key encapsulation failed: {0}")]
    Kem(#[from] KemError),
    #[error("record encryption failed: {0}")]
    Cipher(#[from] CipherError),
    #[error("index store error: {0}")]
    Store(String),
}

impl<T: fmt::Display> From<StoreError<T>> for OwnerError {
    fn from(err: StoreError<T>) -> Self {
        match err {
            StoreError::NotFound(id) => OwnerError::NotFound(id),
            StoreError::Provider(e) => OwnerError::Store(e.to_string()),
        }
    }
}

/// Key material and index state for one entity
struct EntityState<C> {
    key: Secret,
    key_ciphertext: C,
    policy: String,
    engine: DsseEngine,
}

type EntitySlot<C> = Arc<Mutex<Option<EntityState<C>>>>;

/// Data owner generic over its key encapsulation and record cipher
pub struct Owner<K: PolicyKem, C: RecordCipher> {
    kem: K,
    cipher: C,
    params: K::PublicParams,
    master: K::MasterSecret,
    reset: CounterReset,
    entities: RwLock<HashMap<EntityId, EntitySlot<K::Ciphertext>>>,
}

impl<K: PolicyKem, C: RecordCipher> fmt::Debug for Owner<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("entities", &self.entities.read().len())
            .field("reset", &self.reset)
            .finish_non_exhaustive()
    }
}

impl<K: PolicyKem, C: RecordCipher> Owner<K, C> {
    /// Run the authority setup and start with no entities
    pub fn setup(kem: K, cipher: C) -> Result<Self, OwnerError> {
        let (params, master) = kem.setup()?;
        tracing::info!("data owner initialized");
        Ok(Self {
            kem,
            cipher,
            params,
            master,
            reset: CounterReset::default(),
            entities: RwLock::new(HashMap::new()),
        })
    }

    /// Counter reset mode for engines created after this call
    pub fn with_reset(mut self, reset: CounterReset) -> Self {
        self.reset = reset;
        self
    }

    pub fn public_params(&self) -> &K::PublicParams {
        &self.params
    }

    pub fn kem(&self) -> &K {
        &self.kem
    }

    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    /// Issue a user secret for an attribute set
    pub fn issue_user_key(&self, attributes: &[String]) -> Result<K::UserSecret, OwnerError> {
        let user = self.kem.keygen(&self.params, &self.master, attributes)?;
        tracing::debug!("issued user key for attributes {:?}", attributes);
        Ok(user)
    }

    pub fn has_entity(&self, id: &EntityId) -> bool {
        self.slot(id)
            .map(|slot| slot.lock().is_some())
            .unwrap_or(false)
    }

    /// Policy the entity's key was bound to on first write
    pub fn entity_policy(&self, id: &EntityId) -> Option<String> {
        let slot = self.slot(id)?;
        let state = slot.lock();
        state.as_ref().map(|s| s.policy.clone())
    }

    /// Encrypt a record, index it under `main_record` and store it
    ///
    /// The first write for an entity generates its key under `policy`; later
    /// writes reuse that key and ignore `policy`. Keyword counters only move
    /// once the store accepted the write.
    ///
    /// # Returns
    /// * `Ok(usize)` - number of trapdoors added to the index
    pub fn encrypt_and_upload<S, T>(
        &self,
        id: &EntityId,
        plaintext: &[u8],
        keywords: &[T],
        policy: &str,
        store: &S,
    ) -> Result<usize, OwnerError>
    where
        S: IndexStore<KeyCiphertext = K::Ciphertext>,
        T: AsRef<str>,
    {
        let slot = self.slot_or_insert(id);
        let mut guard = slot.lock();

        match guard.as_ref() {
            Some(state) if state.policy != policy => {
                tracing::warn!(
                    "ignoring policy {:?} for entity {}: key is bound to {:?}",
                    policy,
                    id,
                    state.policy
                );
            }
            Some(_) => {}
            None => {
                let (key_ciphertext, key) = self.kem.encrypt(&self.params, policy)?;
                let engine = DsseEngine::with_reset(key.bytes(), self.reset);
                tracing::debug!("generated key for entity {}", id);
                *guard = Some(EntityState {
                    key,
                    key_ciphertext,
                    policy: policy.to_string(),
                    engine,
                });
            }
        }
        let state = guard
            .as_mut()
            .ok_or_else(|| OwnerError::NoEngine(id.clone()))?;

        let record = self.cipher.encrypt(plaintext, &state.key)?;
        let (patch, pending) = state
            .engine
            .stage_index(keywords, &DocPointer::main_record());
        let added = patch.len();

        if store.contains(id)? {
            store.replace_record(id, record, state.key_ciphertext.clone())?;
            store.merge_index(id, patch)?;
        } else {
            store.upload(id, record, patch, state.key_ciphertext.clone())?;
        }
        state.engine.commit(pending);

        tracing::info!("uploaded entity {} with {} new trapdoors", id, added);
        Ok(added)
    }

    /// Index further keywords under the entity's `main_record`
    pub fn add_keywords<S, T>(
        &self,
        id: &EntityId,
        keywords: &[T],
        store: &S,
    ) -> Result<usize, OwnerError>
    where
        S: IndexStore,
        T: AsRef<str>,
    {
        let slot = self.slot(id).ok_or_else(|| OwnerError::NoEngine(id.clone()))?;
        let mut guard = slot.lock();
        let state = guard
            .as_mut()
            .ok_or_else(|| OwnerError::NoEngine(id.clone()))?;
        if !store.contains(id)? {
            return Err(OwnerError::NotFound(id.clone()));
        }

        let (patch, pending) = state
            .engine
            .stage_index(keywords, &DocPointer::main_record());
        let added = store.merge_index(id, patch)?;
        state.engine.commit(pending);
        tracing::debug!("added {} trapdoors to entity {}", added, id);
        Ok(added)
    }

    /// Remove every trapdoor ever issued for each keyword and reset its
    /// counter
    ///
    /// A keyword's counter is reset only after its trapdoors left the store,
    /// so a failed call can be retried with the same keywords.
    ///
    /// # Returns
    /// * `Ok(usize)` - number of index entries removed from the store
    pub fn delete_keywords<S, T>(
        &self,
        id: &EntityId,
        keywords: &[T],
        store: &S,
    ) -> Result<usize, OwnerError>
    where
        S: IndexStore,
        T: AsRef<str>,
    {
        let slot = self.slot(id).ok_or_else(|| OwnerError::NoEngine(id.clone()))?;
        let mut guard = slot.lock();
        let state = guard
            .as_mut()
            .ok_or_else(|| OwnerError::NoEngine(id.clone()))?;
        if !store.contains(id)? {
            return Err(OwnerError::NotFound(id.clone()));
        }

        let mut removed = 0;
        for keyword in keywords {
            let keyword = keyword.as_ref();
            let trapdoors = state.engine.generate_search_tokens(keyword);
            if !trapdoors.is_empty() {
                removed += store.remove_trapdoors(id, &trapdoors)?;
            }
            state.engine.delete(keyword);
        }
        tracing::debug!("removed {} trapdoors from entity {}", removed, id);
        Ok(removed)
    }

    /// Trapdoors for every live insertion of `keyword` in the entity's index
    pub fn generate_search_tokens(
        &self,
        id: &EntityId,
        keyword: &str,
    ) -> Result<Vec<Trapdoor>, OwnerError> {
        let slot = self.slot(id).ok_or_else(|| OwnerError::NoEngine(id.clone()))?;
        let guard = slot.lock();
        let state = guard
            .as_ref()
            .ok_or_else(|| OwnerError::NoEngine(id.clone()))?;
        Ok(state.engine.generate_search_tokens(keyword))
    }

    fn slot(&self, id: &EntityId) -> Option<EntitySlot<K::Ciphertext>> {
        self.entities.read().get(id).cloned()
    }

    fn slot_or_insert(&self, id: &EntityId) -> EntitySlot<K::Ciphertext> {
        if let Some(slot) = self.slot(id) {
            return slot;
        }
        self.entities
            .write()
            .entry(id.clone())
            .or_default()
            .clone()
    }
}

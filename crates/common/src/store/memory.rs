use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::RwLock;

use super::provider::{EntityBundle, IndexStore, StoreError};
use crate::crypto::{KeyCiphertext, SealedRecord};
use crate::dsse::{search_index, Index, IndexPatch, Trapdoor};
use crate::record::{DocPointer, EntityId};

type Bundle<C> = Arc<RwLock<EntityBundle<C>>>;

/// In-memory index store using HashMaps
///
/// Each bundle sits behind its own lock, so work on one entity never waits
/// on another entity's writer.
#[derive(Debug)]
pub struct MemoryIndexStore<C = KeyCiphertext> {
    inner: Arc<RwLock<HashMap<EntityId, Bundle<C>>>>,
}

impl<C> Clone for MemoryIndexStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> MemoryIndexStore<C> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn bundle(&self, id: &EntityId) -> Option<Bundle<C>> {
        self.inner.read().get(id).cloned()
    }

    fn existing(&self, id: &EntityId) -> Result<Bundle<C>, StoreError<Infallible>> {
        self.bundle(id).ok_or_else(|| {
            tracing::debug!("entity {} not found in index store", id);
            StoreError::NotFound(id.clone())
        })
    }
}

impl<C> Default for MemoryIndexStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> IndexStore for MemoryIndexStore<C>
where
    C: Clone + Send + Sync + std::fmt::Debug,
{
    type Error = Infallible;
    type KeyCiphertext = C;

    fn upload(
        &self,
        id: &EntityId,
        record: SealedRecord,
        index: Index,
        key_ciphertext: C,
    ) -> Result<(), StoreError<Self::Error>> {
        let entries = index.len();
        let bundle = EntityBundle {
            record,
            index,
            key_ciphertext,
        };
        self.inner
            .write()
            .insert(id.clone(), Arc::new(RwLock::new(bundle)));
        tracing::debug!("stored bundle for entity {} ({} trapdoors)", id, entries);
        Ok(())
    }

    fn replace_record(
        &self,
        id: &EntityId,
        record: SealedRecord,
        key_ciphertext: C,
    ) -> Result<(), StoreError<Self::Error>> {
        let bundle = self.existing(id)?;
        let mut bundle = bundle.write();
        bundle.record = record;
        bundle.key_ciphertext = key_ciphertext;
        Ok(())
    }

    fn merge_index(
        &self,
        id: &EntityId,
        patch: IndexPatch,
    ) -> Result<usize, StoreError<Self::Error>> {
        let bundle = self.existing(id)?;
        let merged = patch.len();
        bundle.write().index.extend(patch);
        Ok(merged)
    }

    fn remove_trapdoors(
        &self,
        id: &EntityId,
        trapdoors: &[Trapdoor],
    ) -> Result<usize, StoreError<Self::Error>> {
        let bundle = self.existing(id)?;
        let mut bundle = bundle.write();
        Ok(trapdoors
            .iter()
            .filter(|t| bundle.index.remove(*t).is_some())
            .count())
    }

    fn search(
        &self,
        id: &EntityId,
        trapdoors: &[Trapdoor],
    ) -> Result<Vec<DocPointer>, StoreError<Self::Error>> {
        let bundle = self.existing(id)?;
        let results = search_index(&bundle.read().index, trapdoors);
        if results.is_empty() {
            tracing::debug!("no match for {} trapdoors in entity {}", trapdoors.len(), id);
        } else {
            tracing::debug!("{} matches in entity {}", results.len(), id);
        }
        Ok(results)
    }

    fn key_ciphertext(&self, id: &EntityId) -> Result<Option<C>, StoreError<Self::Error>> {
        Ok(self
            .bundle(id)
            .map(|bundle| bundle.read().key_ciphertext.clone()))
    }

    fn record(&self, id: &EntityId) -> Result<Option<SealedRecord>, StoreError<Self::Error>> {
        Ok(self.bundle(id).map(|bundle| bundle.read().record.clone()))
    }

    fn contains(&self, id: &EntityId) -> Result<bool, StoreError<Self::Error>> {
        Ok(self.inner.read().contains_key(id))
    }

    fn index_len(&self, id: &EntityId) -> Result<Option<usize>, StoreError<Self::Error>> {
        Ok(self.bundle(id).map(|bundle| bundle.read().index.len()))
    }

    fn entity_count(&self) -> Result<usize, StoreError<Self::Error>> {
        Ok(self.inner.read().len())
    }
}

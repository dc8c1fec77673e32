use std::fmt::{Debug, Display};

use crate::crypto::SealedRecord;
use crate::dsse::{Index, IndexPatch, Trapdoor};
use crate::record::{DocPointer, EntityId};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError<T> {
    #[error("unhandled index store provider error: {0}")]
    Provider(#[from] T),
    /// No bundle was ever uploaded for the entity
    #[error("entity not found: {0}")]
    NotFound(EntityId),
}

/// Everything the server holds for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityBundle<C> {
    pub record: SealedRecord,
    pub index: Index,
    pub key_ciphertext: C,
}

/// One trapdoor or an ordered sequence of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Single(Trapdoor),
    Many(Vec<Trapdoor>),
}

impl SearchQuery {
    pub fn as_slice(&self) -> &[Trapdoor] {
        match self {
            SearchQuery::Single(t) => std::slice::from_ref(t),
            SearchQuery::Many(ts) => ts,
        }
    }
}

impl From<Trapdoor> for SearchQuery {
    fn from(trapdoor: Trapdoor) -> Self {
        SearchQuery::Single(trapdoor)
    }
}

impl From<Vec<Trapdoor>> for SearchQuery {
    fn from(trapdoors: Vec<Trapdoor>) -> Self {
        SearchQuery::Many(trapdoors)
    }
}

impl From<&[Trapdoor]> for SearchQuery {
    fn from(trapdoors: &[Trapdoor]) -> Self {
        SearchQuery::Many(trapdoors.to_vec())
    }
}

/// Server-side storage of per-entity bundles
///
/// Entities never share index state: every lookup is scoped to one entity's
/// index, so search cost depends only on the number of trapdoors submitted.
pub trait IndexStore: Send + Sync + Debug {
    type Error: Display + Debug;
    /// Opaque key encapsulation blob stored next to the record
    type KeyCiphertext: Clone + Send + Sync;

    /// Create the bundle for an entity, or replace it wholesale
    fn upload(
        &self,
        id: &EntityId,
        record: SealedRecord,
        index: Index,
        key_ciphertext: Self::KeyCiphertext,
    ) -> Result<(), StoreError<Self::Error>>;

    /// Overwrite the record and key fields of an existing bundle, keeping
    /// its index
    fn replace_record(
        &self,
        id: &EntityId,
        record: SealedRecord,
        key_ciphertext: Self::KeyCiphertext,
    ) -> Result<(), StoreError<Self::Error>>;

    /// Add the patch's trapdoors to the entity's index in place
    ///
    /// # Returns
    /// * `Ok(usize)` - number of entries merged
    /// * `Err(StoreError::NotFound)` - the entity has no bundle
    fn merge_index(&self, id: &EntityId, patch: IndexPatch)
        -> Result<usize, StoreError<Self::Error>>;

    /// Remove whichever of `trapdoors` are present in the entity's index
    ///
    /// # Returns
    /// * `Ok(usize)` - number of entries actually removed
    fn remove_trapdoors(
        &self,
        id: &EntityId,
        trapdoors: &[Trapdoor],
    ) -> Result<usize, StoreError<Self::Error>>;

    /// Look up each trapdoor in the entity's index and concatenate the hits
    ///
    /// Duplicates across trapdoors are preserved.
    fn search(
        &self,
        id: &EntityId,
        trapdoors: &[Trapdoor],
    ) -> Result<Vec<DocPointer>, StoreError<Self::Error>>;

    fn key_ciphertext(
        &self,
        id: &EntityId,
    ) -> Result<Option<Self::KeyCiphertext>, StoreError<Self::Error>>;

    fn record(&self, id: &EntityId) -> Result<Option<SealedRecord>, StoreError<Self::Error>>;

    fn contains(&self, id: &EntityId) -> Result<bool, StoreError<Self::Error>>;

    /// Number of trapdoors in the entity's index
    fn index_len(&self, id: &EntityId) -> Result<Option<usize>, StoreError<Self::Error>>;

    fn entity_count(&self) -> Result<usize, StoreError<Self::Error>>;

    /// `search` for either a single trapdoor or a sequence
    fn search_query(
        &self,
        id: &EntityId,
        query: impl Into<SearchQuery>,
    ) -> Result<Vec<DocPointer>, StoreError<Self::Error>>
    where
        Self: Sized,
    {
        let query = query.into();
        self.search(id, query.as_slice())
    }
}

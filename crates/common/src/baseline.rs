//! Global index baseline
//!
//! One index shared by every entity, keyed by a plain keyword hash with no
//! counters. Finding one patient's matches means walking the bucket of every
//! patient who shares the keyword, so lookup cost grows with the population.
//! It exists only as the comparison point for the per-entity layout.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::crypto::SealedRecord;
use crate::dsse::Trapdoor;
use crate::record::{DocPointer, EntityId};

/// A global index hit
pub type GlobalHit = (EntityId, DocPointer);

/// Result of a patient-scoped lookup on the global index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineSearch {
    /// Entries belonging to the requested entity
    pub hits: Vec<GlobalHit>,
    /// Entries examined to find them
    pub scanned: usize,
}

#[derive(Debug)]
struct GlobalIndexInner<R> {
    records: HashMap<EntityId, R>,
    index: HashMap<Trapdoor, Vec<GlobalHit>>,
}

/// Single shared trapdoor → (entity, doc) map
#[derive(Debug)]
pub struct GlobalIndex<R = SealedRecord> {
    inner: RwLock<GlobalIndexInner<R>>,
}

impl<R> Default for GlobalIndex<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> GlobalIndex<R> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GlobalIndexInner {
                records: HashMap::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Deterministic keyword hash with no key and no counter
    pub fn plain_trapdoor(keyword: &str) -> Trapdoor {
        Trapdoor::plain(keyword)
    }

    /// Store the record and append `(entity, main_record)` to the bucket of
    /// every keyword
    pub fn upload<S, F>(&self, id: &EntityId, record: R, keywords: &[S], trapdoor_fn: F)
    where
        S: AsRef<str>,
        F: Fn(&str) -> Trapdoor,
    {
        let mut inner = self.inner.write();
        inner.records.insert(id.clone(), record);
        for keyword in keywords {
            inner
                .index
                .entry(trapdoor_fn(keyword.as_ref()))
                .or_default()
                .push((id.clone(), DocPointer::main_record()));
        }
    }

    /// Every match across the whole population
    pub fn search(&self, trapdoors: &[Trapdoor]) -> Vec<GlobalHit> {
        let inner = self.inner.read();
        trapdoors
            .iter()
            .filter_map(|t| inner.index.get(t))
            .flat_map(|hits| hits.iter().cloned())
            .collect()
    }

    /// Matches for one entity, found by filtering each shared bucket
    pub fn search_for_patient(&self, id: &EntityId, trapdoors: &[Trapdoor]) -> BaselineSearch {
        let inner = self.inner.read();
        let mut hits = Vec::new();
        let mut scanned = 0;
        for trapdoor in trapdoors {
            let Some(bucket) = inner.index.get(trapdoor) else {
                continue;
            };
            scanned += bucket.len();
            hits.extend(bucket.iter().filter(|(entity, _)| entity == id).cloned());
        }
        BaselineSearch { hits, scanned }
    }

    /// Number of entries filed under a trapdoor
    pub fn bucket_len(&self, trapdoor: &Trapdoor) -> usize {
        self.inner
            .read()
            .index
            .get(trapdoor)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn entity_count(&self) -> usize {
        self.inner.read().records.len()
    }
}

impl<R: Clone> GlobalIndex<R> {
    pub fn record(&self, id: &EntityId) -> Option<R> {
        self.inner.read().records.get(id).cloned()
    }
}

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::trapdoor::{epoch_key, Trapdoor};
use crate::record::{normalize_keyword, DocPointer};

/// Trapdoor → doc pointers
pub type Index = HashMap<Trapdoor, Vec<DocPointer>>;

/// Entries created by one `build_index` call
pub type IndexPatch = Index;

/// What a delete does to a keyword's derivation state
///
/// Both modes reset the counter to 0. They differ in whether the next
/// insertion re-derives a trapdoor that existed before the delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterReset {
    /// Bump a per-keyword epoch that keys all later derivations, so
    /// post-delete trapdoors never repeat pre-delete ones
    #[default]
    Epoch,
    /// Restart at counter 1 under the same key; post-delete insertions
    /// reproduce pre-delete trapdoors
    Reuse,
}

#[derive(Debug, Clone, Copy, Default)]
struct KeywordState {
    counter: u64,
    epoch: u64,
}

/// Counter values staged by `DsseEngine::stage_index`
#[derive(Debug)]
#[must_use = "staged counters do nothing until committed"]
pub struct PendingCounters(HashMap<String, KeywordState>);

/// Forward-private DSSE state for one entity
///
/// Holds the derivation key and one counter per normalized keyword. A
/// counter only moves up by one per insertion, or back to 0 on delete.
pub struct DsseEngine {
    key: Vec<u8>,
    keywords: HashMap<String, KeywordState>,
    reset: CounterReset,
}

impl fmt::Debug for DsseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsseEngine")
            .field("keywords", &self.keywords.len())
            .field("reset", &self.reset)
            .finish_non_exhaustive()
    }
}

impl DsseEngine {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self::with_reset(key, CounterReset::default())
    }

    pub fn with_reset(key: impl AsRef<[u8]>, reset: CounterReset) -> Self {
        Self {
            key: key.as_ref().to_vec(),
            keywords: HashMap::new(),
            reset,
        }
    }

    /// Current counter of a keyword (0 if never inserted or deleted)
    pub fn counter(&self, keyword: &str) -> u64 {
        self.keywords
            .get(&normalize_keyword(keyword))
            .map(|s| s.counter)
            .unwrap_or(0)
    }

    /// Number of keywords with a non-zero counter
    pub fn live_keywords(&self) -> usize {
        self.keywords.values().filter(|s| s.counter > 0).count()
    }

    /// Insert `doc` under every keyword
    ///
    /// Each occurrence bumps that keyword's counter and yields a singleton
    /// entry for the new trapdoor, including repeats within one call.
    pub fn build_index<S: AsRef<str>>(&mut self, keywords: &[S], doc: &DocPointer) -> IndexPatch {
        let (patch, pending) = self.stage_index(keywords, doc);
        self.commit(pending);
        patch
    }

    /// Derive the patch `build_index` would produce without moving any
    /// counter
    ///
    /// The counters only advance once the returned `PendingCounters` are
    /// passed to `commit`, so a caller can persist the patch first and drop
    /// the pending state if that fails.
    pub fn stage_index<S: AsRef<str>>(
        &self,
        keywords: &[S],
        doc: &DocPointer,
    ) -> (IndexPatch, PendingCounters) {
        let mut patch = IndexPatch::with_capacity(keywords.len());
        let mut pending: HashMap<String, KeywordState> = HashMap::new();
        for keyword in keywords {
            let keyword = normalize_keyword(keyword.as_ref());
            let state = pending
                .entry(keyword.clone())
                .or_insert_with(|| self.keywords.get(&keyword).copied().unwrap_or_default());
            state.counter += 1;
            let trapdoor = Self::derive(&self.key, &keyword, *state);
            patch.insert(trapdoor, vec![doc.clone()]);
        }
        tracing::trace!("staged index patch with {} entries", patch.len());
        (patch, PendingCounters(pending))
    }

    /// Apply counters staged by `stage_index`
    pub fn commit(&mut self, pending: PendingCounters) {
        self.keywords.extend(pending.0);
    }

    /// Re-derive the trapdoors of every insertion since the last delete,
    /// for counters `1..=current` in order
    pub fn generate_search_tokens(&self, keyword: &str) -> Vec<Trapdoor> {
        let keyword = normalize_keyword(keyword);
        match self.keywords.get(&keyword) {
            Some(state) => Self::history(&self.key, &keyword, *state),
            None => Vec::new(),
        }
    }

    /// Return every historical trapdoor of `keyword` for removal and reset
    /// its counter to 0
    pub fn delete(&mut self, keyword: &str) -> Vec<Trapdoor> {
        let keyword = normalize_keyword(keyword);
        let Some(state) = self.keywords.get_mut(&keyword) else {
            return Vec::new();
        };

        let trapdoors = Self::history(&self.key, &keyword, *state);
        if state.counter > 0 && self.reset == CounterReset::Epoch {
            state.epoch += 1;
        }
        state.counter = 0;
        trapdoors
    }

    fn history(key: &[u8], keyword: &str, state: KeywordState) -> Vec<Trapdoor> {
        let key = epoch_key(key, state.epoch);
        (1..=state.counter)
            .map(|counter| Trapdoor::derive(&key, keyword, counter))
            .collect()
    }

    fn derive(key: &[u8], keyword: &str, state: KeywordState) -> Trapdoor {
        Trapdoor::derive(&epoch_key(key, state.epoch), keyword, state.counter)
    }
}

/// Concatenate the doc pointers stored under each trapdoor, in order
///
/// Duplicates across trapdoors are kept.
pub fn search_index(index: &Index, trapdoors: &[Trapdoor]) -> Vec<DocPointer> {
    let mut results = Vec::new();
    for trapdoor in trapdoors {
        if let Some(hits) = index.get(trapdoor) {
            results.extend(hits.iter().cloned());
        }
    }
    results
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    fn doc1() -> DocPointer {
        DocPointer::from("doc1")
    }

    #[test]
    fn test_fever_scenario() {
        let mut engine = DsseEngine::new(b"K");
        let mut index = Index::new();

        let mut trapdoors = Vec::new();
        for _ in 0..3 {
            let patch = engine.build_index(&["fever"], &doc1());
            assert_eq!(patch.len(), 1);
            let (t, docs) = patch.into_iter().next().unwrap();
            assert_eq!(docs, vec![doc1()]);
            index.insert(t, docs);
            trapdoors.push(t);
        }
        assert_eq!(trapdoors.iter().collect::<HashSet<_>>().len(), 3);

        let tokens = engine.generate_search_tokens("fever");
        assert_eq!(tokens, trapdoors);
        assert_eq!(search_index(&index, &tokens), vec![doc1(), doc1(), doc1()]);

        let removed = engine.delete("fever");
        assert_eq!(removed, trapdoors);
        assert!(engine.generate_search_tokens("fever").is_empty());
    }

    #[test]
    fn test_trapdoor_uniqueness() {
        let mut engine = DsseEngine::new(b"K");
        for _ in 0..50 {
            engine.build_index(&["sepsis"], &doc1());
        }
        let tokens = engine.generate_search_tokens("sepsis");
        assert_eq!(tokens.len(), 50);
        assert_eq!(tokens.iter().collect::<HashSet<_>>().len(), 50);
    }

    #[test]
    fn test_repeated_keyword_in_one_call() {
        let mut engine = DsseEngine::new(b"K");
        let patch = engine.build_index(&["fever", "fever"], &doc1());
        assert_eq!(patch.len(), 2);
        assert_eq!(engine.counter("fever"), 2);
    }

    #[test]
    fn test_counter_monotonicity() {
        let mut engine = DsseEngine::new(b"K");
        assert_eq!(engine.counter("insulin"), 0);
        engine.build_index(&["insulin", "sepsis"], &doc1());
        assert_eq!(engine.counter("insulin"), 1);
        engine.build_index(&["Insulin "], &doc1());
        assert_eq!(engine.counter("insulin"), 2);
        assert_eq!(engine.counter("sepsis"), 1);

        // searches do not move counters
        engine.generate_search_tokens("insulin");
        assert_eq!(engine.counter("insulin"), 2);

        engine.delete("insulin");
        assert_eq!(engine.counter("insulin"), 0);
        assert_eq!(engine.counter("sepsis"), 1);
        assert_eq!(engine.live_keywords(), 1);
    }

    #[test]
    fn test_search_completeness() {
        let mut engine = DsseEngine::new(b"K");
        let keywords = ["acute", "kidney", "failure", "metoprolol"];
        let index = engine.build_index(&keywords, &doc1());
        for keyword in keywords {
            let tokens = engine.generate_search_tokens(keyword);
            assert!(search_index(&index, &tokens).contains(&doc1()));
        }
    }

    #[test]
    fn test_unknown_keyword() {
        let mut engine = DsseEngine::new(b"K");
        assert!(engine.generate_search_tokens("missing").is_empty());
        assert!(engine.delete("missing").is_empty());
    }

    #[test]
    fn test_reuse_mode_reproduces_pre_delete_trapdoors() {
        let mut engine = DsseEngine::with_reset(b"K", CounterReset::Reuse);
        let before = engine.build_index(&["fever"], &doc1());
        engine.delete("fever");
        let after = engine.build_index(&["fever"], &doc1());
        assert_eq!(
            before.keys().collect::<Vec<_>>(),
            after.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_epoch_mode_never_repeats_trapdoors() {
        let mut engine = DsseEngine::with_reset(b"K", CounterReset::Epoch);
        let before: HashSet<Trapdoor> = engine
            .build_index(&["fever", "fever"], &doc1())
            .into_keys()
            .collect();
        engine.delete("fever");
        assert_eq!(engine.counter("fever"), 0);

        let after: HashSet<Trapdoor> = engine
            .build_index(&["fever", "fever"], &doc1())
            .into_keys()
            .collect();
        assert!(before.is_disjoint(&after));
        assert_eq!(engine.counter("fever"), 2);

        let tokens: HashSet<Trapdoor> = engine.generate_search_tokens("fever").into_iter().collect();
        assert_eq!(tokens, after);
    }

    #[test]
    fn test_first_epoch_matches_reference_derivation() {
        let mut engine = DsseEngine::new(b"K");
        let patch = engine.build_index(&["fever"], &doc1());
        assert!(patch.contains_key(&Trapdoor::derive(b"K", "fever", 1)));
    }

    #[test]
    fn test_stage_leaves_counters_until_commit() {
        let mut engine = DsseEngine::new(b"K");
        engine.build_index(&["fever"], &doc1());

        let (patch, pending) = engine.stage_index(&["fever", "fever", "cough"], &doc1());
        assert_eq!(patch.len(), 3);
        assert_eq!(engine.counter("fever"), 1);
        assert_eq!(engine.counter("cough"), 0);

        // dropping the staged counters leaves the engine untouched
        drop(pending);
        assert_eq!(engine.generate_search_tokens("fever").len(), 1);

        let (again, pending) = engine.stage_index(&["fever", "fever", "cough"], &doc1());
        assert_eq!(again, patch);
        engine.commit(pending);
        assert_eq!(engine.counter("fever"), 3);
        assert_eq!(engine.counter("cough"), 1);
        let mut tokens: HashSet<Trapdoor> = engine.generate_search_tokens("fever").into_iter().collect();
        tokens.extend(engine.generate_search_tokens("cough"));
        assert_eq!(tokens.len(), 4);
        assert!(patch.keys().all(|t| tokens.contains(t)));
    }

    #[test]
    fn test_debug_hides_key() {
        let engine = DsseEngine::new(b"super-secret");
        assert!(!format!("{:?}", engine).contains("super"));
    }
}

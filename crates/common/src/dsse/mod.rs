//! Dynamic searchable symmetric encryption with forward privacy
//!
//! Each insertion of a keyword bumps that keyword's counter and files the
//! document under a trapdoor derived from `(key, keyword, counter)`. An index
//! holder who has seen trapdoors for counters `1..n` cannot compute the one
//! for `n + 1`, so new insertions are unlinkable to past searches.
//!
//! A search re-derives every trapdoor from 1 up to the current counter; the
//! index holder only ever sees trapdoors.

mod engine;
mod trapdoor;

pub use engine::{search_index, CounterReset, DsseEngine, Index, IndexPatch, PendingCounters};
pub use trapdoor::{Trapdoor, TrapdoorError, TRAPDOOR_SIZE};

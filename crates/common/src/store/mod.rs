//! Server-side per-entity storage
//!
//! The server holds one bundle per entity: the sealed record, the entity's
//! encrypted index and the key encapsulation ciphertext. It is
//! honest-but-curious: it answers trapdoor lookups but never sees keywords.

mod memory;
mod provider;

pub use memory::MemoryIndexStore;
pub use provider::{EntityBundle, IndexStore, SearchQuery, StoreError};

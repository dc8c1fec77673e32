/**
 * Clinician access workflow.
 *  Policy check against the stored key ciphertext,
 *  then owner-minted tokens against the entity index.
 */
pub mod access;
/**
 * Global index baseline used to contrast lookup
 *  cost against the per-entity layout.
 */
pub mod baseline;
/**
 * Cryptographic types and operations.
 *  - Record encryption
 *  - Policy-gated key encapsulation
 *  - Access policy parsing
 */
pub mod crypto;
/**
 * Forward-private dynamic searchable encryption.
 *  Keyword counters, trapdoor derivation and
 *  index patches for a single entity.
 */
pub mod dsse;
/**
 * Data owner: per-entity keys, engines and
 *  the write path into the index store.
 */
pub mod owner;
/**
 * Identifier and record types shared by
 *  every layer.
 */
pub mod record;
/**
 * Server-side storage of per-entity bundles.
 */
pub mod store;

pub mod prelude {
    pub use crate::access::{AccessError, AccessOutcome, Clinician};
    pub use crate::baseline::{BaselineSearch, GlobalIndex};
    pub use crate::crypto::{
        AttributeKem, ChaChaCipher, KeyCiphertext, PolicyKem, RecordCipher, SealedRecord, Secret,
    };
    pub use crate::dsse::{CounterReset, DsseEngine, Trapdoor};
    pub use crate::owner::{Owner, OwnerError};
    pub use crate::record::{DocPointer, EntityId, Record};
    pub use crate::store::{IndexStore, MemoryIndexStore, SearchQuery, StoreError};
}

//! Block persistence
//!
//! The chain talks to storage only through [`BlockStore`]. Two stores ship
//! with the crate: [`SledStore`] is durable, [`MemoryStore`] lives and dies
//! with the process and is meant for tests and throwaway chains.

pub mod memory_store;
pub mod sled_store;

pub use memory_store::MemoryStore;
pub use sled_store::SledStore;

use crate::error::Result;

/// Reserved key holding the tip hash. Block keys are 32-byte hashes, so the
/// one-byte key can never collide with them.
pub const TIP_KEY: &[u8] = b"l";

/// Storage seen by the chain: block hash -> serialized block, plus the tip.
pub trait BlockStore: Send + Sync {
    /// Serialized block stored under `hash`, if any.
    fn get_block(&self, hash: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Current tip hash, or `None` for a store that was never initialized.
    fn get_tip(&self) -> Result<Option<Vec<u8>>>;

    /// Store `block` under `hash` and make `hash` the tip, as one atomic
    /// unit. The commit only happens if the tip still equals `expected_tip`
    /// (`None` meaning no tip yet); otherwise nothing is written and
    /// `BlockchainError::TipMoved` is returned.
    fn commit(&self, hash: &[u8], block: &[u8], expected_tip: Option<&[u8]>) -> Result<()>;

    /// Make every commit so far durable.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool;
}

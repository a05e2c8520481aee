//! # Proof Chain
//!
//! A single-node, append-only chain of blocks. Each block commits to its
//! predecessor's hash and carries a proof-of-work nonce, so editing any
//! stored block without redoing the search is detectable.
//!
//! ## Layout
//! - `core/`: blocks, the proof-of-work engine, the chain and its iterator
//! - `storage/`: the `BlockStore` trait with sled-backed and in-memory stores
//! - `config/`: the `ChainConfig` handed to every chain at construction
//! - `utils/`: hashing, timestamps and the bincode layer
//! - `cli/`: argument parsing for the binary
//!
//! ## Usage
//! ```no_run
//! use proof_chain::{Blockchain, ChainConfig};
//!
//! let config = ChainConfig::default().with_storage_path("blockchain_demo.db");
//! let chain = Blockchain::open(&config)?;
//! chain.add_block(b"Send 1 BTC to Ivan")?;
//! for block in chain.iterator() {
//!     println!("{}", block?.hash_hex());
//! }
//! # Ok::<(), proof_chain::BlockchainError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

pub use cli::{BlockSummary, Command, Opt};
pub use config::ChainConfig;
pub use core::{
    Block, Blockchain, CancelToken, ChainIterator, MiningOptions, ProofOfWork, GENESIS_DATA,
};
pub use error::{BlockchainError, Result};
pub use storage::{BlockStore, MemoryStore, SledStore, TIP_KEY};
pub use utils::{current_timestamp, hash_to_hex, sha256_digest};

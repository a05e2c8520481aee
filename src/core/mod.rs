//! Core chain functionality
//!
//! Blocks, the proof-of-work engine, and the chain with its append protocol
//! and tip-to-genesis iterator.

pub mod block;
pub mod blockchain;
pub mod proof_of_work;

pub use block::{Block, GENESIS_DATA};
pub use blockchain::{Blockchain, ChainIterator};
pub use proof_of_work::{CancelToken, MiningOptions, ProofOfWork};

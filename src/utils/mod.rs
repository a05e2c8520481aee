//! Utility functions and helpers
//!
//! Hashing, timestamps, hex display and the bincode layer used for
//! persisted blocks.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, hash_to_hex, sha256_digest, HASH_LEN};

pub use serialization::{deserialize, serialize};

//! Error handling for the chain
//!
//! Every fallible operation in the crate returns [`Result`]. Nothing in the
//! library panics or exits on a storage failure; the caller decides.

use std::fmt;

/// Result type alias for chain operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error kinds surfaced by the chain, the miner and the stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// The backing store cannot be opened, read or written
    StorageUnavailable(String),
    /// The bounded nonce space was exhausted without meeting the target
    ProofNotFound { max_nonce: i64 },
    /// A hash referenced by the tip or a `prev_block_hash` is not stored
    MissingBlock(String),
    /// Persisted bytes do not decode into a well-formed block
    SerializationMismatch(String),
    /// The search was abandoned through a cancel token
    MiningCancelled,
    /// Another writer advanced the tip between the read and the commit
    TipMoved { expected: String, found: String },
    /// Block or link validation failed while walking the chain
    InvalidBlock(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {msg}"),
            BlockchainError::ProofNotFound { max_nonce } => {
                write!(f, "Proof not found: nonce space exhausted at {max_nonce}")
            }
            BlockchainError::MissingBlock(hash) => write!(f, "Missing block: {hash}"),
            BlockchainError::SerializationMismatch(msg) => {
                write!(f, "Serialization mismatch: {msg}")
            }
            BlockchainError::MiningCancelled => write!(f, "Mining cancelled"),
            BlockchainError::TipMoved { expected, found } => {
                write!(f, "Tip moved: expected {expected}, found {found}")
            }
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::StorageUnavailable(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::SerializationMismatch(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::SerializationMismatch(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

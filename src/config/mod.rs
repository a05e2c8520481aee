//! Configuration management
//!
//! A chain is configured by one explicit [`ChainConfig`] value handed to its
//! constructor. There is no process-wide configuration.

pub mod settings;

pub use settings::{
    ChainConfig, DEFAULT_BUCKET_NAME, DEFAULT_DIFFICULTY_BITS, DEFAULT_NODE_ID,
    DEFAULT_NONCE_CHECK_INTERVAL,
};

//! Command-line interface
//!
//! Argument parsing for the `proof-chain` binary.

pub mod commands;

pub use commands::{BlockSummary, Command, Opt};

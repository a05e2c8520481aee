//! Test helpers
//!
//! Low-difficulty configurations and throwaway chains, durable (in a temp
//! directory) or in memory.

pub mod test_utils;

pub use test_utils::*;

//! Test utilities for chain testing

use crate::config::ChainConfig;
use crate::core::{Block, Blockchain};
use crate::error::Result;
use tempfile::TempDir;

/// Difficulty low enough that every test block mines in milliseconds
pub const TEST_DIFFICULTY: u32 = 8;

/// Low-difficulty configuration pointing at a path that tests replace
pub fn test_config() -> ChainConfig {
    ChainConfig::default().with_difficulty_bits(TEST_DIFFICULTY)
}

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| crate::error::BlockchainError::Io(e.to_string()))
}

/// Create a durable test chain under `<tempdir>/chain`
pub fn create_test_blockchain() -> Result<(Blockchain, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let config = test_config().with_storage_path(temp_dir.path().join("chain"));
    let blockchain = Blockchain::open(&config)?;

    Ok((blockchain, temp_dir))
}

pub fn create_memory_blockchain() -> Result<Blockchain> {
    Blockchain::in_memory(&test_config())
}

/// Append `count` blocks with payloads `block 0`, `block 1`, ...
pub fn mine_blocks(blockchain: &Blockchain, count: usize) -> Result<Vec<Block>> {
    (0..count)
        .map(|i| blockchain.add_block(format!("block {i}").as_bytes()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mine_blocks_extends_chain() {
        let blockchain = create_memory_blockchain().unwrap();
        let blocks = mine_blocks(&blockchain, 3).unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].get_data(), b"block 2");
        assert_eq!(blockchain.get_best_height().unwrap(), 3);
    }
}

use crate::core::{CancelToken, MiningOptions, ProofOfWork};
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, deserialize, hash_to_hex, serialize, sha256_digest, HASH_LEN};
use log::info;
use serde::{Deserialize, Serialize};

pub const GENESIS_DATA: &[u8] = b"Genesis Block";

/// One link of the chain. Never mutated after mining.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    timestamp: i64,
    data: Vec<u8>,
    pre_block_hash: Vec<u8>,
    hash: Vec<u8>,
    nonce: i64,
}

impl Block {
    pub fn new_block(data: &[u8], pre_block_hash: &[u8], options: &MiningOptions) -> Result<Block> {
        Self::new_block_with_cancel(data, pre_block_hash, options, &CancelToken::new())
    }

    pub fn new_block_with_cancel(
        data: &[u8],
        pre_block_hash: &[u8],
        options: &MiningOptions,
        cancel: &CancelToken,
    ) -> Result<Block> {
        let block = Block {
            timestamp: current_timestamp()?,
            data: data.to_vec(),
            pre_block_hash: pre_block_hash.to_vec(),
            hash: Vec::new(),
            nonce: 0,
        };
        block.mine(options, cancel)
    }

    pub fn new_genesis_block(options: &MiningOptions) -> Result<Block> {
        Block::new_block(GENESIS_DATA, &[], options)
    }

    fn mine(mut self, options: &MiningOptions, cancel: &CancelToken) -> Result<Block> {
        info!(
            "Starting proof-of-work for block after {} with difficulty {}",
            hash_to_hex(&self.pre_block_hash),
            options.difficulty_bits
        );
        let (nonce, hash) = ProofOfWork::new_proof_of_work(&self, options.difficulty_bits)?
            .run_with_cancel(options, cancel)?;
        self.nonce = nonce;
        self.hash = hash;
        info!("Proof-of-work completed for block: {}", self.hash_hex());
        Ok(self)
    }

    /// Decode persisted bytes, rejecting anything `serialize` could not
    /// have produced.
    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        let block = deserialize::<Block>(bytes)?;
        if block.hash.len() != HASH_LEN {
            return Err(BlockchainError::SerializationMismatch(format!(
                "block hash is {} bytes, expected {HASH_LEN}",
                block.hash.len()
            )));
        }
        if !block.pre_block_hash.is_empty() && block.pre_block_hash.len() != HASH_LEN {
            return Err(BlockchainError::SerializationMismatch(format!(
                "previous hash is {} bytes, expected 0 or {HASH_LEN}",
                block.pre_block_hash.len()
            )));
        }
        if block.nonce < 0 {
            return Err(BlockchainError::SerializationMismatch(format!(
                "negative nonce {}",
                block.nonce
            )));
        }
        Ok(block)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_data(&self) -> &[u8] {
        self.data.as_slice()
    }

    pub fn get_pre_block_hash(&self) -> &[u8] {
        self.pre_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }

    pub fn pre_block_hash_hex(&self) -> String {
        hash_to_hex(&self.pre_block_hash)
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash.is_empty()
    }

    /// Digest of the payload that goes into the proof-of-work preimage
    pub fn hash_data(&self) -> Vec<u8> {
        sha256_digest(self.data.as_slice())
    }

    /// Build and mine a block with a fixed timestamp (for testing only)
    #[cfg(test)]
    pub fn new_test_block(
        timestamp: i64,
        data: &[u8],
        pre_block_hash: &[u8],
        options: &MiningOptions,
    ) -> Result<Block> {
        Block {
            timestamp,
            data: data.to_vec(),
            pre_block_hash: pre_block_hash.to_vec(),
            hash: Vec::new(),
            nonce: 0,
        }
        .mine(options, &CancelToken::new())
    }

    #[cfg(test)]
    pub(crate) fn with_nonce(mut self, nonce: i64) -> Block {
        self.nonce = nonce;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_data(mut self, data: &[u8]) -> Block {
        self.data = data.to_vec();
        self
    }
}

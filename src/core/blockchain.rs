// The chain itself: a tip pointer over a BlockStore, and the append protocol
// that moves it. Blocks and the tip always change together in one commit.

use crate::config::ChainConfig;
use crate::core::{Block, CancelToken, MiningOptions, ProofOfWork};
use crate::error::{BlockchainError, Result};
use crate::storage::{BlockStore, MemoryStore, SledStore};
use crate::utils::hash_to_hex;
use log::{info, warn};
use std::collections::HashSet;
use std::iter::FusedIterator;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Clone)]
pub struct Blockchain {
    // Last tip this handle saw; the store stays authoritative
    tip_hash: Arc<RwLock<Vec<u8>>>,
    store: Arc<dyn BlockStore>,
    config: ChainConfig,
    mining: MiningOptions,
    // One extension in flight per handle (and its clones)
    append_lock: Arc<Mutex<()>>,
}

impl Blockchain {
    /// Open the durable chain at `config.storage_path`, creating it with a
    /// freshly mined genesis block if the bucket has no tip yet.
    pub fn open(config: &ChainConfig) -> Result<Blockchain> {
        config.validate()?;
        let store = SledStore::open(&config.storage_path, &config.bucket_name)?;
        Self::with_store(Arc::new(store), config)
    }

    /// Ephemeral chain; everything is gone once the last handle is dropped.
    pub fn in_memory(config: &ChainConfig) -> Result<Blockchain> {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn BlockStore>, config: &ChainConfig) -> Result<Blockchain> {
        config.validate()?;
        let mining = MiningOptions::from_config(config).with_worker_pool()?;

        let tip_hash = match store.get_tip()? {
            Some(tip) => {
                if store.get_block(&tip)?.is_none() {
                    return Err(BlockchainError::MissingBlock(hash_to_hex(&tip)));
                }
                info!("Loaded existing blockchain with tip {}", hash_to_hex(&tip));
                tip
            }
            None => Self::create_genesis(store.as_ref(), &mining)?,
        };

        Ok(Blockchain {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            store,
            config: config.clone(),
            mining,
            append_lock: Arc::new(Mutex::new(())),
        })
    }

    fn create_genesis(store: &dyn BlockStore, mining: &MiningOptions) -> Result<Vec<u8>> {
        info!("No existing blockchain found. Creating genesis block");
        let genesis = Block::new_genesis_block(mining)?;

        match store.commit(genesis.get_hash(), &genesis.serialize()?, None) {
            Ok(()) => Ok(genesis.get_hash().to_vec()),
            // Someone else initialized the store first; adopt their genesis.
            Err(BlockchainError::TipMoved { .. }) => store.get_tip()?.ok_or_else(|| {
                BlockchainError::StorageUnavailable("Tip vanished after init race".to_string())
            }),
            Err(e) => Err(e),
        }
    }

    pub fn get_config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn is_durable(&self) -> bool {
        self.store.is_durable()
    }

    /// Tip as last observed by this handle (and its clones). Another handle
    /// over the same store may have moved it since; [`Blockchain::iterator`]
    /// and [`Blockchain::verify_chain`] always start from the stored tip.
    pub fn get_tip_hash(&self) -> Vec<u8> {
        // A poisoned lock still holds a whole Vec; a writer cannot leave it torn.
        self.tip_hash
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn read_stored_tip(&self) -> Result<Vec<u8>> {
        let tip = self.store.get_tip()?.ok_or_else(|| {
            BlockchainError::StorageUnavailable("Tip key missing from store".to_string())
        })?;
        self.set_tip_hash(&tip);
        Ok(tip)
    }

    fn set_tip_hash(&self, new_tip_hash: &[u8]) {
        let mut tip_hash = self
            .tip_hash
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *tip_hash = new_tip_hash.to_vec();
    }

    /// Mine a block carrying `data` on top of the current tip and persist it.
    /// Blocks the calling thread for the whole search.
    pub fn add_block(&self, data: &[u8]) -> Result<Block> {
        self.add_block_with_cancel(data, &CancelToken::new())
    }

    pub fn add_block_with_cancel(&self, data: &[u8], cancel: &CancelToken) -> Result<Block> {
        let _guard = self.append_lock.lock().map_err(|e| {
            BlockchainError::StorageUnavailable(format!("Append lock poisoned: {e}"))
        })?;

        let last_hash = self.read_stored_tip()?;

        let block = match Block::new_block_with_cancel(data, &last_hash, &self.mining, cancel) {
            Ok(block) => block,
            Err(e) => {
                warn!("Mining on top of {} failed: {e}", hash_to_hex(&last_hash));
                return Err(e);
            }
        };

        self.store
            .commit(block.get_hash(), &block.serialize()?, Some(last_hash.as_slice()))?;
        self.set_tip_hash(block.get_hash());

        info!(
            "Added block {} (nonce {}, {} bytes of data)",
            block.hash_hex(),
            block.get_nonce(),
            block.get_data().len()
        );
        Ok(block)
    }

    /// Iterate from the tip currently in storage down to genesis.
    pub fn iterator(&self) -> ChainIterator {
        ChainIterator::new(Arc::clone(&self.store))
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        match self.store.get_block(block_hash)? {
            Some(bytes) => Ok(Some(Block::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Genesis is height 0.
    pub fn get_best_height(&self) -> Result<usize> {
        let count = self
            .iterator()
            .try_fold(0usize, |count, block| block.map(|_| count + 1))?;
        Ok(count.saturating_sub(1))
    }

    /// Hashes from tip to genesis
    pub fn get_block_hashes(&self) -> Result<Vec<Vec<u8>>> {
        self.iterator()
            .map(|block| block.map(|b| b.get_hash().to_vec()))
            .collect()
    }

    /// Walk tip to genesis re-checking every block. Returns the block count.
    pub fn verify_chain(&self) -> Result<usize> {
        let difficulty_bits = self.config.difficulty_bits;
        let mut seen = HashSet::new();
        let mut expected_hash = self.read_stored_tip()?;
        let mut count = 0;

        for block in ChainIterator::from_tip(expected_hash.clone(), Arc::clone(&self.store)) {
            let block = block?;
            if block.get_hash() != expected_hash.as_slice() {
                return Err(BlockchainError::InvalidBlock(format!(
                    "block stored under {} claims hash {}",
                    hash_to_hex(&expected_hash),
                    block.hash_hex()
                )));
            }
            if !seen.insert(block.get_hash().to_vec()) {
                return Err(BlockchainError::InvalidBlock(format!(
                    "cycle detected at {}",
                    block.hash_hex()
                )));
            }
            if !ProofOfWork::new_proof_of_work(&block, difficulty_bits)?.verify() {
                return Err(BlockchainError::InvalidBlock(format!(
                    "proof-of-work check failed for {}",
                    block.hash_hex()
                )));
            }
            expected_hash = block.get_pre_block_hash().to_vec();
            count += 1;
        }

        info!("Verified {count} blocks");
        Ok(count)
    }

    /// Flush durable storage and release this handle.
    pub fn close(self) -> Result<()> {
        self.store.flush()
    }
}

/// Walks the chain from the tip back to genesis, newest first.
///
/// Yields `Err(MissingBlock)` once if a referenced hash is not stored, and
/// nothing after that.
pub struct ChainIterator {
    store: Arc<dyn BlockStore>,
    // None until the first step reads the tip from the store
    current_hash: Option<Vec<u8>>,
    halted: bool,
}

impl ChainIterator {
    fn new(store: Arc<dyn BlockStore>) -> ChainIterator {
        ChainIterator {
            store,
            current_hash: None,
            halted: false,
        }
    }

    fn from_tip(tip_hash: Vec<u8>, store: Arc<dyn BlockStore>) -> ChainIterator {
        ChainIterator {
            store,
            current_hash: Some(tip_hash),
            halted: false,
        }
    }

    fn current_hash(&mut self) -> Result<Vec<u8>> {
        if let Some(hash) = &self.current_hash {
            return Ok(hash.clone());
        }
        let tip = self.store.get_tip()?.ok_or_else(|| {
            BlockchainError::StorageUnavailable("Tip key missing from store".to_string())
        })?;
        self.current_hash = Some(tip.clone());
        Ok(tip)
    }

    fn load(&self, hash: &[u8]) -> Result<Block> {
        let data = self
            .store
            .get_block(hash)?
            .ok_or_else(|| BlockchainError::MissingBlock(hash_to_hex(hash)))?;
        Block::deserialize(&data)
    }
}

impl Iterator for ChainIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        let result = self.current_hash().and_then(|hash| {
            // Empty hash: genesis was the previous item.
            if hash.is_empty() {
                Ok(None)
            } else {
                self.load(&hash).map(Some)
            }
        });
        match result {
            Ok(Some(block)) => {
                self.current_hash = Some(block.get_pre_block_hash().to_vec());
                Some(Ok(block))
            }
            Ok(None) => {
                self.halted = true;
                None
            }
            Err(e) => {
                self.halted = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for ChainIterator {}

// Ephemeral store: the chain is an ordered Vec and the tip is its last entry
use crate::error::{BlockchainError, Result};
use crate::storage::BlockStore;
use crate::utils::hash_to_hex;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    // (hash, serialized block) in append order
    blocks: Vec<(Vec<u8>, Vec<u8>)>,
    index: HashMap<Vec<u8>, usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.blocks.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.blocks.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|e| {
            BlockchainError::StorageUnavailable(format!("Memory store lock poisoned: {e}"))
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|e| {
            BlockchainError::StorageUnavailable(format!("Memory store lock poisoned: {e}"))
        })
    }
}

impl BlockStore for MemoryStore {
    fn get_block(&self, hash: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.read()?;
        Ok(inner
            .index
            .get(hash)
            .map(|&position| inner.blocks[position].1.clone()))
    }

    fn get_tip(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.blocks.last().map(|(hash, _)| hash.clone()))
    }

    fn commit(&self, hash: &[u8], block: &[u8], expected_tip: Option<&[u8]>) -> Result<()> {
        let mut inner = self.write()?;
        let current = inner.blocks.last().map(|(tip, _)| tip.as_slice());
        if current != expected_tip {
            return Err(BlockchainError::TipMoved {
                expected: expected_tip.map(hash_to_hex).unwrap_or_default(),
                found: current.map(hash_to_hex).unwrap_or_default(),
            });
        }
        let position = inner.blocks.len();
        inner.blocks.push((hash.to_vec(), block.to_vec()));
        inner.index.insert(hash.to_vec(), position);
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}

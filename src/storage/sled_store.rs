// Durable store: one sled tree per bucket, blocks and the tip key side by side
use crate::error::{BlockchainError, Result};
use crate::storage::{BlockStore, TIP_KEY};
use crate::utils::hash_to_hex;
use log::{debug, info, warn};
use sled::transaction::{abort, TransactionError};
use sled::{Db, Tree};
use std::path::{Path, PathBuf};

pub struct SledStore {
    db: Db,
    blocks_tree: Tree,
    db_path: PathBuf,
}

impl SledStore {
    /// Open (or create) the database at `path` and its `bucket_name` tree.
    ///
    /// No background flusher runs; every commit is flushed before it
    /// returns, and the file lock goes away with the last handle.
    pub fn open<P: AsRef<Path>>(path: P, bucket_name: &str) -> Result<SledStore> {
        let path = path.as_ref().to_path_buf();
        let db = sled::Config::new()
            .path(&path)
            .flush_every_ms(None)
            .open()
            .map_err(|e| {
                BlockchainError::StorageUnavailable(format!(
                    "Failed to open database at {}: {e}",
                    path.display()
                ))
            })?;
        let blocks_tree = db.open_tree(bucket_name).map_err(|e| {
            BlockchainError::StorageUnavailable(format!(
                "Failed to open bucket {bucket_name}: {e}"
            ))
        })?;
        info!(
            "Opened block store at {} (bucket {bucket_name})",
            path.display()
        );
        Ok(SledStore {
            db,
            blocks_tree,
            db_path: path,
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }
}

impl BlockStore for SledStore {
    fn get_block(&self, hash: &[u8]) -> Result<Option<Vec<u8>>> {
        let data = self.blocks_tree.get(hash).map_err(|e| {
            BlockchainError::StorageUnavailable(format!("Failed to get block: {e}"))
        })?;
        Ok(data.map(|ivec| ivec.to_vec()))
    }

    fn get_tip(&self) -> Result<Option<Vec<u8>>> {
        let data = self.blocks_tree.get(TIP_KEY).map_err(|e| {
            BlockchainError::StorageUnavailable(format!("Failed to get tip hash: {e}"))
        })?;
        Ok(data.map(|ivec| ivec.to_vec()))
    }

    fn commit(&self, hash: &[u8], block: &[u8], expected_tip: Option<&[u8]>) -> Result<()> {
        let result = self.blocks_tree.transaction(|tx_db| {
            let current = tx_db.get(TIP_KEY)?;
            if current.as_deref() != expected_tip {
                return abort(BlockchainError::TipMoved {
                    expected: expected_tip.map(hash_to_hex).unwrap_or_default(),
                    found: current.as_deref().map(hash_to_hex).unwrap_or_default(),
                });
            }
            tx_db.insert(hash, block)?;
            tx_db.insert(TIP_KEY, hash)?;
            Ok(())
        });

        match result {
            Ok(()) => {
                self.flush()?;
                debug!("Committed block {} as new tip", hash_to_hex(hash));
                Ok(())
            }
            Err(TransactionError::Abort(e)) => {
                warn!("Refused commit of {}: {e}", hash_to_hex(hash));
                Err(e)
            }
            Err(TransactionError::Storage(e)) => Err(BlockchainError::StorageUnavailable(
                format!("Failed to update blocks tree: {e}"),
            )),
        }
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| {
            BlockchainError::StorageUnavailable(format!("Failed to flush database: {e}"))
        })?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn hash(byte: u8) -> Vec<u8> {
        vec![byte; 32]
    }

    #[test]
    fn test_fresh_store_has_no_tip() {
        let temp_dir = tempdir().unwrap();
        let store = SledStore::open(temp_dir.path().join("db"), "blocks").unwrap();
        assert_eq!(store.get_tip().unwrap(), None);
        assert_eq!(store.get_block(&hash(1)).unwrap(), None);
        assert!(store.is_durable());
    }

    #[test]
    fn test_commit_sets_block_and_tip() {
        let temp_dir = tempdir().unwrap();
        let store = SledStore::open(temp_dir.path().join("db"), "blocks").unwrap();

        store.commit(&hash(1), b"first", None).unwrap();
        store.commit(&hash(2), b"second", Some(hash(1).as_slice())).unwrap();

        assert_eq!(store.get_tip().unwrap(), Some(hash(2)));
        assert_eq!(store.get_block(&hash(1)).unwrap(), Some(b"first".to_vec()));
        assert_eq!(store.get_block(&hash(2)).unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_stale_commit_writes_nothing() {
        let temp_dir = tempdir().unwrap();
        let store = SledStore::open(temp_dir.path().join("db"), "blocks").unwrap();
        store.commit(&hash(1), b"first", None).unwrap();

        let result = store.commit(&hash(3), b"stale", None);
        assert!(matches!(result, Err(BlockchainError::TipMoved { .. })));
        assert_eq!(store.get_block(&hash(3)).unwrap(), None);
        assert_eq!(store.get_tip().unwrap(), Some(hash(1)));
    }

    #[test]
    fn test_commit_is_visible_after_reopen_without_flush() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("db");
        {
            let store = SledStore::open(&path, "blocks").unwrap();
            store.commit(&hash(1), b"first", None).unwrap();
        }
        let store = SledStore::open(&path, "blocks").unwrap();
        assert_eq!(store.get_tip().unwrap(), Some(hash(1)));
        assert_eq!(store.get_block(&hash(1)).unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn test_buckets_are_isolated() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("db");
        {
            let store = SledStore::open(&path, "blocks").unwrap();
            store.commit(&hash(1), b"first", None).unwrap();
            store.flush().unwrap();
        }
        let other = SledStore::open(&path, "other").unwrap();
        assert_eq!(other.get_tip().unwrap(), None);
        assert_eq!(other.get_db_path(), path.as_path());
    }
}

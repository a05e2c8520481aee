use crate::error::{BlockchainError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BUCKET_NAME: &str = "blocks";
pub const DEFAULT_DIFFICULTY_BITS: u32 = 16;
pub const DEFAULT_NODE_ID: &str = "default";
pub const DEFAULT_NONCE_CHECK_INTERVAL: u64 = 4096;

const NODE_ID_KEY: &str = "NODE_ID";
const STORAGE_PATH_KEY: &str = "STORAGE_PATH";
const DIFFICULTY_BITS_KEY: &str = "DIFFICULTY_BITS";
const MINING_WORKERS_KEY: &str = "MINING_WORKERS";

/// Everything a chain needs at construction time.
///
/// Built from defaults, then an optional TOML file, then environment
/// variables; the CLI applies its own flags last.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Name of the sled tree that holds blocks and the tip key
    pub bucket_name: String,
    /// Leading zero bits required of every block hash
    pub difficulty_bits: u32,
    /// Directory of the sled database
    pub storage_path: PathBuf,
    /// Rayon workers used by the nonce search; 1 is the sequential search
    pub mining_workers: usize,
    /// How many nonces a worker tries between cancellation checks
    pub nonce_check_interval: u64,
    /// Exclusive upper bound of the nonce search
    pub max_nonce: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            bucket_name: String::from(DEFAULT_BUCKET_NAME),
            difficulty_bits: DEFAULT_DIFFICULTY_BITS,
            storage_path: Self::node_storage_path(DEFAULT_NODE_ID),
            mining_workers: 1,
            nonce_check_interval: DEFAULT_NONCE_CHECK_INTERVAL,
            max_nonce: i64::MAX,
        }
    }
}

impl ChainConfig {
    /// Database location for a node: `blockchain_<node_id>.db`
    pub fn node_storage_path(node_id: &str) -> PathBuf {
        PathBuf::from(format!("blockchain_{node_id}.db"))
    }

    pub fn with_storage_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.storage_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_difficulty_bits(mut self, difficulty_bits: u32) -> Self {
        self.difficulty_bits = difficulty_bits;
        self
    }

    pub fn with_mining_workers(mut self, workers: usize) -> Self {
        self.mining_workers = workers;
        self
    }

    pub fn with_max_nonce(mut self, max_nonce: i64) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    pub fn with_bucket_name(mut self, bucket_name: &str) -> Self {
        self.bucket_name = String::from(bucket_name);
        self
    }

    /// Read a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<ChainConfig> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            BlockchainError::Config(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<ChainConfig> {
        let config: ChainConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<ChainConfig> {
        ChainConfig::default().apply_env()
    }

    /// Apply `NODE_ID`, `STORAGE_PATH`, `DIFFICULTY_BITS` and `MINING_WORKERS`.
    /// `STORAGE_PATH` wins over the path derived from `NODE_ID`.
    pub fn apply_env(mut self) -> Result<ChainConfig> {
        if let Ok(node_id) = env::var(NODE_ID_KEY) {
            self.storage_path = Self::node_storage_path(&node_id);
        }
        if let Ok(path) = env::var(STORAGE_PATH_KEY) {
            self.storage_path = PathBuf::from(path);
        }
        if let Ok(bits) = env::var(DIFFICULTY_BITS_KEY) {
            self.difficulty_bits = bits.parse().map_err(|e| {
                BlockchainError::Config(format!("Invalid {DIFFICULTY_BITS_KEY} '{bits}': {e}"))
            })?;
        }
        if let Ok(workers) = env::var(MINING_WORKERS_KEY) {
            self.mining_workers = workers.parse().map_err(|e| {
                BlockchainError::Config(format!("Invalid {MINING_WORKERS_KEY} '{workers}': {e}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket_name.is_empty() {
            return Err(BlockchainError::Config(
                "bucket_name must not be empty".to_string(),
            ));
        }
        if self.difficulty_bits >= 256 {
            return Err(BlockchainError::Config(format!(
                "difficulty_bits must be below 256, got {}",
                self.difficulty_bits
            )));
        }
        if self.mining_workers == 0 {
            return Err(BlockchainError::Config(
                "mining_workers must be at least 1".to_string(),
            ));
        }
        if self.nonce_check_interval == 0 {
            return Err(BlockchainError::Config(
                "nonce_check_interval must be at least 1".to_string(),
            ));
        }
        if self.max_nonce <= 0 {
            return Err(BlockchainError::Config(format!(
                "max_nonce must be positive, got {}",
                self.max_nonce
            )));
        }
        Ok(())
    }
}

use crate::config::ChainConfig;
use crate::core::{Block, Blockchain};
use crate::error::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "proof-chain")]
pub struct Opt {
    #[arg(long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
    #[arg(long = "db", global = true, help = "Database directory")]
    pub db: Option<PathBuf>,
    #[arg(long, global = true, help = "Required leading zero bits (0-255)")]
    pub difficulty: Option<u32>,
    #[arg(long, global = true, help = "Parallel mining workers")]
    pub workers: Option<usize>,
    #[arg(long, global = true, help = "Keep the chain in memory for this run only")]
    pub memory: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "addblock", about = "Mine a block carrying DATA and append it")]
    Addblock {
        #[arg(help = "Block payload")]
        data: String,
        #[arg(long = "timeout-secs", help = "Abandon mining after this many seconds")]
        timeout_secs: Option<u64>,
    },
    #[command(name = "printchain", about = "Print all blocks from tip to genesis")]
    Printchain {
        #[arg(long, help = "One JSON object per block")]
        json: bool,
    },
    #[command(name = "verifychain", about = "Re-check every block and link")]
    Verifychain,
    #[command(name = "tip", about = "Print the tip hash")]
    Tip,
}

impl Opt {
    /// Defaults, then the config file, then environment, then flags.
    pub fn chain_config(&self) -> Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => ChainConfig::from_toml_file(path)?.apply_env()?,
            None => ChainConfig::from_env()?,
        };
        if let Some(db) = &self.db {
            config = config.with_storage_path(db);
        }
        if let Some(bits) = self.difficulty {
            config = config.with_difficulty_bits(bits);
        }
        if let Some(workers) = self.workers {
            config = config.with_mining_workers(workers);
        }
        config.validate()?;
        Ok(config)
    }

    /// Open the chain the flags describe: in memory with `--memory`,
    /// otherwise the sled database at the configured path.
    pub fn open_chain(&self) -> Result<Blockchain> {
        let config = self.chain_config()?;
        if self.memory {
            Blockchain::in_memory(&config)
        } else {
            Blockchain::open(&config)
        }
    }
}

/// Printable view of a block; hashes in hex, payload as lossy UTF-8
#[derive(Debug, Serialize)]
pub struct BlockSummary {
    pub hash: String,
    pub prev_hash: String,
    pub timestamp: i64,
    pub nonce: i64,
    pub data: String,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        BlockSummary {
            hash: block.hash_hex(),
            prev_hash: block.pre_block_hash_hex(),
            timestamp: block.get_timestamp(),
            nonce: block.get_nonce(),
            data: String::from_utf8_lossy(block.get_data()).into_owned(),
        }
    }
}

use crate::config::ChainConfig;
use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::{hash_to_hex, sha256_digest};
use log::{debug, info, warn};
use num_bigint::{BigInt, Sign};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::ops::ShlAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag a caller raises to abandon a nonce search.
///
/// Clones observe the same flag, so one copy can be handed to another thread
/// (a timer, a signal handler) while the miner holds the other.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Knobs of a single nonce search.
///
/// With more than one worker the search runs on a rayon pool. Call
/// [`MiningOptions::with_worker_pool`] to build that pool once and share it
/// across searches; otherwise each search builds its own.
#[derive(Debug, Clone)]
pub struct MiningOptions {
    pub difficulty_bits: u32,
    pub workers: usize,
    pub check_interval: u64,
    pub max_nonce: i64,
    pool: Option<Arc<ThreadPool>>,
}

impl MiningOptions {
    /// Sequential search over the full nonce range.
    pub fn new(difficulty_bits: u32) -> MiningOptions {
        MiningOptions {
            difficulty_bits,
            workers: 1,
            check_interval: crate::config::DEFAULT_NONCE_CHECK_INTERVAL,
            max_nonce: i64::MAX,
            pool: None,
        }
    }

    pub fn from_config(config: &ChainConfig) -> MiningOptions {
        MiningOptions {
            difficulty_bits: config.difficulty_bits,
            workers: config.mining_workers.max(1),
            check_interval: config.nonce_check_interval.max(1),
            max_nonce: config.max_nonce,
            pool: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> MiningOptions {
        self.workers = workers.max(1);
        self.pool = None;
        self
    }

    /// Build the rayon pool used by parallel searches. A no-op for one worker.
    pub fn with_worker_pool(mut self) -> Result<MiningOptions> {
        if self.workers > 1 && self.pool.is_none() {
            self.pool = Some(Arc::new(build_pool(self.workers)?));
        }
        Ok(self)
    }

    pub fn has_worker_pool(&self) -> bool {
        self.pool.is_some()
    }

    pub fn with_max_nonce(mut self, max_nonce: i64) -> MiningOptions {
        self.max_nonce = max_nonce;
        self
    }

    pub fn with_check_interval(mut self, check_interval: u64) -> MiningOptions {
        self.check_interval = check_interval.max(1);
        self
    }
}

fn build_pool(workers: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("miner-{i}"))
        .build()
        .map_err(|e| BlockchainError::Config(format!("Failed to start miners: {e}")))
}

enum SearchOutcome {
    Found(i64, Vec<u8>),
    Exhausted,
    Stopped,
}

/// Fold worker results into the search result. Several workers may hit inside
/// one check window; the lowest nonce wins.
fn settle(outcomes: Vec<SearchOutcome>, max_nonce: i64) -> Result<(i64, Vec<u8>)> {
    let mut winner: Option<(i64, Vec<u8>)> = None;
    let mut stopped = false;
    for outcome in outcomes {
        match outcome {
            SearchOutcome::Found(nonce, hash) => {
                if winner.as_ref().map_or(true, |(best, _)| nonce < *best) {
                    winner = Some((nonce, hash));
                }
            }
            SearchOutcome::Stopped => stopped = true,
            SearchOutcome::Exhausted => {}
        }
    }

    match winner {
        Some((nonce, hash)) => {
            info!("Found nonce {nonce}: {}", hash_to_hex(&hash));
            Ok((nonce, hash))
        }
        // Only a worker cut short by the token counts as cancelled.
        None if stopped => {
            warn!("Mining cancelled before a proof was found");
            Err(BlockchainError::MiningCancelled)
        }
        None => Err(BlockchainError::ProofNotFound { max_nonce }),
    }
}

pub struct ProofOfWork<'a> {
    block: &'a Block,
    target: BigInt,
    difficulty_bits: u32,
    // prev_block_hash || sha256(data) || timestamp || difficulty_bits
    header: Vec<u8>,
}

impl<'a> ProofOfWork<'a> {
    pub fn new_proof_of_work(block: &'a Block, difficulty_bits: u32) -> Result<ProofOfWork<'a>> {
        if difficulty_bits >= 256 {
            return Err(BlockchainError::Config(format!(
                "difficulty_bits must be below 256, got {difficulty_bits}"
            )));
        }
        let mut target = BigInt::from(1);
        target.shl_assign(256 - difficulty_bits);

        let mut header = vec![];
        header.extend(block.get_pre_block_hash());
        header.extend(block.hash_data());
        header.extend(block.get_timestamp().to_be_bytes());
        header.extend(i64::from(difficulty_bits).to_be_bytes());

        Ok(ProofOfWork {
            block,
            target,
            difficulty_bits,
            header,
        })
    }

    /// Check a block's stored nonce against `difficulty_bits`.
    pub fn validate_block(block: &Block, difficulty_bits: u32) -> Result<bool> {
        Ok(ProofOfWork::new_proof_of_work(block, difficulty_bits)?.validate())
    }

    pub fn get_target(&self) -> &BigInt {
        &self.target
    }

    pub fn get_difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    /// The exact bytes hashed for `nonce`; mining and validation both use it.
    pub fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let mut data_bytes = Vec::with_capacity(self.header.len() + 8);
        data_bytes.extend_from_slice(&self.header);
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    pub fn hash_meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    /// Recompute the hash from the stored nonce; the stored hash field is
    /// never consulted.
    pub fn validate(&self) -> bool {
        let hash = sha256_digest(&self.prepare_data(self.block.get_nonce()));
        self.hash_meets_target(&hash)
    }

    /// [`validate`](Self::validate) plus equality with the stored hash field.
    pub fn verify(&self) -> bool {
        let hash = sha256_digest(&self.prepare_data(self.block.get_nonce()));
        self.hash_meets_target(&hash) && hash.as_slice() == self.block.get_hash()
    }

    pub fn run(&self, options: &MiningOptions) -> Result<(i64, Vec<u8>)> {
        self.run_with_cancel(options, &CancelToken::new())
    }

    /// Search for the nonce. With one worker this counts up from zero; with
    /// more, worker `w` of `W` tries `w, w + W, w + 2W, ...` and the first
    /// hit stops the rest.
    pub fn run_with_cancel(
        &self,
        options: &MiningOptions,
        cancel: &CancelToken,
    ) -> Result<(i64, Vec<u8>)> {
        let workers = options.workers.max(1);
        let check_interval = options.check_interval.max(1);
        let found = AtomicBool::new(false);

        debug!(
            "Mining with {workers} worker(s), difficulty {}",
            self.difficulty_bits
        );

        let outcomes = if workers == 1 {
            vec![self.search_stride(0, 1, options.max_nonce, check_interval, cancel, &found)]
        } else {
            let owned;
            let pool = match &options.pool {
                Some(pool) => pool.as_ref(),
                None => {
                    owned = build_pool(workers)?;
                    &owned
                }
            };
            let stride = workers as i64;
            pool.install(|| {
                (0..stride)
                    .into_par_iter()
                    .map(|start| {
                        self.search_stride(
                            start,
                            stride,
                            options.max_nonce,
                            check_interval,
                            cancel,
                            &found,
                        )
                    })
                    .collect::<Vec<_>>()
            })
        };

        settle(outcomes, options.max_nonce)
    }
    fn search_stride(
        &self,
        start: i64,
        step: i64,
        max_nonce: i64,
        check_interval: u64,
        cancel: &CancelToken,
        found: &AtomicBool,
    ) -> SearchOutcome {
        let mut nonce = start;
        let mut since_check = check_interval;
        while nonce < max_nonce {
            if since_check == check_interval {
                since_check = 0;
                if cancel.is_cancelled() || found.load(Ordering::Relaxed) {
                    return SearchOutcome::Stopped;
                }
            }
            since_check += 1;

            let hash = sha256_digest(&self.prepare_data(nonce));
            if self.hash_meets_target(&hash) {
                found.store(true, Ordering::Relaxed);
                return SearchOutcome::Found(nonce, hash);
            }
            nonce = match nonce.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        SearchOutcome::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_block(difficulty: u32) -> Block {
        Block::new_test_block(1_700_000_000, b"test payload", &[], &MiningOptions::new(difficulty))
            .unwrap()
    }

    #[test]
    fn test_proof_of_work_creation() {
        let block = create_test_block(4);
        let pow = ProofOfWork::new_proof_of_work(&block, 4).unwrap();

        assert_eq!(pow.get_difficulty_bits(), 4);
        assert_eq!(*pow.get_target(), BigInt::from(1) << 252);
    }

    #[test]
    fn test_difficulty_out_of_range() {
        let block = create_test_block(1);
        assert!(matches!(
            ProofOfWork::new_proof_of_work(&block, 256),
            Err(BlockchainError::Config(_))
        ));
    }

    #[test]
    fn test_zero_difficulty_accepts_first_nonce() {
        let block = create_test_block(0);
        assert_eq!(block.get_nonce(), 0);
        assert!(ProofOfWork::validate_block(&block, 0).unwrap());
    }

    #[test]
    fn test_proof_of_work_validation_valid_block() {
        let block = create_test_block(8);
        let pow = ProofOfWork::new_proof_of_work(&block, 8).unwrap();

        assert!(pow.validate());
        assert!(pow.verify());
        assert!(pow.hash_meets_target(block.get_hash()));
    }

    #[test]
    fn test_every_smaller_nonce_fails() {
        // The sequential search returns the first satisfying nonce.
        let block = create_test_block(10);
        for nonce in 0..block.get_nonce() {
            let tampered = block.clone().with_nonce(nonce);
            assert!(!ProofOfWork::validate_block(&tampered, 10).unwrap());
        }
    }

    #[test]
    fn test_higher_difficulty_has_smaller_target() {
        let block = create_test_block(1);
        let easy = ProofOfWork::new_proof_of_work(&block, 1).unwrap();
        let hard = ProofOfWork::new_proof_of_work(&block, 2).unwrap();
        assert!(hard.get_target() < easy.get_target());
    }

    #[test]
    fn test_prepare_data_layout() {
        let block = create_test_block(2);
        let pow = ProofOfWork::new_proof_of_work(&block, 2).unwrap();

        let data = pow.prepare_data(12345);
        assert_eq!(data, pow.prepare_data(12345));
        assert_ne!(data, pow.prepare_data(54321));

        // Genesis: empty prev hash, 32-byte payload digest, three 8-byte fields.
        assert_eq!(data.len(), 32 + 8 * 3);
        assert_eq!(&data[..32], block.hash_data().as_slice());
        assert_eq!(&data[32..40], &1_700_000_000i64.to_be_bytes());
        assert_eq!(&data[40..48], &2i64.to_be_bytes());
        assert_eq!(&data[48..56], &12345i64.to_be_bytes());
    }

    #[test]
    fn test_proof_not_found_when_nonce_space_exhausted() {
        let block = create_test_block(0);
        let pow = ProofOfWork::new_proof_of_work(&block, 255).unwrap();
        let options = MiningOptions::new(255).with_max_nonce(16);

        assert_eq!(
            pow.run(&options),
            Err(BlockchainError::ProofNotFound { max_nonce: 16 })
        );
    }

    #[test]
    fn test_cancelled_search() {
        let block = create_test_block(0);
        let pow = ProofOfWork::new_proof_of_work(&block, 255).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(
            pow.run_with_cancel(&MiningOptions::new(255), &cancel),
            Err(BlockchainError::MiningCancelled)
        );
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let block = create_test_block(0);
        let pow = ProofOfWork::new_proof_of_work(&block, 255).unwrap();
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            remote.cancel();
        });

        let options = MiningOptions::new(255).with_check_interval(64);
        assert_eq!(
            pow.run_with_cancel(&options, &cancel),
            Err(BlockchainError::MiningCancelled)
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_parallel_search_finds_valid_nonce() {
        let block = create_test_block(0);
        let pow = ProofOfWork::new_proof_of_work(&block, 12).unwrap();
        let options = MiningOptions::new(12).with_workers(4).with_check_interval(16);

        let (nonce, hash) = pow.run(&options).unwrap();
        assert!(pow.hash_meets_target(&hash));
        assert_eq!(sha256_digest(&pow.prepare_data(nonce)), hash);
    }

    #[test]
    fn test_exhausted_workers_win_over_late_cancel() {
        // Every worker ran out of nonces; a token raised afterwards is moot.
        assert_eq!(
            settle(vec![SearchOutcome::Exhausted, SearchOutcome::Exhausted], 8),
            Err(BlockchainError::ProofNotFound { max_nonce: 8 })
        );
        assert_eq!(
            settle(vec![SearchOutcome::Exhausted, SearchOutcome::Stopped], 8),
            Err(BlockchainError::MiningCancelled)
        );
        assert_eq!(
            settle(
                vec![
                    SearchOutcome::Found(7, vec![7]),
                    SearchOutcome::Stopped,
                    SearchOutcome::Found(3, vec![3]),
                ],
                8
            ),
            Ok((3, vec![3]))
        );
    }

    #[test]
    fn test_shared_pool_is_reused_across_searches() {
        let options = MiningOptions::new(6)
            .with_workers(3)
            .with_check_interval(8)
            .with_worker_pool()
            .unwrap();
        assert!(options.has_worker_pool());
        assert!(!MiningOptions::new(6).with_worker_pool().unwrap().has_worker_pool());

        for data in [&b"first"[..], b"second", b"third"] {
            let block = Block::new_block(data, &[], &options).unwrap();
            assert!(ProofOfWork::validate_block(&block, 6).unwrap());
        }
    }

    #[test]
    fn test_parallel_exhaustion_reports_not_found() {
        let block = create_test_block(0);
        let pow = ProofOfWork::new_proof_of_work(&block, 255).unwrap();
        let options = MiningOptions::new(255).with_workers(3).with_max_nonce(30);

        assert_eq!(
            pow.run(&options),
            Err(BlockchainError::ProofNotFound { max_nonce: 30 })
        );
    }
}

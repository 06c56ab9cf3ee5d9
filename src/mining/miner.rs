//! Mining engine for the ledger
//!
//! Drives the proof-of-work search for a block with a cancellation hook,
//! optionally sharding the nonce space across worker threads.

use crate::core::{Block, BlockError};
use crate::crypto::{leading_zeros, meets_difficulty};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;

/// Nonces tried between cancellation checks
pub const SEARCH_BATCH: u64 = 4_096;

/// Mining errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] BlockError),
    #[error("Mining cancelled")]
    Cancelled,
}

/// Shared flag to stop an in-progress search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(hash_attempts: u64, start: Instant) -> Self {
        let time_ms = start.elapsed().as_millis();
        let hash_rate = if time_ms > 0 {
            (hash_attempts as f64) / (time_ms as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };
        Self {
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// Miner for sealing blocks at a fixed difficulty
#[derive(Debug, Clone)]
pub struct Miner {
    /// Required leading zero hex digits
    pub difficulty: u32,
    /// Worker threads for the nonce search
    pub threads: usize,
}

impl Miner {
    /// Create a single-threaded miner
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            threads: 1,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Mine a block in place
    ///
    /// The block's transactions are validated before any hashing. On
    /// success the block holds the winning nonce and hash.
    pub fn mine(
        &self,
        block: &mut Block,
        cancel: &CancelToken,
    ) -> Result<MiningStats, MiningError> {
        block.validate_transactions()?;

        let start = Instant::now();
        debug!(
            "Mining block on {} with difficulty {} ({} thread(s))",
            short(&block.previous_hash),
            self.difficulty,
            self.threads
        );

        let attempts = if self.threads > 1 {
            self.search_parallel(block, cancel)?
        } else {
            self.search_sequential(block, cancel)?
        };

        let stats = MiningStats::new(attempts, start);
        info!(
            "Block {} mined in {}ms ({} leading zeros, {} attempts, {:.2} H/s)",
            short(&block.hash),
            stats.time_ms,
            leading_zeros(&block.hash),
            stats.hash_attempts,
            stats.hash_rate
        );
        Ok(stats)
    }

    fn search_sequential(
        &self,
        block: &mut Block,
        cancel: &CancelToken,
    ) -> Result<u64, MiningError> {
        let mut attempts = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(MiningError::Cancelled);
            }
            let start = block.nonce;
            match block.search(self.difficulty, SEARCH_BATCH) {
                Some(found) => return Ok(attempts + found),
                None if block.nonce == start => {
                    return Err(BlockError::NonceExhausted.into());
                }
                None => attempts += block.nonce - start,
            }
        }
    }

    /// Worker `w` tries nonces `first + w`, `first + w + threads`, ...
    /// The first worker to find a hash wins and the others stop.
    fn search_parallel(
        &self,
        block: &mut Block,
        cancel: &CancelToken,
    ) -> Result<u64, MiningError> {
        let found = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);
        let winner: Mutex<Option<(u64, String)>> = Mutex::new(None);
        let first = block.nonce;
        let stride = self.threads as u64;
        let template: &Block = &*block;

        thread::scope(|scope| {
            for worker in 0..stride {
                let (found, attempts, winner) = (&found, &attempts, &winner);
                scope.spawn(move || {
                    let mut candidate = template.clone();
                    let Some(mut nonce) = first.checked_add(worker) else {
                        return;
                    };
                    let mut local = 0u64;
                    loop {
                        if local % SEARCH_BATCH == 0
                            && (found.load(Ordering::Relaxed) || cancel.is_cancelled())
                        {
                            break;
                        }
                        candidate.nonce = nonce;
                        let hash = candidate.calculate_hash();
                        local += 1;
                        if meets_difficulty(&hash, self.difficulty) {
                            let mut slot = winner.lock();
                            if slot.is_none() {
                                *slot = Some((nonce, hash));
                            }
                            found.store(true, Ordering::Relaxed);
                            break;
                        }
                        match nonce.checked_add(stride) {
                            Some(next) => nonce = next,
                            None => break,
                        }
                    }
                    attempts.fetch_add(local, Ordering::Relaxed);
                });
            }
        });

        match winner.into_inner() {
            Some((nonce, hash)) => {
                block.nonce = nonce;
                block.hash = hash;
                Ok(attempts.into_inner())
            }
            None if cancel.is_cancelled() => Err(MiningError::Cancelled),
            None => Err(BlockError::NonceExhausted.into()),
        }
    }
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

//! Block implementation for the ledger
//!
//! A block links to its predecessor by hash and carries either a batch of
//! transactions or a plain note (the genesis sentinel and raw appends).

use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::{meets_difficulty, sha256_hex};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Nonce every block starts from before mining
pub const INITIAL_NONCE: u64 = 1;

// =============================================================================
// Block Errors
// =============================================================================

/// Block validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Invalid transaction at position {position}: {source}")]
    InvalidTransaction {
        position: usize,
        source: TransactionError,
    },
    #[error("Nonce space exhausted")]
    NonceExhausted,
}

/// Block content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockData {
    Note(String),
    Transactions(Vec<Transaction>),
}

/// A block in the chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Block content
    pub data: BlockData,
    /// Hash of the previous block, empty for genesis
    pub previous_hash: String,
    /// Hash of this block (cached, re-derived on audit)
    pub hash: String,
    /// Nonce used for proof of work
    pub nonce: u64,
    /// Creation time, millisecond precision
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Block {
    /// Create a new transaction block (unmined)
    pub fn new(transactions: Vec<Transaction>, previous_hash: &str) -> Self {
        Self::with_data(BlockData::Transactions(transactions), previous_hash)
    }

    /// Create a block carrying a note instead of transactions
    pub fn note(note: &str, previous_hash: &str) -> Self {
        Self::with_data(BlockData::Note(note.to_string()), previous_hash)
    }

    fn with_data(data: BlockData, previous_hash: &str) -> Self {
        let mut block = Self {
            data,
            previous_hash: previous_hash.to_string(),
            hash: String::new(),
            nonce: INITIAL_NONCE,
            timestamp: Utc::now().trunc_subsecs(3),
        };
        // Provisional until mined
        block.hash = block.calculate_hash();
        block
    }

    /// Create the genesis block
    pub fn genesis(note: &str) -> Self {
        Self::note(note, "")
    }

    /// Transactions carried by this block (empty for note blocks)
    pub fn transactions(&self) -> &[Transaction] {
        match &self.data {
            BlockData::Transactions(txs) => txs.as_slice(),
            BlockData::Note(_) => &[],
        }
    }

    pub fn transactions_mut(&mut self) -> Option<&mut Vec<Transaction>> {
        match &mut self.data {
            BlockData::Transactions(txs) => Some(txs),
            BlockData::Note(_) => None,
        }
    }

    /// Calculate the hash from `(previous_hash, data, nonce, timestamp)`
    pub fn calculate_hash(&self) -> String {
        let payload = serde_json::json!([
            self.previous_hash,
            self.data,
            self.nonce,
            self.timestamp.timestamp_millis()
        ]);
        sha256_hex(payload.to_string().as_bytes())
    }

    /// Verify the cached block hash
    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Check if the cached hash meets the difficulty target
    pub fn is_mined(&self, difficulty: u32) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Check every contained transaction
    pub fn validate_transactions(&self) -> Result<(), BlockError> {
        for (position, tx) in self.transactions().iter().enumerate() {
            tx.validate()
                .map_err(|source| BlockError::InvalidTransaction { position, source })?;
        }
        Ok(())
    }

    /// True iff every contained transaction verifies
    pub fn has_valid_transactions(&self) -> bool {
        self.validate_transactions().is_ok()
    }

    /// Try up to `budget` nonces starting from the current one
    ///
    /// Returns `Some(attempts)` once the hash meets `difficulty`, leaving the
    /// winning nonce and hash in place; `None` if the budget ran out, with
    /// the nonce advanced past the tried range.
    pub fn search(&mut self, difficulty: u32, budget: u64) -> Option<u64> {
        for attempt in 1..=budget {
            self.hash = self.calculate_hash();
            if meets_difficulty(&self.hash, difficulty) {
                return Some(attempt);
            }
            self.nonce = self.nonce.checked_add(1)?;
        }
        None
    }

    /// Mine the block (find a valid nonce)
    ///
    /// Transactions are checked first; on failure nothing is searched. The
    /// search itself is unbounded: expected work is about 16^difficulty
    /// hashes and termination is a liveness assumption.
    pub fn mine(&mut self, difficulty: u32) -> Result<u64, BlockError> {
        self.validate_transactions()?;

        let mut attempts = 0u64;
        loop {
            let start = self.nonce;
            match self.search(difficulty, u64::MAX) {
                Some(found) => return Ok(attempts.saturating_add(found)),
                None if self.nonce == start => return Err(BlockError::NonceExhausted),
                None => attempts = attempts.saturating_add(self.nonce - start),
            }
        }
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions().len()
    }
}

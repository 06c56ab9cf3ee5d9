//! Transaction pool (mempool) for pending transactions
//!
//! Holds authenticated transactions waiting to be packed into a block, in
//! submission order. All access goes through one exclusive lock so that
//! concurrent `admit` and `drain` calls neither lose nor duplicate entries.

use crate::core::{Transaction, TransactionError};
use log::{debug, warn};
use parking_lot::Mutex;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Mempool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),
}

// =============================================================================
// Mempool
// =============================================================================

/// Memory pool for pending transactions
#[derive(Debug, Default)]
pub struct Mempool {
    pending: Mutex<Vec<Transaction>>,
}

impl Mempool {
    /// Create a new mempool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transaction to the pool
    ///
    /// Transfers whose signature does not verify against their current
    /// content are rejected and not enqueued.
    pub fn admit(&self, tx: Transaction) -> Result<(), MempoolError> {
        if let Err(e) = tx.validate() {
            warn!(
                "Rejected transaction {} from mempool: {}",
                tx.content_digest(),
                e
            );
            return Err(e.into());
        }

        debug!(
            "Admitted transaction {} ({} -> {}, amount {})",
            tx.content_digest(),
            tx.sender().unwrap_or("<reward>"),
            tx.recipient(),
            tx.amount()
        );
        self.pending.lock().push(tx);
        Ok(())
    }

    /// Remove and return every pending transaction, oldest first
    pub fn drain(&self) -> Vec<Transaction> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Put transactions back at the front of the pool, keeping their order
    pub(crate) fn requeue(&self, txs: Vec<Transaction>) {
        if txs.is_empty() {
            return;
        }
        let mut pending = self.pending.lock();
        let newer = std::mem::replace(&mut *pending, txs);
        pending.extend(newer);
    }

    /// Snapshot of the pending transactions
    pub fn pending(&self) -> Vec<Transaction> {
        self.pending.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Clone for Mempool {
    fn clone(&self) -> Self {
        Self {
            pending: Mutex::new(self.pending()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (signed transfers and miner rewards)
//! - Blocks (hash-linked, proof of work)
//! - Chain (genesis, packaging, full audit)

pub mod block;
pub mod chain;
pub mod transaction;

pub use block::{Block, BlockData, BlockError, INITIAL_NONCE};
pub use chain::{Chain, ChainError, ChainStats, FailureKind, ValidationFailure};
pub use transaction::{Transaction, TransactionError, REWARD_SENDER};

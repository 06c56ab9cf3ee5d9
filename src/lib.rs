//! Powledger: a minimal append-only proof-of-work ledger in Rust
//!
//! This crate provides:
//! - Signed transfers and miner rewards (ECDSA, secp256k1)
//! - Hash-linked blocks sealed by a leading-zero proof of work
//! - An admission-filtered mempool
//! - Full-chain audits that pinpoint the first tampered block
//!
//! The ledger is in-memory only; persistence and transport belong to the
//! embedding application.
//!
//! # Example
//!
//! ```rust
//! use powledger::core::{Chain, Transaction};
//! use powledger::crypto::KeyPair;
//!
//! let mut chain = Chain::with_difficulty(2).unwrap();
//! let alice = KeyPair::generate();
//!
//! let mut tx = Transaction::new(&alice.public_key_hex(), "bob", 10);
//! tx.sign(&alice).unwrap();
//! chain.submit_transaction(tx).unwrap();
//!
//! let block = chain.package_mempool("miner").unwrap();
//! assert_eq!(block.tx_count(), 2);
//! assert!(chain.is_valid());
//! ```

pub mod config;
pub mod core;
pub mod crypto;
pub mod mining;

// Re-export commonly used types
pub use config::{ChainConfig, DEFAULT_DIFFICULTY, DEFAULT_MINER_REWARD};
pub use core::{Block, Chain, ChainError, FailureKind, Transaction, ValidationFailure};
pub use crypto::KeyPair;
pub use mining::{CancelToken, Mempool, Miner};

//! Mining module for block sealing and transaction pooling

pub mod mempool;
pub mod miner;

pub use mempool::{Mempool, MempoolError};
pub use miner::{CancelToken, Miner, MiningError, MiningStats, SEARCH_BATCH};

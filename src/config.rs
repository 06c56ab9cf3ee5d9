//! Chain configuration
//!
//! Difficulty and reward are fixed for the lifetime of a chain.

use crate::crypto::HEX_DIGEST_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default mining difficulty (number of leading zero hex digits)
pub const DEFAULT_DIFFICULTY: u32 = 5;

/// Reward credited to the miner of each packaged block
pub const DEFAULT_MINER_REWARD: u64 = 10;

/// Content of the genesis block
pub const GENESIS_NOTE: &str = "genesis block";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Difficulty {0} exceeds digest length {max}", max = HEX_DIGEST_LEN)]
    DifficultyTooHigh(u32),
    #[error("Mining needs at least one thread")]
    NoMiningThreads,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_miner_reward")]
    pub miner_reward: u64,
    #[serde(default = "default_genesis_note")]
    pub genesis_note: String,
    #[serde(default = "default_mining_threads")]
    pub mining_threads: usize,
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_miner_reward() -> u64 {
    DEFAULT_MINER_REWARD
}

fn default_genesis_note() -> String {
    GENESIS_NOTE.to_string()
}

fn default_mining_threads() -> usize {
    1
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            miner_reward: default_miner_reward(),
            genesis_note: default_genesis_note(),
            mining_threads: default_mining_threads(),
        }
    }
}

impl ChainConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty as usize > HEX_DIGEST_LEN {
            return Err(ConfigError::DifficultyTooHigh(self.difficulty));
        }
        if self.mining_threads == 0 {
            return Err(ConfigError::NoMiningThreads);
        }
        Ok(())
    }
}

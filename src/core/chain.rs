//! Chain implementation
//!
//! The chain owns its blocks and mempool. It creates the genesis block,
//! packages pending transactions into mined blocks with a miner reward, and
//! audits the whole sequence on demand.

use crate::config::{ChainConfig, ConfigError};
use crate::core::block::{Block, BlockError};
use crate::core::transaction::{Transaction, TransactionError};
use crate::mining::{CancelToken, Mempool, MempoolError, Miner, MiningError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chain-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    Mining(#[from] MiningError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Chain has no genesis block")]
    MissingGenesis,
}

/// Why an audit rejected a block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    #[error("transaction {position} does not verify: {reason}")]
    InvalidTransaction {
        position: usize,
        reason: TransactionError,
    },
    #[error("stored hash does not match block content")]
    HashMismatch,
    #[error("previous hash does not match predecessor")]
    BrokenLink,
    #[error("hash does not meet difficulty")]
    InsufficientWork,
}

/// First failure found by a chain audit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("block {index}: {kind}")]
pub struct ValidationFailure {
    pub index: usize,
    pub kind: FailureKind,
}

impl ValidationFailure {
    fn new(index: usize, kind: FailureKind) -> Self {
        Self { index, kind }
    }
}

/// The ledger: an append-only sequence of hash-linked blocks
#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "ChainSnapshot")]
pub struct Chain {
    /// The chain of blocks, genesis first
    blocks: Vec<Block>,
    /// Transactions waiting for the next block
    #[serde(skip)]
    mempool: Mempool,
    miner_reward: u64,
    difficulty: u32,
    mining_threads: usize,
}

/// Serialized form of a chain, checked before it becomes a `Chain`
#[derive(Deserialize)]
struct ChainSnapshot {
    blocks: Vec<Block>,
    miner_reward: u64,
    difficulty: u32,
    #[serde(default)]
    mining_threads: Option<usize>,
}

impl TryFrom<ChainSnapshot> for Chain {
    type Error = ChainError;

    fn try_from(snapshot: ChainSnapshot) -> Result<Self, Self::Error> {
        if snapshot.blocks.is_empty() {
            return Err(ChainError::MissingGenesis);
        }
        let mining_threads = snapshot.mining_threads.unwrap_or(1);
        let config = ChainConfig {
            difficulty: snapshot.difficulty,
            miner_reward: snapshot.miner_reward,
            mining_threads,
            ..ChainConfig::default()
        };
        config.validate()?;

        Ok(Self {
            blocks: snapshot.blocks,
            mempool: Mempool::new(),
            miner_reward: snapshot.miner_reward,
            difficulty: snapshot.difficulty,
            mining_threads,
        })
    }
}

impl Chain {
    /// Create a new chain with the default configuration
    pub fn new() -> Self {
        Self::from_valid_config(ChainConfig::default())
    }

    /// Create a chain with custom difficulty
    pub fn with_difficulty(difficulty: u32) -> Result<Self, ChainError> {
        Self::with_config(ChainConfig::with_difficulty(difficulty))
    }

    /// Create a chain from a configuration
    pub fn with_config(config: ChainConfig) -> Result<Self, ChainError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: ChainConfig) -> Self {
        Self {
            blocks: vec![Block::genesis(&config.genesis_note)],
            mempool: Mempool::new(),
            miner_reward: config.miner_reward,
            difficulty: config.difficulty,
            mining_threads: config.mining_threads,
        }
    }

    /// Get the latest block
    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds at least the genesis block")
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Get a block by index
    pub fn get_block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Get a block by hash
    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    /// Mutable access to a stored block
    ///
    /// Changes made here bypass admission and mining; `validate` reports them.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Chain height (genesis is height 0)
    pub fn height(&self) -> usize {
        self.blocks.len() - 1
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn miner_reward(&self) -> u64 {
        self.miner_reward
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    fn miner(&self) -> Miner {
        Miner::new(self.difficulty).with_threads(self.mining_threads)
    }

    /// Queue a transaction for the next block
    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), ChainError> {
        self.mempool.admit(tx)?;
        Ok(())
    }

    /// Pack all pending transactions plus a miner reward into a mined block
    pub fn package_mempool(&mut self, reward_address: &str) -> Result<&Block, ChainError> {
        self.package_mempool_with(reward_address, &CancelToken::new())
    }

    /// Like `package_mempool`, stopping early when `cancel` is set
    ///
    /// On failure the chain is unchanged and pending transactions that still
    /// verify go back to the mempool in their original order.
    pub fn package_mempool_with(
        &mut self,
        reward_address: &str,
        cancel: &CancelToken,
    ) -> Result<&Block, ChainError> {
        let mut transactions = self.mempool.drain();
        let pending = transactions.len();
        transactions.push(Transaction::reward(reward_address, self.miner_reward));

        let mut block = Block::new(transactions, &self.latest_block().hash);

        if let Err(e) = self.miner().mine(&mut block, cancel) {
            warn!("Packaging {} pending transaction(s) failed: {}", pending, e);
            let survivors = block
                .transactions()
                .iter()
                .take(pending)
                .filter(|tx| tx.is_valid())
                .cloned()
                .collect();
            self.mempool.requeue(survivors);
            return Err(e.into());
        }

        info!(
            "Packaged block {} with {} transaction(s), reward {} to {}",
            self.blocks.len(),
            block.tx_count(),
            self.miner_reward,
            reward_address
        );
        self.blocks.push(block);
        Ok(self.latest_block())
    }

    /// Append a block outside the mempool path
    ///
    /// The block is relinked to the current tip and mined before appending.
    pub fn append_block(&mut self, block: Block) -> Result<&Block, ChainError> {
        self.append_block_with(block, &CancelToken::new())
    }

    pub fn append_block_with(
        &mut self,
        mut block: Block,
        cancel: &CancelToken,
    ) -> Result<&Block, ChainError> {
        block.previous_hash = self.latest_block().hash.clone();
        self.miner().mine(&mut block, cancel)?;
        self.blocks.push(block);
        Ok(self.latest_block())
    }

    /// Audit the whole chain, reporting the first failing block
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        if let Some(genesis) = self.blocks.first() {
            if !genesis.verify_hash() {
                return Err(ValidationFailure::new(0, FailureKind::HashMismatch));
            }
        }

        for (index, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = index + 1;

            if let Err(BlockError::InvalidTransaction { position, source }) =
                current.validate_transactions()
            {
                return Err(ValidationFailure::new(
                    index,
                    FailureKind::InvalidTransaction {
                        position,
                        reason: source,
                    },
                ));
            }

            if !current.verify_hash() {
                return Err(ValidationFailure::new(index, FailureKind::HashMismatch));
            }

            if current.previous_hash != previous.hash {
                return Err(ValidationFailure::new(index, FailureKind::BrokenLink));
            }

            if !current.is_mined(self.difficulty) {
                return Err(ValidationFailure::new(index, FailureKind::InsufficientWork));
            }
        }

        Ok(())
    }

    /// Validate the entire chain
    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(failure) => {
                warn!("Chain validation failed at {}", failure);
                false
            }
        }
    }

    /// Get chain statistics
    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.height(),
            total_blocks: self.blocks.len(),
            total_transactions: self.blocks.iter().map(Block::tx_count).sum(),
            pending_transactions: self.mempool.len(),
            difficulty: self.difficulty,
            miner_reward: self.miner_reward,
            latest_hash: self.latest_block().hash.clone(),
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

/// Chain statistics
#[derive(Debug, Clone)]
pub struct ChainStats {
    pub height: usize,
    pub total_blocks: usize,
    pub total_transactions: usize,
    pub pending_transactions: usize,
    pub difficulty: u32,
    pub miner_reward: u64,
    pub latest_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DIFFICULTY, DEFAULT_MINER_REWARD};
    use crate::core::BlockData;
    use crate::crypto::KeyPair;

    fn test_chain() -> Chain {
        Chain::with_difficulty(2).unwrap()
    }

    fn signed(key_pair: &KeyPair, recipient: &str, amount: u64) -> Transaction {
        let mut tx = Transaction::new(&key_pair.public_key_hex(), recipient, amount);
        tx.sign(key_pair).unwrap();
        tx
    }

    #[test]
    fn test_new_chain() {
        let chain = Chain::new();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.difficulty(), DEFAULT_DIFFICULTY);
        assert_eq!(chain.miner_reward(), DEFAULT_MINER_REWARD);
        assert_eq!(chain.latest_block().previous_hash, "");
        assert!(chain.mempool().is_empty());
        assert!(chain.is_valid());
    }

    #[test]
    fn test_rejects_bad_config() {
        assert_eq!(
            Chain::with_difficulty(100).unwrap_err(),
            ChainError::Config(ConfigError::DifficultyTooHigh(100))
        );
    }

    #[test]
    fn test_package_mempool() {
        let mut chain = test_chain();
        let alice = KeyPair::generate();
        chain.submit_transaction(signed(&alice, "bob", 10)).unwrap();

        let genesis_hash = chain.latest_block().hash.clone();
        let block = chain.package_mempool("MinerAddr").unwrap();

        assert_eq!(block.tx_count(), 2);
        assert_eq!(block.previous_hash, genesis_hash);
        assert!(block.hash.starts_with("00"));
        let reward = &block.transactions()[1];
        assert_eq!(reward, &Transaction::reward("MinerAddr", DEFAULT_MINER_REWARD));

        assert!(chain.mempool().is_empty());
        assert_eq!(chain.len(), 2);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_package_empty_mempool_mints_reward() {
        let mut chain = test_chain();
        let block = chain.package_mempool("miner").unwrap();
        assert_eq!(block.tx_count(), 1);
        assert!(block.transactions()[0].is_reward());
    }

    #[test]
    fn test_submit_rejects_tampered() {
        let chain = test_chain();
        let alice = KeyPair::generate();
        let mut tx = signed(&alice, "bob", 10);
        if let Transaction::Transfer { amount, .. } = &mut tx {
            *amount = 100;
        }

        let err = chain.submit_transaction(tx).unwrap_err();
        assert_eq!(
            err,
            ChainError::Mempool(MempoolError::InvalidTransaction(
                TransactionError::InvalidSignature
            ))
        );
        assert!(chain.mempool().is_empty());
    }

    #[test]
    fn test_cancelled_packaging_leaves_chain_unchanged() {
        let mut chain = Chain::with_difficulty(64).unwrap();
        let alice = KeyPair::generate();
        chain.submit_transaction(signed(&alice, "bob", 1)).unwrap();
        chain.submit_transaction(signed(&alice, "carol", 2)).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = chain.package_mempool_with("miner", &cancel).unwrap_err();

        assert_eq!(err, ChainError::Mining(MiningError::Cancelled));
        assert_eq!(chain.len(), 1);
        let amounts: Vec<u64> = chain
            .mempool()
            .pending()
            .iter()
            .map(Transaction::amount)
            .collect();
        assert_eq!(amounts, vec![1, 2]);
    }

    #[test]
    fn test_append_note_block() {
        let mut chain = test_chain();
        let mut stale = Block::note("transfer 10", "stale");
        stale.previous_hash = "not-the-tip".to_string();

        let tip = chain.latest_block().hash.clone();
        let block = chain.append_block(stale).unwrap();

        assert_eq!(block.previous_hash, tip);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_tampered_amount_detected() {
        let mut chain = test_chain();
        let alice = KeyPair::generate();
        chain.submit_transaction(signed(&alice, "bob", 10)).unwrap();
        chain.package_mempool("miner").unwrap();

        if let Some(txs) = chain.block_mut(1).and_then(Block::transactions_mut) {
            if let Transaction::Transfer { amount, .. } = &mut txs[0] {
                *amount = 100;
            }
        }

        let failure = chain.validate().unwrap_err();
        assert_eq!(failure.index, 1);
        assert_eq!(
            failure.kind,
            FailureKind::InvalidTransaction {
                position: 0,
                reason: TransactionError::InvalidSignature,
            }
        );
        assert!(!chain.is_valid());
    }

    #[test]
    fn test_tampered_reward_detected_by_hash() {
        let mut chain = test_chain();
        chain.package_mempool("miner").unwrap();

        if let Some(txs) = chain.block_mut(1).and_then(Block::transactions_mut) {
            if let Transaction::Reward { amount, .. } = &mut txs[0] {
                *amount = 1_000;
            }
        }

        assert_eq!(
            chain.validate(),
            Err(ValidationFailure::new(1, FailureKind::HashMismatch))
        );
    }

    #[test]
    fn test_remined_tamper_breaks_link() {
        let mut chain = test_chain();
        chain.append_block(Block::note("transfer 10", "")).unwrap();
        chain.append_block(Block::note("transfer 20", "")).unwrap();

        let block = chain.block_mut(1).unwrap();
        block.data = BlockData::Note("transfer 100".to_string());
        block.mine(2).unwrap();

        assert_eq!(
            chain.validate(),
            Err(ValidationFailure::new(2, FailureKind::BrokenLink))
        );
    }

    #[test]
    fn test_previous_hash_tamper_detected() {
        let mut chain = test_chain();
        chain.package_mempool("miner").unwrap();
        chain.package_mempool("miner").unwrap();

        chain.block_mut(2).unwrap().previous_hash = "ff".repeat(32);

        let failure = chain.validate().unwrap_err();
        assert_eq!(failure.index, 2);
        assert!(!chain.is_valid());
    }

    #[test]
    fn test_genesis_tamper_detected() {
        let mut chain = test_chain();
        assert!(chain.is_valid());
        chain.package_mempool("miner").unwrap();

        chain.block_mut(0).unwrap().data = BlockData::Note("forged".to_string());

        assert_eq!(
            chain.validate(),
            Err(ValidationFailure::new(0, FailureKind::HashMismatch))
        );
    }

    #[test]
    fn test_unmined_block_detected() {
        let mut chain = test_chain();
        chain.package_mempool("miner").unwrap();

        let block = chain.block_mut(1).unwrap();
        while block.is_mined(2) {
            block.nonce += 1;
            block.hash = block.calculate_hash();
        }

        assert_eq!(
            chain.validate(),
            Err(ValidationFailure::new(1, FailureKind::InsufficientWork))
        );
    }

    #[test]
    fn test_serialization_roundtrip_stays_valid() {
        let mut chain = test_chain();
        let alice = KeyPair::generate();
        chain.submit_transaction(signed(&alice, "bob", 10)).unwrap();
        chain.package_mempool("miner").unwrap();

        let json = serde_json::to_string(&chain).unwrap();
        let restored: Chain = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.blocks(), chain.blocks());
        assert_eq!(restored.difficulty(), 2);
        assert!(restored.is_valid());
    }

    #[test]
    fn test_deserialize_rejects_empty_chain() {
        let json = r#"{"blocks": [], "miner_reward": 10, "difficulty": 2}"#;
        assert!(serde_json::from_str::<Chain>(json).is_err());
    }

    #[test]
    fn test_stats() {
        let mut chain = test_chain();
        chain.package_mempool("miner").unwrap();

        let stats = chain.stats();
        assert_eq!(stats.height, 1);
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.total_transactions, 1);
        assert_eq!(stats.latest_hash, chain.latest_block().hash);
        assert!(chain.get_block_by_hash(&stats.latest_hash).is_some());
    }

    #[test]
    fn test_get_block_by_index() {
        let mut chain = test_chain();
        chain.package_mempool("miner").unwrap();

        assert_eq!(chain.get_block(0).unwrap().previous_hash, "");
        assert_eq!(chain.get_block(1), Some(chain.latest_block()));
        assert!(chain.get_block(2).is_none());
    }
}

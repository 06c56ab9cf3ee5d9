//! Powledger CLI Application
//!
//! Demonstrates the ledger end to end: key generation, signed transfers,
//! packaging, auditing and tamper detection.

use clap::{Parser, Subcommand};
use powledger::config::ChainConfig;
use powledger::core::{Block, Chain, Transaction};
use powledger::crypto::KeyPair;
use std::fs;
use std::path::PathBuf;

/// Result type for CLI operations
type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "powledger")]
#[command(version)]
#[command(about = "A minimal proof-of-work ledger in Rust", long_about = None)]
struct Cli {
    /// Chain configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mining difficulty (number of leading zero hex digits)
    #[arg(short, long)]
    difficulty: Option<u32>,

    /// Reward credited to the miner of each block
    #[arg(short, long)]
    reward: Option<u64>,

    /// Worker threads for the nonce search
    #[arg(short, long)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair
    Keygen,

    /// Build a chain from signed transfers and audit it
    Demo {
        /// Address credited with mining rewards
        #[arg(short, long, default_value = "MinerAddr")]
        miner: String,

        /// Amount for each demo transfer
        #[arg(short, long, default_value = "10")]
        amount: u64,

        /// Number of blocks to package
        #[arg(short, long, default_value = "1")]
        blocks: u32,

        /// Print the resulting chain as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a chain, tamper with block 1 and show the audit result
    Tamper {
        /// Amount written over the first transfer in block 1
        #[arg(short, long, default_value = "100")]
        amount: u64,
    },
}

fn main() -> CliResult<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Keygen => cmd_keygen(),
        Commands::Demo {
            miner,
            amount,
            blocks,
            json,
        } => cmd_demo(&load_config(&cli)?, miner, *amount, *blocks, *json),
        Commands::Tamper { amount } => cmd_tamper(&load_config(&cli)?, *amount),
    }
}

/// Merge the config file (if any) with command-line overrides
fn load_config(cli: &Cli) -> CliResult<ChainConfig> {
    let mut config = match &cli.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => ChainConfig::default(),
    };

    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(reward) = cli.reward {
        config.miner_reward = reward;
    }
    if let Some(threads) = cli.threads {
        config.mining_threads = threads;
    }

    config.validate()?;
    Ok(config)
}

fn cmd_keygen() -> CliResult<()> {
    let key_pair = KeyPair::generate();
    println!("🔑 New key pair");
    println!("   ├─ Private key: {}", key_pair.private_key_hex());
    println!("   └─ Public key:  {}", key_pair.public_key_hex());
    Ok(())
}

/// Sign a transfer from `from` to `to`
fn signed_transfer(from: &KeyPair, to: &KeyPair, amount: u64) -> CliResult<Transaction> {
    let mut tx = Transaction::new(&from.public_key_hex(), &to.public_key_hex(), amount);
    tx.sign(from)?;
    Ok(tx)
}

fn build_chain(config: &ChainConfig, miner: &str, amount: u64, blocks: u32) -> CliResult<Chain> {
    let mut chain = Chain::with_config(config.clone())?;
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    println!(
        "⛏️  Packaging {} block(s) at difficulty {}",
        blocks, config.difficulty
    );

    for _ in 0..blocks {
        chain.submit_transaction(signed_transfer(&alice, &bob, amount)?)?;
        chain.submit_transaction(signed_transfer(&bob, &alice, amount / 2)?)?;

        chain.package_mempool(miner)?;
        print_block(chain.height(), chain.latest_block());
    }

    Ok(chain)
}

fn print_block(index: usize, block: &Block) {
    println!("\n   Block {} mined!", index);
    println!("   ├─ Hash: {}", block.hash);
    println!("   ├─ Previous: {}", block.previous_hash);
    println!("   ├─ Nonce: {}", block.nonce);
    println!("   └─ Transactions: {}", block.tx_count());
}

fn cmd_demo(
    config: &ChainConfig,
    miner: &str,
    amount: u64,
    blocks: u32,
    json: bool,
) -> CliResult<()> {
    let chain = build_chain(config, miner, amount, blocks)?;

    let stats = chain.stats();
    println!("\n📊 Chain");
    println!("   ├─ Blocks: {}", stats.total_blocks);
    println!("   ├─ Transactions: {}", stats.total_transactions);
    println!("   └─ Tip: {}", stats.latest_hash);

    cmd_validate(&chain);

    if json {
        println!("{}", serde_json::to_string_pretty(&chain)?);
    }

    Ok(())
}

fn cmd_tamper(config: &ChainConfig, amount: u64) -> CliResult<()> {
    let mut chain = build_chain(config, "MinerAddr", 10, 1)?;
    cmd_validate(&chain);

    let hash_before = chain.get_block(1).map(|block| block.hash.clone());

    let tampered = chain
        .block_mut(1)
        .and_then(Block::transactions_mut)
        .and_then(|txs| txs.iter_mut().find(|tx| !tx.is_reward()));
    if let Some(Transaction::Transfer { amount: stored, .. }) = tampered {
        println!("\n✏️  Overwriting block 1 transfer amount {} -> {}", stored, amount);
        *stored = amount;
    }

    if let (Some(before), Some(block)) = (hash_before, chain.get_block(1)) {
        println!("   Stored hash unchanged: {}", before == block.hash);
    }

    cmd_validate(&chain);
    Ok(())
}

fn cmd_validate(chain: &Chain) {
    println!("\n🔍 Validating chain...");

    match chain.validate() {
        Ok(()) => {
            println!("✅ Chain is valid!");
            println!("   {} blocks verified", chain.len());
        }
        Err(failure) => {
            println!("❌ Chain validation FAILED!");
            println!("   {}", failure);
        }
    }
}

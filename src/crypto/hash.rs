//! Cryptographic hashing utilities for the ledger
//!
//! Provides the SHA-256 digest used for transaction content digests,
//! block hashes and the proof-of-work prefix check.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const HEX_DIGEST_LEN: usize = 64;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Checks if a hex digest meets the difficulty target
/// The digest must start with `difficulty` `'0'` characters
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    hash.len() >= required && hash.bytes().take(required).all(|c| c == b'0')
}

/// Number of leading `'0'` characters in a hex digest
pub fn leading_zeros(hash: &str) -> usize {
    hash.bytes().take_while(|c| *c == b'0').count()
}

//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and the hex-prefix difficulty check
//! - ECDSA signing and verification (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{leading_zeros, meets_difficulty, sha256, sha256_hex, HEX_DIGEST_LEN};
pub use keys::{
    public_key_from_hex, secret_key_from_hex, sign_digest, verify_digest, KeyError, KeyPair,
};

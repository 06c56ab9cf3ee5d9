//! ECDSA signature engine for the ledger
//!
//! Signs and verifies 32-byte message digests with the secp256k1 curve.
//! Signatures are DER encoded, public keys travel as compressed SEC1 hex.
//! Signing is deterministic (RFC 6979), so the same key and digest always
//! yield the same signature.

use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Errors that can occur during key operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid digest length: {0} bytes (expected 32)")]
    InvalidDigest(usize),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        Ok(Self::from_secret_key(secret_key_from_hex(hex_key)?))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    ///
    /// This is the identifier used as a transaction sender.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Sign a 32-byte digest with the private key
    pub fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
        sign_with_secret(&self.secret_key, digest)
    }

    /// Verify a signature against this key pair's public key
    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        verify_with_public(&self.public_key, digest, signature)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Parse a secret key from hex string
pub fn secret_key_from_hex(hex_key: &str) -> Result<SecretKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
    SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a digest with a hex-encoded private key, returning a DER signature
pub fn sign_digest(private_key_hex: &str, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secret_key = secret_key_from_hex(private_key_hex)?;
    sign_with_secret(&secret_key, digest)
}

/// Verify a DER signature over a digest against a hex-encoded public key
///
/// A signature that cannot be parsed is reported as `Ok(false)`. Only a
/// structurally invalid public key or digest is an error.
pub fn verify_digest(
    public_key_hex: &str,
    digest: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let public_key = public_key_from_hex(public_key_hex)?;
    verify_with_public(&public_key, digest, signature)
}

fn digest_message(digest: &[u8]) -> Result<Message, KeyError> {
    Message::from_digest_slice(digest).map_err(|_| KeyError::InvalidDigest(digest.len()))
}

fn sign_with_secret(secret_key: &SecretKey, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::signing_only();
    let message = digest_message(digest)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(signature.serialize_der().to_vec())
}

fn verify_with_public(
    public_key: &PublicKey,
    digest: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::verification_only();
    let message = digest_message(digest)?;

    let sig = match Signature::from_der(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };

    Ok(secp.verify_ecdsa(&message, &sig, public_key).is_ok())
}

//! Transaction handling for the ledger
//!
//! A transaction is either a signed transfer between two public-key
//! identifiers or a system-issued reward crediting a miner. Transfers are
//! authenticated by an ECDSA signature over the content digest; rewards
//! carry no signature.

use crate::crypto::{sha256, verify_digest, KeyError, KeyPair};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sender identifier used for reward transactions in the content digest
pub const REWARD_SENDER: &str = "";

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction is not signed")]
    MissingSignature,
    #[error("Signature does not verify against sender")]
    InvalidSignature,
    #[error("Reward transactions are not signed")]
    RewardNotSignable,
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Transaction
// =============================================================================

/// An authenticated transfer record or a miner reward
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    /// System-issued reward; has no sender and needs no signature
    Reward { recipient: String, amount: u64 },
    /// Transfer from `sender` (compressed public key hex) to `recipient`
    Transfer {
        sender: String,
        recipient: String,
        amount: u64,
        /// Hex-encoded DER signature over the content digest
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
}

impl Transaction {
    /// Create a new unsigned transfer
    ///
    /// No validation happens here; an unsigned transfer never verifies.
    pub fn new(sender: &str, recipient: &str, amount: u64) -> Self {
        Transaction::Transfer {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            signature: None,
        }
    }

    /// Create a reward transaction
    pub fn reward(recipient: &str, amount: u64) -> Self {
        Transaction::Reward {
            recipient: recipient.to_string(),
            amount,
        }
    }

    pub fn is_reward(&self) -> bool {
        matches!(self, Transaction::Reward { .. })
    }

    /// Sender identifier, `None` for rewards
    pub fn sender(&self) -> Option<&str> {
        match self {
            Transaction::Reward { .. } => None,
            Transaction::Transfer { sender, .. } => Some(sender.as_str()),
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Transaction::Reward { recipient, .. } | Transaction::Transfer { recipient, .. } => {
                recipient.as_str()
            }
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            Transaction::Reward { amount, .. } | Transaction::Transfer { amount, .. } => *amount,
        }
    }

    /// Raw signature bytes, if present and hex-decodable
    pub fn signature(&self) -> Option<Vec<u8>> {
        match self {
            Transaction::Transfer {
                signature: Some(sig),
                ..
            } => hex::decode(sig).ok(),
            _ => None,
        }
    }

    /// Digest bytes of `(sender, recipient, amount)`
    pub fn digest_bytes(&self) -> Vec<u8> {
        let sender = self.sender().unwrap_or(REWARD_SENDER);
        let payload = serde_json::json!([sender, self.recipient(), self.amount()]);
        sha256(payload.to_string().as_bytes())
    }

    /// Hex content digest of `(sender, recipient, amount)`
    pub fn content_digest(&self) -> String {
        hex::encode(self.digest_bytes())
    }

    /// Sign the current content with the provided key pair
    ///
    /// Re-signing after a field change yields a signature valid for the new
    /// content, so verification always re-derives the digest.
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        let digest = self.digest_bytes();
        match self {
            Transaction::Reward { .. } => Err(TransactionError::RewardNotSignable),
            Transaction::Transfer { signature, .. } => {
                let sig = key_pair.sign(&digest)?;
                *signature = Some(hex::encode(sig));
                Ok(())
            }
        }
    }

    /// Verify authenticity against the current field values
    pub fn validate(&self) -> Result<(), TransactionError> {
        let Transaction::Transfer {
            sender, signature, ..
        } = self
        else {
            return Ok(());
        };

        let signature = signature
            .as_deref()
            .ok_or(TransactionError::MissingSignature)?;
        let signature = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return Err(TransactionError::InvalidSignature),
        };

        if verify_digest(sender, &self.digest_bytes(), &signature)? {
            Ok(())
        } else {
            Err(TransactionError::InvalidSignature)
        }
    }

    /// Check if this transaction is authentic
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_transfer(key_pair: &KeyPair, amount: u64) -> Transaction {
        let mut tx = Transaction::new(&key_pair.public_key_hex(), "recipient", amount);
        tx.sign(key_pair).unwrap();
        tx
    }

    #[test]
    fn test_reward_always_valid() {
        let tx = Transaction::reward("miner", 10);
        assert!(tx.is_reward());
        assert_eq!(tx.sender(), None);
        assert!(tx.is_valid());
    }

    #[test]
    fn test_reward_cannot_be_signed() {
        let mut tx = Transaction::reward("miner", 10);
        assert_eq!(
            tx.sign(&KeyPair::generate()),
            Err(TransactionError::RewardNotSignable)
        );
    }

    #[test]
    fn test_transaction_signing() {
        let key_pair = KeyPair::generate();
        let tx = signed_transfer(&key_pair, 10);

        assert!(tx.signature().is_some());
        assert!(tx.is_valid());
    }

    #[test]
    fn test_unsigned_transfer_fails_closed() {
        let key_pair = KeyPair::generate();
        let tx = Transaction::new(&key_pair.public_key_hex(), "recipient", 10);

        assert_eq!(tx.validate(), Err(TransactionError::MissingSignature));
        assert!(!tx.is_valid());
    }

    #[test]
    fn test_digest_is_stable() {
        let tx = Transaction::new("alice", "bob", 10);
        assert_eq!(tx.content_digest(), tx.content_digest());
        assert_ne!(
            tx.content_digest(),
            Transaction::new("alice", "bob", 11).content_digest()
        );
        // Field boundaries are part of the digest
        assert_ne!(
            Transaction::new("ab", "c", 1).content_digest(),
            Transaction::new("a", "bc", 1).content_digest()
        );
    }

    #[test]
    fn test_signature_excluded_from_digest() {
        let key_pair = KeyPair::generate();
        let unsigned = Transaction::new(&key_pair.public_key_hex(), "recipient", 10);
        let signed = signed_transfer(&key_pair, 10);
        assert_eq!(unsigned.content_digest(), signed.content_digest());
    }

    #[test]
    fn test_amount_tamper_detected() {
        let key_pair = KeyPair::generate();
        let mut tx = signed_transfer(&key_pair, 10);

        if let Transaction::Transfer { amount, .. } = &mut tx {
            *amount = 100;
        }

        assert_eq!(tx.validate(), Err(TransactionError::InvalidSignature));
    }

    #[test]
    fn test_resigning_masks_tamper() {
        let key_pair = KeyPair::generate();
        let mut tx = signed_transfer(&key_pair, 10);

        if let Transaction::Transfer { amount, .. } = &mut tx {
            *amount = 100;
        }
        tx.sign(&key_pair).unwrap();

        assert!(tx.is_valid());
        assert_eq!(tx.amount(), 100);
    }

    #[test]
    fn test_foreign_key_signature_rejected() {
        let owner = KeyPair::generate();
        let thief = KeyPair::generate();
        let mut tx = Transaction::new(&owner.public_key_hex(), "thief", 50);
        tx.sign(&thief).unwrap();

        assert_eq!(tx.validate(), Err(TransactionError::InvalidSignature));
    }

    #[test]
    fn test_malformed_sender_key() {
        let key_pair = KeyPair::generate();
        let mut tx = Transaction::new("Alice", "Bob", 10);
        tx.sign(&key_pair).unwrap();

        assert_eq!(
            tx.validate(),
            Err(TransactionError::CryptoError(KeyError::InvalidPublicKey))
        );
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let key_pair = KeyPair::generate();
        let tx = Transaction::Transfer {
            sender: key_pair.public_key_hex(),
            recipient: "bob".to_string(),
            amount: 1,
            signature: Some("zz-not-hex".to_string()),
        };
        assert_eq!(tx.validate(), Err(TransactionError::InvalidSignature));
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_value(Transaction::reward("miner", 10)).unwrap();
        assert_eq!(json["kind"], "reward");
        assert_eq!(json["amount"], 10);
    }
}

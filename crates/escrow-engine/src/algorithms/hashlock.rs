//! # Hashlock Manager
//!
//! Secret generation and SHA-256 hashlock verification.

use crate::domain::{Hash, SecureSecret};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Stateless hashlock operations.
pub struct HashlockManager;

impl HashlockManager {
    /// Generate a random 32-byte secret and its hashlock.
    pub fn generate_secret() -> (SecureSecret, Hash) {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let secret = SecureSecret::new(bytes);
        let hashlock = Self::hash_secret(secret.as_bytes());
        (secret, hashlock)
    }

    /// SHA-256 of the secret bytes.
    pub fn hash_secret(secret: &[u8]) -> Hash {
        Sha256::digest(secret).into()
    }

    /// Constant-time check that `secret` hashes to `hashlock`.
    pub fn verify(secret: &SecureSecret, hashlock: &Hash) -> bool {
        let computed = Self::hash_secret(secret.as_bytes());
        computed.ct_eq(hashlock).into()
    }
}

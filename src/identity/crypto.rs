//! Cryptographic utilities for Agent Mesh.
//!
//! Provides Ed25519 wallet keys, curve checks and SHA3-256 hashing.

use crate::core::{Hash256, Identity};
use ed25519_dalek::{SigningKey, VerifyingKey};
use sha3::{Digest, Sha3_256};

/// An Ed25519 wallet key pair.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Create a new key pair from OS randomness.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut csprng = rand::rngs::OsRng;
        let mut secret_key_bytes = [0u8; 32];
        csprng.fill_bytes(&mut secret_key_bytes);
        let signing_key = SigningKey::from_bytes(&secret_key_bytes);
        Self { signing_key }
    }

    /// Create from existing secret key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// The public identity of this key pair.
    pub fn identity(&self) -> Identity {
        Identity::new(self.signing_key.verifying_key().to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

/// Whether `bytes` decode to a point on the Ed25519 curve.
///
/// Derived addresses must not be on the curve so that no private key
/// exists for them.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    VerifyingKey::from_bytes(bytes).is_ok()
}

/// Compute SHA3-256 hash of data.
pub fn sha3_256(data: &[u8]) -> Hash256 {
    sha3_256_multi(&[data])
}

/// Compute SHA3-256 hash of multiple data chunks.
pub fn sha3_256_multi(chunks: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha3_256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash256::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_identity_is_on_curve() {
        let keypair = Keypair::generate();
        assert!(is_on_curve(keypair.identity().as_bytes()));
    }

    #[test]
    fn test_keypair_from_bytes() {
        let keypair = Keypair::from_bytes(&[9u8; 32]);
        let again = Keypair::from_bytes(&[9u8; 32]);
        assert_eq!(keypair.identity(), again.identity());
    }

    #[test]
    fn test_sha3_256() {
        assert_eq!(sha3_256(b"test data"), sha3_256(b"test data"));
        assert_ne!(sha3_256(b"data1"), sha3_256(b"data2"));
    }

    #[test]
    fn test_sha3_256_multi_matches_concatenation() {
        let chunks: &[&[u8]] = &[b"chunk1", b"chunk2"];
        assert_eq!(sha3_256_multi(chunks), sha3_256(b"chunk1chunk2"));
    }
}

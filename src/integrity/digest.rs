//! Payload and result digests (SHA-256 over canonical JSON).

use crate::core::Hash256;
use crate::integrity::canonical::to_canonical_bytes;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 of raw bytes.
pub fn digest_bytes(bytes: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Hash256::new(out)
}

/// Digest of a structured body.
pub fn digest(body: &Value) -> Hash256 {
    digest_bytes(&to_canonical_bytes(body))
}

/// Recompute and compare.
pub fn verify(body: &Value, expected: &Hash256) -> bool {
    digest(body) == *expected
}

/// Recompute over raw bytes and compare.
pub fn verify_bytes(bytes: &[u8], expected: &Hash256) -> bool {
    digest_bytes(bytes) == *expected
}

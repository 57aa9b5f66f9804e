//! Payload Integrity
//!
//! Content digests over request payloads and results:
//! - Canonical JSON encoding
//! - SHA-256 digest and verification

pub mod canonical;
pub mod digest;

pub use canonical::{canonicalize, recanonicalize, to_canonical_bytes};
pub use digest::{digest, digest_bytes, verify, verify_bytes};

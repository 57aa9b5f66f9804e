//! Storage Module
//!
//! Boundaries to external storage, with in-memory implementations:
//! - Record store (agents, profiles, intents) with compare-and-set
//! - Blob store for payload and result bodies

pub mod blob;
pub mod records;

pub use blob::{BlobStore, MemoryBlobStore};
pub use records::{MemoryStore, Predicate, RecordStore};

//! Payload and result blob storage.
//!
//! Locators are opaque URIs. The in-memory store keeps LZ4-compressed bodies
//! under `mem://<uuid>` and inlines small bodies as base64 `data:` URIs.

use crate::core::{BlobConfig, Error, Result};
use async_trait::async_trait;
use base64::Engine;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

const MEM_SCHEME: &str = "mem://";
const DATA_PREFIX: &str = "data:application/octet-stream;base64,";

/// Blob store boundary.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the bytes behind `locator`.
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>>;

    /// Store `bytes`, returning their locator.
    async fn store(&self, bytes: &[u8]) -> Result<String>;

    /// Drop the bytes behind `locator`. Removing a missing blob is a no-op.
    async fn remove(&self, locator: &str) -> Result<()>;
}

/// In-memory [`BlobStore`].
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    inline_threshold: usize,
}

impl MemoryBlobStore {
    pub fn new(config: &BlobConfig) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            inline_threshold: config.inline_threshold,
        }
    }

    /// Overwrite the bytes behind an existing `mem://` locator.
    ///
    /// Meant for tests that tamper with a stored body; the coordinator never
    /// rewrites a blob once its digest is recorded.
    pub async fn replace(&self, locator: &str, bytes: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write().await;
        match blobs.get_mut(locator) {
            Some(slot) => {
                *slot = compress_prepend_size(bytes);
                Ok(())
            }
            None => Err(Error::Storage(format!("blob not found: {locator}"))),
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(&BlobConfig::default())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        if let Some(encoded) = locator.strip_prefix(DATA_PREFIX) {
            return base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| Error::Storage(format!("malformed data locator: {e}")));
        }
        if !locator.starts_with(MEM_SCHEME) {
            return Err(Error::Storage(format!("unsupported locator: {locator}")));
        }
        let blobs = self.blobs.read().await;
        let compressed = blobs
            .get(locator)
            .ok_or_else(|| Error::Storage(format!("blob not found: {locator}")))?;
        decompress_size_prepended(compressed)
            .map_err(|e| Error::Storage(format!("corrupt blob {locator}: {e}")))
    }

    async fn store(&self, bytes: &[u8]) -> Result<String> {
        if bytes.len() <= self.inline_threshold {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            return Ok(format!("{DATA_PREFIX}{encoded}"));
        }
        let locator = format!("{MEM_SCHEME}{}", Uuid::new_v4());
        self.blobs
            .write()
            .await
            .insert(locator.clone(), compress_prepend_size(bytes));
        Ok(locator)
    }

    async fn remove(&self, locator: &str) -> Result<()> {
        if locator.starts_with(DATA_PREFIX) {
            // Inline bodies live in the locator itself.
            return Ok(());
        }
        if !locator.starts_with(MEM_SCHEME) {
            return Err(Error::Storage(format!("unsupported locator: {locator}")));
        }
        self.blobs.write().await.remove(locator);
        Ok(())
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{join_url, key_from_url, validate_key, BlobStore};
use crate::error::BlobError;

/// Base URL of blobs held in memory. Not resolvable outside the process.
pub const MEMORY_BASE_URL: &str = "memory://blobs";

/// In-process blob store for tests and database-less development.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Content type recorded for `key`.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.blobs.read().await.get(key).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        validate_key(key)?;
        self.blobs
            .write()
            .await
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(join_url(MEMORY_BASE_URL, key))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, BlobError> {
        let key = key_from_url(MEMORY_BASE_URL, url)
            .ok_or_else(|| BlobError::ForeignUrl(url.to_string()))?;
        self.blobs
            .read()
            .await
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn url_for(&self, key: &str) -> Result<Option<String>, BlobError> {
        validate_key(key)?;
        Ok(self
            .blobs
            .read()
            .await
            .contains_key(key)
            .then(|| join_url(MEMORY_BASE_URL, key)))
    }

    fn owns(&self, url: &str) -> bool {
        key_from_url(MEMORY_BASE_URL, url).is_some()
    }
}

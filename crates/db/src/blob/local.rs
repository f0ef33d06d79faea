//! Filesystem blob store. The API serves `root` under the public base URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{join_url, key_from_url, validate_key, BlobStore};
use crate::error::BlobError;

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write to a sibling temp file and rename so readers never see a
        // partial image.
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(key, size = bytes.len(), "Stored blob on disk");
        Ok(join_url(&self.public_base_url, key))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, BlobError> {
        let key = key_from_url(&self.public_base_url, url)
            .ok_or_else(|| BlobError::ForeignUrl(url.to_string()))?;
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn url_for(&self, key: &str) -> Result<Option<String>, BlobError> {
        let path = self.path_for(key)?;
        if tokio::fs::try_exists(&path).await? {
            Ok(Some(join_url(&self.public_base_url, key)))
        } else {
            Ok(None)
        }
    }

    fn owns(&self, url: &str) -> bool {
        key_from_url(&self.public_base_url, url).is_some()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const BASE: &str = "http://localhost:3000/blobs";

    #[tokio::test]
    async fn put_get_and_dedupe_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), BASE);

        assert_eq!(store.url_for("products/a.png").await.unwrap(), None);

        let url = store
            .put("products/a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(url, format!("{BASE}/products/a.png"));
        assert!(dir.path().join("products/a.png").exists());
        assert!(store.owns(&url));

        assert_eq!(store.get(&url).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(store.url_for("products/a.png").await.unwrap(), Some(url));
    }

    #[tokio::test]
    async fn foreign_and_missing_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), BASE);

        assert_matches!(
            store.get("https://cdn.example/a.png").await,
            Err(BlobError::ForeignUrl(_))
        );
        assert_matches!(
            store.get(&format!("{BASE}/products/missing.png")).await,
            Err(BlobError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), BASE);
        assert_matches!(
            store.put("../escape.png", vec![0], "image/png").await,
            Err(BlobError::InvalidKey(_))
        );
    }
}

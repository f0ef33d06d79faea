//! Re-hosting of remote images in the blob store.
//!
//! Product images are keyed by the SHA-256 of their source URL, so sourcing
//! the same image twice is a lookup rather than a second download.
//! Rendered images are keyed by project and generation id.

use std::sync::Arc;
use std::time::Duration;

use roomcraft_core::hashing::sha256_hex;
use roomcraft_core::types::ProjectId;
use roomcraft_db::blob::extension_for;
use roomcraft_db::BlobStore;

use crate::error::PipelineError;
use crate::fetch::ImageFetcher;

/// Blob key for a product image sourced from `source_url`, without the
/// extension.
pub fn product_key_stem(source_url: &str) -> String {
    format!("products/{}", sha256_hex(source_url.as_bytes()))
}

/// Blob key for a rendered image.
pub fn generation_key(project_id: ProjectId, generation_id: &str, content_type: &str) -> String {
    format!(
        "generations/{project_id}/{generation_id}.{}",
        extension_for(content_type)
    )
}

/// Extensions probed when looking for an already persisted product image.
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "png", "webp", "gif"];

pub struct AssetPersister {
    blobs: Arc<dyn BlobStore>,
    fetcher: Arc<dyn ImageFetcher>,
    fetch_timeout: Duration,
}

impl AssetPersister {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        fetcher: Arc<dyn ImageFetcher>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            blobs,
            fetcher,
            fetch_timeout,
        }
    }

    /// Fetch `source_url` and store it, returning the canonical URL. A
    /// previously stored copy is returned without refetching.
    pub async fn persist_remote(&self, source_url: &str) -> Result<String, PipelineError> {
        if self.blobs.owns(source_url) {
            return Ok(source_url.to_string());
        }

        let stem = product_key_stem(source_url);
        for ext in KNOWN_EXTENSIONS {
            if let Some(url) = self.blobs.url_for(&format!("{stem}.{ext}")).await? {
                tracing::debug!(source_url, url = %url, "Product image already persisted");
                return Ok(url);
            }
        }

        let image = self
            .fetcher
            .fetch(source_url, self.fetch_timeout)
            .await
            .map_err(|e| PipelineError::AssetPersistFailure(format!("{source_url}: {e}")))?;
        let key = format!("{stem}.{}", extension_for(&image.content_type));
        let url = self
            .blobs
            .put(&key, image.bytes, &image.content_type)
            .await?;
        tracing::debug!(source_url, key = %key, "Persisted product image");
        Ok(url)
    }

    /// Store a rendered image for `project_id`.
    pub async fn persist_generation(
        &self,
        project_id: ProjectId,
        generation_id: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, PipelineError> {
        let key = generation_key(project_id, generation_id, content_type);
        let url = self.blobs.put(&key, bytes, content_type).await?;
        tracing::info!(project_id = %project_id, key = %key, "Persisted generated image");
        Ok(url)
    }
}

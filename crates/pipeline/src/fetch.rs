//! Fetching images and checking product links.
//!
//! URLs issued by the configured blob store are read straight from it;
//! anything else goes over HTTP. Fetched bytes must sniff as a raster
//! image format, so an HTML error page served with `200 OK` is rejected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::ImageFormat;
use roomcraft_db::BlobStore;

use crate::error::PipelineError;

/// Identifies the fetcher to retailer sites.
const USER_AGENT: &str = "Mozilla/5.0 (compatible; roomcraft/0.1; +https://roomcraft.app)";

/// Largest image body accepted over HTTP.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Bytes of a fetched image plus its sniffed content type.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl std::fmt::Debug for FetchedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedImage")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FetchedImage {
    /// Sniff `bytes` and wrap them, rejecting anything that is not a
    /// PNG, JPEG, WebP or GIF image.
    pub fn sniff(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        let content_type = sniff_content_type(&bytes).ok_or_else(|| {
            PipelineError::AssetPersistFailure("payload is not a supported image".into())
        })?;
        Ok(Self {
            bytes,
            content_type: content_type.to_string(),
        })
    }
}

/// Content type of a supported raster image, from its magic bytes.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download the image at `url` within `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedImage, PipelineError>;

    /// Lightweight existence check for a product page.
    async fn is_reachable(&self, url: &str, timeout: Duration) -> bool;
}

/// [`ImageFetcher`] over `reqwest`, with an optional blob store shortcut.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    blobs: Option<Arc<dyn BlobStore>>,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| PipelineError::UpstreamUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            blobs: None,
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Reject bodies larger than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Read URLs owned by `blobs` from the store instead of over HTTP.
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    async fn fetch_http(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, PipelineError> {
        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::UpstreamUnavailable(format!(
                "GET {url} returned {status}"
            )));
        }
        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                return Err(too_large(url, self.max_bytes));
            }
        }

        // The declared length may be absent or wrong; cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| map_reqwest(url, e))? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large(url, self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn too_large(url: &str, max_bytes: usize) -> PipelineError {
    PipelineError::AssetPersistFailure(format!("GET {url}: image larger than {max_bytes} bytes"))
}

fn map_reqwest(url: &str, err: reqwest::Error) -> PipelineError {
    if err.is_timeout() {
        PipelineError::UpstreamTimeout(format!("GET {url}"))
    } else {
        PipelineError::UpstreamUnavailable(format!("GET {url}: {err}"))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedImage, PipelineError> {
        let bytes = match &self.blobs {
            Some(blobs) if blobs.owns(url) => blobs.get(url).await?,
            _ => self.fetch_http(url, timeout).await?,
        };
        FetchedImage::sniff(bytes)
    }

    async fn is_reachable(&self, url: &str, timeout: Duration) -> bool {
        let head = self.client.head(url).timeout(timeout).send().await;
        match head {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => true,
            // Some retailers reject HEAD outright; retry as GET before
            // deciding the page is gone.
            Ok(resp) if resp.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED
                || resp.status() == reqwest::StatusCode::FORBIDDEN =>
            {
                self.client
                    .get(url)
                    .timeout(timeout)
                    .send()
                    .await
                    .is_ok_and(|r| r.status().is_success())
            }
            Ok(_) => false,
            Err(e) => {
                tracing::debug!(url, error = %e, "Product link unreachable");
                false
            }
        }
    }
}

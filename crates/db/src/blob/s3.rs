//! S3 blob store. Objects are expected to be publicly readable under
//! `public_base_url` (a bucket website, CDN, or presigning proxy). Every
//! call is bounded by the store's operation timeout, whatever the client's
//! own timeout configuration.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{join_url, key_from_url, validate_key, BlobStore};
use crate::error::BlobError;

#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    /// Prepended to every key, e.g. `roomcraft/`.
    prefix: String,
    public_base_url: String,
    operation_timeout: Duration,
}

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

impl S3BlobStore {
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            public_base_url: public_base_url.into(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn bounded<T>(
        &self,
        action: &str,
        key: &str,
        call: impl Future<Output = Result<T, BlobError>>,
    ) -> Result<T, BlobError> {
        tokio::time::timeout(self.operation_timeout, call)
            .await
            .map_err(|_| {
                BlobError::Backend(format!(
                    "{action} {key} timed out after {}ms",
                    self.operation_timeout.as_millis()
                ))
            })?
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        validate_key(key)?;
        let size = bytes.len();
        let upload = async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(self.object_key(key))
                .body(ByteStream::from(bytes))
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| BlobError::Backend(format!("Failed to upload {key}: {e}")))
        };
        self.bounded("Upload", key, upload).await?;
        tracing::debug!(key, size, bucket = %self.bucket, "Stored blob in S3");
        Ok(join_url(&self.public_base_url, key))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, BlobError> {
        let key = key_from_url(&self.public_base_url, url)
            .ok_or_else(|| BlobError::ForeignUrl(url.to_string()))?;
        validate_key(key)?;

        let download = async {
            let output = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(self.object_key(key))
                .send()
                .await
                .map_err(|e| {
                    if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                        BlobError::NotFound(key.to_string())
                    } else {
                        BlobError::Backend(format!("Failed to download {key}: {e}"))
                    }
                })?;
            output
                .body
                .collect()
                .await
                .map_err(|e| BlobError::Backend(format!("Failed to read {key}: {e}")))
        };
        let body = self.bounded("Download", key, download).await?;
        Ok(body.into_bytes().to_vec())
    }

    async fn url_for(&self, key: &str) -> Result<Option<String>, BlobError> {
        validate_key(key)?;
        let stat = async {
            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(self.object_key(key))
                .send()
                .await
            {
                Ok(_) => Ok(Some(join_url(&self.public_base_url, key))),
                Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
                Err(e) => Err(BlobError::Backend(format!("Failed to stat {key}: {e}"))),
            }
        };
        self.bounded("Stat", key, stat).await
    }

    fn owns(&self, url: &str) -> bool {
        key_from_url(&self.public_base_url, url).is_some()
    }
}

//! Durable storage for images.
//!
//! Keys are relative, `/`-separated paths such as
//! `products/<sha256>.jpg`. Every backend maps a key onto a public URL and
//! can read back the bytes of any URL it issued.

use async_trait::async_trait;

use crate::error::BlobError;

mod local;
mod memory;
mod s3;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, overwriting any previous value, and
    /// return the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, BlobError>;

    /// Read back the bytes behind a URL returned by [`BlobStore::put`].
    async fn get(&self, url: &str) -> Result<Vec<u8>, BlobError>;

    /// The URL of `key` if it is already stored.
    async fn url_for(&self, key: &str) -> Result<Option<String>, BlobError>;

    /// Whether `url` was issued by this store.
    fn owns(&self, url: &str) -> bool;
}

/// File extension for an image content type.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

/// Content type implied by a key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Reject keys that are empty, absolute, or contain `..` segments.
pub(crate) fn validate_key(key: &str) -> Result<(), BlobError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(BlobError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Join a base URL and a key with exactly one `/`.
pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Recover the key from a URL under `base`.
pub(crate) fn key_from_url<'a>(base: &str, url: &'a str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    url.strip_prefix(base)?.strip_prefix('/').filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg; charset=binary"), "jpg");
        assert_eq!(extension_for("IMAGE/WEBP"), "webp");
        assert_eq!(extension_for("text/html"), "bin");
        assert_eq!(content_type_for_key("products/abc.jpg"), "image/jpeg");
        assert_eq!(content_type_for_key("noext"), "application/octet-stream");
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("products/abc.png").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("a//b").is_err());
    }

    #[test]
    fn url_key_mapping() {
        let url = join_url("http://localhost:3000/blobs/", "products/a.png");
        assert_eq!(url, "http://localhost:3000/blobs/products/a.png");
        assert_eq!(key_from_url("http://localhost:3000/blobs", &url), Some("products/a.png"));
        assert_eq!(key_from_url("http://localhost:3000/blobs", "https://elsewhere/a.png"), None);
        assert_eq!(key_from_url("http://localhost:3000/blobs", "http://localhost:3000/blobs/"), None);
    }
}

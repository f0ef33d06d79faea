use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use roomcraft_db::{BlobStore, MemoryBlobStore};
use roomcraft_pipeline::testing::{fake_jpeg, fake_png};
use roomcraft_pipeline::{HttpImageFetcher, ImageFetcher, PipelineError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(2);

fn fetcher() -> HttpImageFetcher {
    HttpImageFetcher::new().unwrap()
}

#[tokio::test]
async fn fetches_and_sniffs_images() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chair.jpg"))
        // Wrong declared type: the bytes decide.
        .respond_with(ResponseTemplate::new(200).set_body_raw(fake_jpeg(), "application/octet-stream"))
        .mount(&server)
        .await;

    let img = fetcher()
        .fetch(&format!("{}/chair.jpg", server.uri()), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(img.content_type, "image/jpeg");
    assert_eq!(img.bytes, fake_jpeg());
}

#[tokio::test]
async fn html_error_pages_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Not here</html>"))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/gone.jpg", server.uri()), TIMEOUT)
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::AssetPersistFailure(_));
}

#[tokio::test]
async fn http_errors_and_slow_hosts_map_to_upstream_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(fake_jpeg(), "image/jpeg")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let f = fetcher();
    assert_matches!(
        f.fetch(&format!("{}/missing.jpg", server.uri()), TIMEOUT).await,
        Err(PipelineError::UpstreamUnavailable(_))
    );
    assert_matches!(
        f.fetch(&format!("{}/slow.jpg", server.uri()), Duration::from_millis(200)).await,
        Err(PipelineError::UpstreamTimeout(_))
    );
}

#[tokio::test]
async fn owned_urls_are_read_from_the_blob_store() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let url = blobs
        .put("products/abc.png", fake_png(), "image/png")
        .await
        .unwrap();

    let img = fetcher()
        .with_blob_store(blobs)
        .fetch(&url, TIMEOUT)
        .await
        .unwrap();
    assert_eq!(img.content_type, "image/png");
}

#[tokio::test]
async fn reachability_retries_rejected_head_as_get() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/product"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/product"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/removed"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let f = fetcher();
    assert!(f.is_reachable(&format!("{}/product", server.uri()), TIMEOUT).await);
    assert!(!f.is_reachable(&format!("{}/removed", server.uri()), TIMEOUT).await);
}

#[tokio::test]
async fn oversized_images_are_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFF; 4096], "image/jpeg"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/small.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(fake_jpeg(), "image/jpeg"))
        .mount(&server)
        .await;

    let f = fetcher().with_max_bytes(1024);
    let err = f
        .fetch(&format!("{}/huge.jpg", server.uri()), TIMEOUT)
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::AssetPersistFailure(msg) if msg.contains("larger than 1024 bytes"));
    assert!(f.fetch(&format!("{}/small.jpg", server.uri()), TIMEOUT).await.is_ok());
}

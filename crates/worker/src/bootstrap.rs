//! Building collaborators and stores from the environment.
//!
//! | Env Var                   | Default                        |
//! |---------------------------|--------------------------------|
//! | `DATABASE_URL`            | unset: in-memory project store |
//! | `BLOB_BACKEND`            | `local` (`local`/`s3`/`memory`)|
//! | `BLOB_LOCAL_DIR`          | `./data/blobs`                 |
//! | `BLOB_PUBLIC_BASE_URL`    | `http://localhost:3000/blobs`  |
//! | `BLOB_S3_BUCKET`          | required for `s3`              |
//! | `BLOB_S3_PREFIX`          | empty                          |
//! | `BLOB_S3_PUBLIC_BASE_URL` | `https://<bucket>.s3.amazonaws.com` |
//! | `BLOB_S3_TIMEOUT_SECS`    | `30`                           |
//!
//! The model reads `GEMINI_*` and search reads `GOOGLE_CSE_*`; without
//! search credentials sourcing is disabled and the Shop stage returns no
//! products.

use std::sync::Arc;
use std::time::Duration;

use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use roomcraft_db::{
    BlobStore, LocalBlobStore, MemoryBlobStore, MemoryProjectStore, PgProjectStore, ProjectStore,
    S3BlobStore, StoreError,
};
use roomcraft_events::EventBus;
use roomcraft_genai::{GeminiClient, GeminiConfig, GenAiError};
use roomcraft_pipeline::config::{env_parse, env_string};
use roomcraft_pipeline::{Collaborators, HttpImageFetcher, Orchestrator, PipelineConfig, PipelineError};
use roomcraft_search::{CseConfig, DisabledSearch, GoogleCseClient, ProductSearch};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Model configuration: {0}")]
    Model(#[from] GenAiError),

    #[error("Blob store configuration: {0}")]
    Blob(String),

    #[error("HTTP client: {0}")]
    Http(#[from] PipelineError),
}

/// Everything a process needs to run or serve the pipeline.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn ProjectStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub events: Arc<EventBus>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Services {
    /// Build every service from the environment.
    pub async fn from_env() -> Result<Self, BootstrapError> {
        let store = project_store_from_env().await?;
        let blobs = blob_store_from_env().await?;
        let events = Arc::new(EventBus::default());

        let model = Arc::new(GeminiClient::new(GeminiConfig::from_env()?));
        let fetcher = Arc::new(HttpImageFetcher::new()?.with_blob_store(blobs.clone()));
        let orchestrator = Orchestrator::new(
            store.clone(),
            events.clone(),
            Collaborators {
                model,
                search: search_from_env(),
                fetcher,
                blobs: blobs.clone(),
            },
            PipelineConfig::from_env(),
        );

        Ok(Self {
            store,
            blobs,
            events,
            orchestrator: Arc::new(orchestrator),
        })
    }
}

/// Postgres when `DATABASE_URL` is set (migrations applied), otherwise an
/// in-memory store.
pub async fn project_store_from_env() -> Result<Arc<dyn ProjectStore>, BootstrapError> {
    match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => {
            let pool = roomcraft_db::create_pool(&url)
                .await
                .map_err(StoreError::from)?;
            roomcraft_db::run_migrations(&pool)
                .await
                .map_err(|e| BootstrapError::Migration(e.to_string()))?;
            tracing::info!("Using Postgres project store");
            Ok(Arc::new(PgProjectStore::new(pool)))
        }
        _ => {
            tracing::warn!("DATABASE_URL not set, projects are kept in memory");
            Ok(Arc::new(MemoryProjectStore::new()))
        }
    }
}

pub async fn blob_store_from_env() -> Result<Arc<dyn BlobStore>, BootstrapError> {
    let backend = env_string("BLOB_BACKEND", "local").to_ascii_lowercase();
    match backend.as_str() {
        "local" => {
            let dir = env_string("BLOB_LOCAL_DIR", "./data/blobs");
            let base = env_string("BLOB_PUBLIC_BASE_URL", "http://localhost:3000/blobs");
            tracing::info!(dir = %dir, base_url = %base, "Using local blob store");
            Ok(Arc::new(LocalBlobStore::new(dir, base)))
        }
        "s3" => {
            let bucket = env_string("BLOB_S3_BUCKET", "");
            if bucket.is_empty() {
                return Err(BootstrapError::Blob("BLOB_S3_BUCKET is required for the s3 backend".into()));
            }
            let prefix = env_string("BLOB_S3_PREFIX", "");
            let base = env_string(
                "BLOB_S3_PUBLIC_BASE_URL",
                &format!("https://{bucket}.s3.amazonaws.com"),
            );
            let timeout = Duration::from_secs(env_parse("BLOB_S3_TIMEOUT_SECS", 30u64));
            let config = aws_config::defaults(BehaviorVersion::latest())
                .timeout_config(
                    TimeoutConfig::builder()
                        .operation_timeout(timeout)
                        .build(),
                )
                .load()
                .await;
            let client = aws_sdk_s3::Client::new(&config);
            tracing::info!(bucket = %bucket, prefix = %prefix, timeout_secs = timeout.as_secs(), "Using S3 blob store");
            Ok(Arc::new(
                S3BlobStore::new(client, bucket, prefix, base).with_operation_timeout(timeout),
            ))
        }
        "memory" => {
            tracing::warn!("Using in-memory blob store, images are lost on restart");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
        other => Err(BootstrapError::Blob(format!("unknown BLOB_BACKEND '{other}'"))),
    }
}

/// Directory served at `/blobs` when the local backend is selected.
pub fn local_blob_dir() -> Option<String> {
    (env_string("BLOB_BACKEND", "local").eq_ignore_ascii_case("local"))
        .then(|| env_string("BLOB_LOCAL_DIR", "./data/blobs"))
}

/// Google Custom Search when configured, otherwise disabled search.
pub fn search_from_env() -> Arc<dyn ProductSearch> {
    match CseConfig::from_env() {
        Ok(config) => Arc::new(GoogleCseClient::new(config)),
        Err(e) => {
            tracing::warn!(error = %e, "Product search disabled");
            Arc::new(DisabledSearch)
        }
    }
}

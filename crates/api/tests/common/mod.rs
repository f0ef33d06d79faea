use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use roomcraft_api::config::ServerConfig;
use roomcraft_api::router::build_app_router;
use roomcraft_api::state::AppState;
use roomcraft_db::{MemoryBlobStore, MemoryProjectStore};
use roomcraft_events::EventBus;
use roomcraft_pipeline::testing::{fake_jpeg, result, ScriptedModel, ScriptedSearch, StaticFetcher};
use roomcraft_pipeline::{Collaborators, Orchestrator, PipelineConfig};
use roomcraft_worker::{RunQueue, WorkerConfig, WorkerHandle};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const ROOM_PHOTO: &str = "https://uploads.example/room.jpg";
pub const PRODUCT_PHOTO: &str = "https://cdn.example/lampe.jpg";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        embedded_worker: false,
    }
}

/// The application plus handles to its in-memory services.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryProjectStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub model: Arc<ScriptedModel>,
    pub shutdown: CancellationToken,
    worker: Option<WorkerHandle>,
}

impl TestApp {
    /// No worker: runs are driven by the test through `orchestrator`.
    pub fn new(model: ScriptedModel) -> Self {
        Self::build(model, false)
    }

    /// With an embedded worker, as the binary runs by default.
    pub fn with_worker(model: ScriptedModel) -> Self {
        Self::build(model, true)
    }

    fn build(model: ScriptedModel, embedded_worker: bool) -> Self {
        let store = Arc::new(MemoryProjectStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let events = Arc::new(EventBus::default());
        let model = Arc::new(model);
        let search = ScriptedSearch::new().with_fallback(vec![result(
            "Lampe Papier - Boutique",
            "https://shop.example/lampe",
            PRODUCT_PHOTO,
        )]);
        let fetcher = StaticFetcher::new()
            .with_image(ROOM_PHOTO, fake_jpeg())
            .with_image(PRODUCT_PHOTO, fake_jpeg())
            .with_blob_store(blobs.clone());

        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            events.clone(),
            Collaborators {
                model: model.clone(),
                search: Arc::new(search),
                fetcher: Arc::new(fetcher),
                blobs,
            },
            PipelineConfig::default(),
        ));

        let shutdown = CancellationToken::new();
        let worker = embedded_worker.then(|| {
            let config = WorkerConfig {
                poll_interval: Duration::from_millis(50),
                ..WorkerConfig::default()
            };
            roomcraft_worker::start(orchestrator.clone(), store.clone(), &config, shutdown.child_token())
        });
        let queue: Option<RunQueue> = worker.as_ref().map(|w| w.queue.clone());

        let config = ServerConfig {
            embedded_worker,
            ..test_config()
        };
        let state = AppState {
            store: store.clone(),
            events,
            orchestrator: orchestrator.clone(),
            queue,
            config: Arc::new(config.clone()),
            shutdown: shutdown.clone(),
        };

        Self {
            router: build_app_router(state, &config),
            store,
            orchestrator,
            model,
            shutdown,
            worker,
        }
    }

    /// Create a kitchen/japandi project through the API and return its id.
    pub async fn create_project(&self) -> String {
        let response = post_json(self.router.clone(), "/api/v1/projects", new_project_body()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["data"]["id"]
            .as_str()
            .expect("project id")
            .to_string()
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker {
            worker.join().await;
        }
    }
}

pub fn new_project_body() -> Value {
    serde_json::json!({
        "owner_id": "owner-1",
        "original_image_url": ROOM_PHOTO,
        "room_type": "kitchen",
        "style": "japandi",
        "budget": 2000
    })
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, path: &str) -> Response {
    send(app, Method::GET, path, Body::empty()).await
}

pub async fn delete(app: Router, path: &str) -> Response {
    send(app, Method::DELETE, path, Body::empty()).await
}

pub async fn post_json(app: Router, path: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

async fn send(app: Router, method: Method, path: &str, body: Body) -> Response {
    let request = Request::builder().method(method).uri(path).body(body).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

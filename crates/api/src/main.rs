use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomcraft_api::config::ServerConfig;
use roomcraft_api::router::build_app_router;
use roomcraft_api::state::AppState;
use roomcraft_worker::{bootstrap, Services, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "roomcraft_api=debug,roomcraft_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        embedded_worker = config.embedded_worker,
        "Loaded server configuration",
    );

    // --- Stores, collaborators, orchestrator ---
    let services = Services::from_env()
        .await
        .expect("Failed to initialise pipeline services");

    // --- Embedded worker ---
    let shutdown = CancellationToken::new();
    let worker = config.embedded_worker.then(|| {
        let worker_config = WorkerConfig::from_env();
        tracing::info!(?worker_config, "Starting embedded worker");
        roomcraft_worker::start(
            services.orchestrator.clone(),
            services.store.clone(),
            &worker_config,
            shutdown.child_token(),
        )
    });

    // --- App state ---
    let state = AppState {
        store: services.store.clone(),
        events: services.events.clone(),
        orchestrator: services.orchestrator.clone(),
        queue: worker.as_ref().map(|w| w.queue.clone()),
        config: Arc::new(config.clone()),
        shutdown: shutdown.clone(),
    };

    // --- Router ---
    let mut app = build_app_router(state, &config);
    if let Some(dir) = bootstrap::local_blob_dir() {
        tracing::info!(dir = %dir, "Serving local blobs at /blobs");
        app = app.nest_service("/blobs", ServeDir::new(dir));
    }

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    if let Some(worker) = worker {
        if tokio::time::timeout(Duration::from_secs(30), worker.join())
            .await
            .is_err()
        {
            tracing::warn!("Embedded worker did not stop in time");
        }
    }
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}

use roomcraft_worker::{Services, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcraft_worker=debug,roomcraft_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let services = Services::from_env()
        .await
        .expect("Failed to initialise pipeline services");
    let config = WorkerConfig::from_env();
    tracing::info!(?config, "Worker configuration loaded");

    let cancel = CancellationToken::new();
    let handle = roomcraft_worker::start(
        services.orchestrator.clone(),
        services.store.clone(),
        &config,
        cancel.clone(),
    );

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, cancelling in-flight runs");
    cancel.cancel();
    handle.join().await;
    tracing::info!("Worker stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

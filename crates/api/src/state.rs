use std::sync::Arc;

use roomcraft_db::ProjectStore;
use roomcraft_events::EventBus;
use roomcraft_pipeline::Orchestrator;
use roomcraft_worker::RunQueue;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProjectStore>,
    pub events: Arc<EventBus>,
    /// Also the entry point to the individual stages and the assistant.
    pub orchestrator: Arc<Orchestrator>,
    /// Run queue of the embedded worker. `None` when runs are executed by a
    /// separate worker process, which finds new projects by polling.
    pub queue: Option<RunQueue>,
    pub config: Arc<ServerConfig>,
    /// Cancelled when the server starts shutting down; ends open event
    /// streams.
    pub shutdown: CancellationToken,
}

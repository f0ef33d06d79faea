//! Background execution of pipeline runs.
//!
//! [`RunQueue`] is the trigger: whoever creates a pending project enqueues
//! its id. [`PipelineWorker`] drains the queue with bounded concurrency and
//! [`PendingPoller`] re-enqueues pending projects nobody triggered. The
//! same pieces run in the standalone `roomcraft-worker` binary and inside
//! the API process.

pub mod bootstrap;
pub mod config;
pub mod poller;
pub mod queue;
pub mod worker;

use std::sync::Arc;

use roomcraft_db::ProjectStore;
use roomcraft_pipeline::Orchestrator;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use bootstrap::{BootstrapError, Services};
pub use config::WorkerConfig;
pub use poller::PendingPoller;
pub use queue::{EnqueueOutcome, RunQueue, RunReceiver};
pub use worker::PipelineWorker;

/// Handles to a started worker.
pub struct WorkerHandle {
    pub queue: RunQueue,
    pub worker: JoinHandle<()>,
    pub poller: JoinHandle<()>,
}

impl WorkerHandle {
    /// Wait for both loops to exit after their token was cancelled.
    pub async fn join(self) {
        if let Err(e) = self.poller.await {
            tracing::error!(error = %e, "Pending poller task failed");
        }
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Pipeline worker task failed");
        }
    }
}

/// Spawn the worker and the pending poller on the current runtime.
pub fn start(
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ProjectStore>,
    config: &WorkerConfig,
    cancel: CancellationToken,
) -> WorkerHandle {
    let (queue, receiver) = RunQueue::new(config.queue_capacity);

    let worker = PipelineWorker::new(orchestrator, queue.clone(), receiver, config.max_concurrent_runs);
    let worker_cancel = cancel.clone();
    let worker = tokio::spawn(async move { worker.run(worker_cancel).await });

    let poller = PendingPoller::new(store, queue.clone(), config.poll_interval, config.poll_batch);
    let poller = tokio::spawn(async move { poller.run(cancel).await });

    WorkerHandle {
        queue,
        worker,
        poller,
    }
}

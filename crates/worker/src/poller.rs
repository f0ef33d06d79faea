//! Pending project poller.
//!
//! Projects created while no worker was listening (a restart, another
//! process writing to the same database) are still `pending`; the poller
//! finds them and feeds them to the run queue.

use std::sync::Arc;
use std::time::Duration;

use roomcraft_core::project::ProjectStatus;
use roomcraft_db::{ProjectStore, StoreError};
use tokio_util::sync::CancellationToken;

use crate::queue::{EnqueueOutcome, RunQueue};

pub struct PendingPoller {
    store: Arc<dyn ProjectStore>,
    queue: RunQueue,
    poll_interval: Duration,
    batch: usize,
}

impl PendingPoller {
    pub fn new(store: Arc<dyn ProjectStore>, queue: RunQueue, poll_interval: Duration, batch: usize) -> Self {
        Self {
            store,
            queue,
            poll_interval,
            batch,
        }
    }

    /// Run the polling loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Pending poller started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Pending poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Poll cycle failed");
                    }
                }
            }
        }
    }

    /// One poll cycle. Returns the number of newly queued projects.
    pub async fn poll_once(&self) -> Result<usize, StoreError> {
        let pending = self
            .store
            .list_by_status(ProjectStatus::Pending, self.batch)
            .await?;
        let queued = pending
            .iter()
            .filter(|p| self.queue.enqueue(p.id) == EnqueueOutcome::Queued)
            .count();
        if queued > 0 {
            tracing::info!(queued, "Recovered pending projects");
        }
        Ok(queued)
    }
}

//! Consumes the run queue and executes orchestrator runs.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use roomcraft_core::types::ProjectId;
use roomcraft_pipeline::{Orchestrator, RunOutcome};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::queue::{RunQueue, RunReceiver};

/// Executes queued runs, at most `max_concurrent_runs` at a time.
pub struct PipelineWorker {
    orchestrator: Arc<Orchestrator>,
    queue: RunQueue,
    receiver: RunReceiver,
    permits: Arc<Semaphore>,
}

impl PipelineWorker {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        queue: RunQueue,
        receiver: RunReceiver,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            orchestrator,
            queue,
            receiver,
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    /// Run until `cancel` fires, then cancel in-flight runs and wait for
    /// them to record their outcome.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            max_concurrent_runs = self.permits.available_permits(),
            "Pipeline worker started",
        );
        let mut running = JoinSet::new();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(done) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = done {
                        tracing::error!(error = %e, "Run task panicked");
                    }
                    continue;
                }
                next = self.receiver.receiver.recv() => next,
            };
            let Some(project_id) = next else {
                break;
            };

            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    self.queue.finish(project_id);
                    break;
                }
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let orchestrator = self.orchestrator.clone();
            let queue = self.queue.clone();
            let token = cancel.child_token();
            running.spawn(async move {
                let _permit = permit;
                execute(&orchestrator, project_id, token).await;
                queue.finish(project_id);
            });
        }

        tracing::info!(in_flight = running.len(), "Pipeline worker shutting down");
        while let Some(done) = running.join_next().await {
            if let Err(e) = done {
                tracing::error!(error = %e, "Run task panicked");
            }
        }
    }
}

/// One run, with a panic inside it recorded as a failed project rather
/// than leaving the project in `generating`.
async fn execute(orchestrator: &Orchestrator, project_id: ProjectId, token: CancellationToken) {
    let outcome = match AssertUnwindSafe(orchestrator.run(project_id, token))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!(project_id = %project_id, "Run panicked, marking project failed");
            orchestrator.abandon(project_id, "run panicked").await
        }
    };

    match outcome {
        Ok(RunOutcome::Completed { generation_id }) => {
            tracing::info!(project_id = %project_id, generation_id = %generation_id, "Run completed");
        }
        Ok(RunOutcome::Failed { code, message }) => {
            tracing::warn!(project_id = %project_id, code, message = %message, "Run failed");
        }
        Ok(RunOutcome::Skipped) => {}
        Err(e) => {
            tracing::error!(project_id = %project_id, error = %e, "Run outcome could not be recorded");
        }
    }
}

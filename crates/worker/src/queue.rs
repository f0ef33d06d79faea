//! Explicit run queue.
//!
//! Projects to run are sent over a bounded channel. An id stays in the
//! queue's tracked set from the moment it is enqueued until its run
//! finishes, so repeated triggers for the same project (the API and the
//! poller both enqueue) collapse into one run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use roomcraft_core::types::ProjectId;
use tokio::sync::mpsc;

/// Why an id was not enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Already waiting or running.
    Duplicate,
    /// Channel full or closed; the poller will pick it up later.
    Rejected,
}

/// Sending half; cheap to clone.
#[derive(Clone)]
pub struct RunQueue {
    sender: mpsc::Sender<ProjectId>,
    tracked: Arc<Mutex<HashSet<ProjectId>>>,
}

/// Receiving half, owned by the worker.
pub struct RunReceiver {
    pub(crate) receiver: mpsc::Receiver<ProjectId>,
}

impl RunQueue {
    pub fn new(capacity: usize) -> (Self, RunReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                tracked: Arc::new(Mutex::new(HashSet::new())),
            },
            RunReceiver { receiver },
        )
    }

    pub fn enqueue(&self, id: ProjectId) -> EnqueueOutcome {
        {
            let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
            if !tracked.insert(id) {
                return EnqueueOutcome::Duplicate;
            }
        }
        match self.sender.try_send(id) {
            Ok(()) => {
                tracing::debug!(project_id = %id, "Run queued");
                EnqueueOutcome::Queued
            }
            Err(e) => {
                self.finish(id);
                tracing::warn!(project_id = %id, error = %e, "Run queue rejected project");
                EnqueueOutcome::Rejected
            }
        }
    }

    /// Release `id` once its run is over.
    pub fn finish(&self, id: ProjectId) {
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Whether `id` is queued or running.
    pub fn is_tracked(&self, id: ProjectId) -> bool {
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use roomcraft_core::types::new_id;

    use super::*;

    #[test]
    fn duplicates_collapse_until_finished() {
        let (queue, mut rx) = RunQueue::new(8);
        let id = new_id();

        assert_eq!(queue.enqueue(id), EnqueueOutcome::Queued);
        assert_eq!(queue.enqueue(id), EnqueueOutcome::Duplicate);
        assert_eq!(rx.receiver.try_recv().unwrap(), id);
        assert!(rx.receiver.try_recv().is_err());

        // Still tracked while running.
        assert_eq!(queue.enqueue(id), EnqueueOutcome::Duplicate);
        queue.finish(id);
        assert_eq!(queue.enqueue(id), EnqueueOutcome::Queued);
    }

    #[test]
    fn full_queue_rejects_and_untracks() {
        let (queue, _rx) = RunQueue::new(1);
        let (a, b) = (new_id(), new_id());
        assert_eq!(queue.enqueue(a), EnqueueOutcome::Queued);
        assert_eq!(queue.enqueue(b), EnqueueOutcome::Rejected);
        assert!(!queue.is_tracked(b));
    }
}

use std::time::Duration;

use roomcraft_pipeline::config::env_parse;

/// Run queue and poller settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Orchestrator runs executing at once.
    pub max_concurrent_runs: usize,
    pub queue_capacity: usize,
    /// How often the poller looks for pending projects.
    pub poll_interval: Duration,
    /// Pending projects read per poll.
    pub poll_batch: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
            queue_capacity: 256,
            poll_interval: Duration::from_secs(2),
            poll_batch: 32,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `WORKER_MAX_CONCURRENT_RUNS` | `4`     |
    /// | `WORKER_QUEUE_CAPACITY`      | `256`   |
    /// | `WORKER_POLL_INTERVAL_SECS`  | `2`     |
    /// | `WORKER_POLL_BATCH`          | `32`    |
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_concurrent_runs: env_parse("WORKER_MAX_CONCURRENT_RUNS", d.max_concurrent_runs).max(1),
            queue_capacity: env_parse("WORKER_QUEUE_CAPACITY", d.queue_capacity).max(1),
            poll_interval: Duration::from_secs(
                env_parse("WORKER_POLL_INTERVAL_SECS", d.poll_interval.as_secs()).max(1),
            ),
            poll_batch: env_parse("WORKER_POLL_BATCH", d.poll_batch).max(1),
        }
    }
}

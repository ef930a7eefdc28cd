//! Tunables for the pipelines and the dispatch pool.

use std::time::Duration;

/// Default upper bound on how long a pipeline worker waits for work before
/// re-checking its stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default time an idle dispatch thread lingers before it is reclaimed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by the send and receive pipelines of every instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Settings of the shared listener dispatch pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub idle_timeout: Duration,
    pub thread_name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            thread_name_prefix: "datapool-dispatch".to_string(),
        }
    }
}

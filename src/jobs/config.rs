//! Configuration for the background job system.

use crate::utils::get_env_with_prefix;
use serde::{Deserialize, Serialize};

/// Configuration for background jobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Number of worker tasks to spawn.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Maximum number of retries for failed jobs.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry backoff in milliseconds (doubled per attempt).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl JobsConfig {
    /// Load jobs configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(count) = get_env_with_prefix("JOBS_WORKER_COUNT") {
            if let Ok(c) = count.parse() {
                config.worker_count = c;
            }
        }

        if let Some(retries) = get_env_with_prefix("JOBS_MAX_RETRIES") {
            if let Ok(r) = retries.parse() {
                config.max_retries = r;
            }
        }

        if let Some(backoff) = get_env_with_prefix("JOBS_RETRY_BACKOFF_MS") {
            if let Ok(b) = backoff.parse() {
                config.retry_backoff_ms = b;
            }
        }

        config
    }
}

fn default_worker_count() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

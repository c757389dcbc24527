use serde::{Deserialize, Serialize};

use crate::jobs::JobsConfig;
use crate::utils::get_env_with_prefix;

/// Main configuration for the payout engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub jobs: JobsConfig,
    pub counter: CounterConfig,
    pub payout: PayoutConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

/// Tuning for the sharded counter store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CounterConfig {
    /// Shard count a counter starts with on first write.
    #[serde(default = "default_shards")]
    pub default_shards: u32,
    /// TTL for cached counter totals and member sets, in seconds.
    #[serde(default = "default_counter_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Maximum cached counter entries per process.
    #[serde(default = "default_counter_cache_capacity")]
    pub cache_capacity: u64,
    /// Upper bound (exclusive) of the random delay before a contended
    /// shard write is retried, in milliseconds.
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter_ms: u64,
}

/// Tuning for payout settlement.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayoutConfig {
    /// Wall-clock bound on a single external processor call, in seconds.
    /// A call that exceeds it is treated as outcome-unknown, never as
    /// failed.
    #[serde(default = "default_processor_timeout")]
    pub processor_timeout_secs: u64,
    /// How long a transfer may sit unresolved before the reconciliation
    /// sweep picks it up, in seconds.
    #[serde(default = "default_sweep_grace")]
    pub sweep_grace_secs: u64,
    /// How many times the transfer creator retries a contended claim
    /// before giving up with a conflict error.
    #[serde(default = "default_claim_attempts")]
    pub claim_attempts: u32,
    /// Upper bound (exclusive) of the random pause between claim
    /// attempts, in milliseconds.
    #[serde(default = "default_retry_jitter")]
    pub claim_jitter_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            jobs: JobsConfig::default(),
            counter: CounterConfig::default(),
            payout: PayoutConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            default_shards: default_shards(),
            cache_ttl_secs: default_counter_cache_ttl(),
            cache_capacity: default_counter_cache_capacity(),
            retry_jitter_ms: default_retry_jitter(),
        }
    }
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            processor_timeout_secs: default_processor_timeout(),
            sweep_grace_secs: default_sweep_grace(),
            claim_attempts: default_claim_attempts(),
            claim_jitter_ms: default_retry_jitter(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Each variable is checked with the `PAYRUN_` prefix first, then
    /// unprefixed. Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            config.logging.json = json.parse().unwrap_or(false);
        }

        config.jobs = JobsConfig::from_env();

        if let Some(shards) = get_env_with_prefix("COUNTER_DEFAULT_SHARDS") {
            if let Ok(n) = shards.parse() {
                config.counter.default_shards = n;
            }
        }
        if let Some(ttl) = get_env_with_prefix("COUNTER_CACHE_TTL_SECS") {
            if let Ok(t) = ttl.parse() {
                config.counter.cache_ttl_secs = t;
            }
        }
        if let Some(capacity) = get_env_with_prefix("COUNTER_CACHE_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                config.counter.cache_capacity = c;
            }
        }
        if let Some(jitter) = get_env_with_prefix("COUNTER_RETRY_JITTER_MS") {
            if let Ok(j) = jitter.parse() {
                config.counter.retry_jitter_ms = j;
            }
        }

        if let Some(timeout) = get_env_with_prefix("PROCESSOR_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                config.payout.processor_timeout_secs = t;
            }
        }
        if let Some(grace) = get_env_with_prefix("SWEEP_GRACE_SECS") {
            if let Ok(g) = grace.parse() {
                config.payout.sweep_grace_secs = g;
            }
        }
        if let Some(attempts) = get_env_with_prefix("CLAIM_ATTEMPTS") {
            if let Ok(a) = attempts.parse() {
                config.payout.claim_attempts = a;
            }
        }

        config
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_shards() -> u32 {
    3
}

fn default_counter_cache_ttl() -> u64 {
    60
}

fn default_counter_cache_capacity() -> u64 {
    100_000
}

fn default_retry_jitter() -> u64 {
    30
}

fn default_processor_timeout() -> u64 {
    30
}

fn default_sweep_grace() -> u64 {
    300
}

fn default_claim_attempts() -> u32 {
    5
}

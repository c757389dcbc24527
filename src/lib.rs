//! Payrun - fee ledger and payout engine for multi-tenant commerce
//! backends.
//!
//! Payrun converts accumulated monetary obligations (platform cut,
//! affiliate commission, partner commission) into outbound transfers to
//! an external payment processor, exactly once per obligation, under
//! concurrent execution, tenant isolation, and partial failure. It also
//! provides the sharded counter primitive used for high-frequency
//! aggregates that would otherwise contend on a single row.
//!
//! # Architecture
//!
//! - **Sharded counters** ([`counter`]): write-partitioned aggregates
//!   with a read-through TTL cache
//! - **Fee ledger** ([`ledger`]): fees, transfers, and the idempotent
//!   claim that links them
//! - **Payout pipeline** ([`payout`]): orchestrator fan-out, settlement
//!   executor, reconciliation sweep
//! - **Processor client** ([`processor`]): the single external transfer
//!   operation, mock and live implementations
//! - **Jobs** ([`jobs`]): trait-based background queue with typed
//!   handler registry and worker pool
//!
//! # Quick start
//!
//! ```rust,no_run
//! use payrun::{AppContext, Config, Namespace};
//! use payrun::jobs::{InMemoryJobQueue, JobRegistry, WorkerPool};
//! use payrun::processor::MockProcessor;
//! use payrun::store::{InMemoryCounterStore, InMemoryLedgerStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> payrun::Result<()> {
//!     payrun::init_tracing();
//!
//!     let config = Config::from_env();
//!     let queue = Arc::new(InMemoryJobQueue::new(
//!         config.jobs.max_retries,
//!         config.jobs.retry_backoff_ms,
//!     ));
//!     let ctx = Arc::new(
//!         AppContext::builder()
//!             .config(config.clone())
//!             .ledger(Arc::new(InMemoryLedgerStore::new()))
//!             .counter_store(Arc::new(InMemoryCounterStore::new()))
//!             .jobs(queue.clone())
//!             .processor(Arc::new(MockProcessor::new()))
//!             .build()?,
//!     );
//!
//!     let registry = Arc::new(JobRegistry::new());
//!     payrun::payout::register_payout_jobs(&registry).await;
//!     payrun::counter::register_counter_jobs(&registry).await;
//!     let pool = WorkerPool::new(queue, registry, ctx.clone(), config.jobs.worker_count);
//!
//!     let ns = Namespace::new("tenant-a")?;
//!     ctx.orchestrator().run(&ns, chrono::Utc::now()).await?;
//!
//!     pool.shutdown().await;
//!     Ok(())
//! }
//! ```

mod app;
mod config;
mod error;
mod tenant;

pub mod counter;
pub mod jobs;
pub mod ledger;
pub mod payout;
pub mod processor;
pub mod store;
pub mod traits;
pub mod utils;

// Re-exports for the public API.
pub use app::{AppContext, AppContextBuilder};
pub use config::{Config, CounterConfig, LoggingConfig, PayoutConfig};
pub use error::{PayrunError, Result};
pub use jobs::JobsConfig;
pub use tenant::Namespace;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with sensible defaults.
///
/// Reads the filter from `RUST_LOG` (falling back to `info`) and emits
/// JSON when `PAYRUN_LOG_JSON=true`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("PAYRUN_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from a [`Config`].
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

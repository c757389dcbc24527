//! Background job system.
//!
//! Trait-based background job processing with a typed handler registry
//! and a distributed-friendly worker pool. The payout orchestrator fans
//! settlement units out onto this queue, and counter mutations use its
//! `schedule` support for jittered contention retries.

mod config;
mod in_memory;
mod registry;
mod worker;


pub use config::JobsConfig;
pub use in_memory::InMemoryJobQueue;
pub use registry::JobRegistry;
pub use worker::{JobWorker, WorkerPool};

//! Background job traits.
//!
//! Settlement units and counter mutations run as background jobs, never
//! inside a request. These traits define the queue contract: at-least-once
//! delivery, so every job the engine enqueues must be idempotent.

use crate::app::AppContext;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A background job that can be executed asynchronously.
///
/// Jobs are serialized into the queue and rehydrated by a registered
/// handler, so the payload must round-trip through JSON.
#[async_trait]
pub trait Job: Send + Sync + Debug {
    /// Stable identifier for this job type (e.g. `"payout.settle_fee"`).
    fn job_type(&self) -> &str;

    /// Serialize the job payload to JSON.
    fn serialize(&self) -> Result<serde_json::Value>;

    /// Execute the job with the given application context.
    async fn execute(&self, ctx: &AppContext) -> Result<()>;
}

/// An enqueued job as stored by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobData {
    /// Unique job identifier.
    pub job_id: String,
    /// Job type identifier (matches [`Job::job_type`]).
    pub job_type: String,
    /// Serialized job payload.
    pub payload: serde_json::Value,
    /// How many times this job has been attempted.
    pub attempts: u32,
    /// When this job becomes runnable (`None` = immediately).
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the job was first enqueued.
    pub created_at: DateTime<Utc>,
}

impl JobData {
    /// Build queue metadata for a job, runnable immediately.
    pub fn new(job_id: String, job_type: String, payload: serde_json::Value) -> Self {
        Self {
            job_id,
            job_type,
            payload,
            attempts: 0,
            scheduled_at: None,
            created_at: Utc::now(),
        }
    }

    /// Build queue metadata for a job that becomes runnable at `run_at`.
    pub fn scheduled(
        job_id: String,
        job_type: String,
        payload: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scheduled_at: Some(run_at),
            ..Self::new(job_id, job_type, payload)
        }
    }
}

/// Queue contract for background work.
///
/// Delivery is at-least-once: a unit may be handed to a worker more than
/// once (duplicate enqueue, worker crash between execute and complete).
/// Handlers rely on the ledger's idempotent claim to stay correct under
/// redelivery. Dropping an unexecuted unit is always safe; units re-derive
/// their work from persisted fee status.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job for immediate execution, returning its id.
    async fn enqueue(&self, job: &dyn Job) -> Result<String>;

    /// Enqueue a job that becomes runnable at `run_at`.
    ///
    /// Used for jittered retries: a contended counter shard re-schedules
    /// its own increment a few milliseconds into the future instead of
    /// retrying synchronously.
    async fn schedule(&self, job: &dyn Job, run_at: DateTime<Utc>) -> Result<String>;

    /// Take the next runnable job, moving it to a processing state.
    ///
    /// Returns `None` when nothing is runnable.
    async fn dequeue(&self) -> Result<Option<JobData>>;

    /// Mark a job as completed and drop it from the queue.
    async fn complete(&self, job_id: &str) -> Result<()>;

    /// Mark a job as failed.
    ///
    /// The queue decides whether to re-schedule it with backoff or park
    /// it in the failed history.
    async fn fail(&self, job_id: &str, error: String) -> Result<()>;

    /// Whether the queue is operational.
    fn is_healthy(&self) -> bool;
}

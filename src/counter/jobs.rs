//! Queue jobs carrying counter mutations.
//!
//! Each mutation is one typed job. On a shard write conflict the job
//! raises the counter's shard count by one and re-schedules itself with a
//! bounded random delay, so a hot shard is never hammered by synchronous
//! retries.

use crate::app::AppContext;
use crate::error::{PayrunError, Result};
use crate::jobs::JobRegistry;
use crate::tenant::Namespace;
use crate::traits::job::Job;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const INCREMENT_JOB: &str = "counter.increment";
pub const ADD_MEMBER_JOB: &str = "counter.add_member";

/// Apply `delta` to one shard of the named counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementJob {
    pub namespace: Namespace,
    pub name: String,
    pub tag: String,
    pub delta: i64,
}

#[async_trait]
impl Job for IncrementJob {
    fn job_type(&self) -> &str {
        INCREMENT_JOB
    }

    fn serialize(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| PayrunError::internal(e.to_string()))
    }

    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let counters = ctx.counters();
        match counters
            .apply_increment(&self.namespace, &self.name, &self.tag, self.delta)
            .await
        {
            Err(e) if e.is_conflict() => {
                reschedule_after_conflict(ctx, &self.namespace, &self.name, self).await
            }
            other => other,
        }
    }
}

/// Insert a value into the member set of one shard of the named counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberJob {
    pub namespace: Namespace,
    pub name: String,
    pub tag: String,
    pub value: String,
}

#[async_trait]
impl Job for AddMemberJob {
    fn job_type(&self) -> &str {
        ADD_MEMBER_JOB
    }

    fn serialize(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| PayrunError::internal(e.to_string()))
    }

    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let counters = ctx.counters();
        match counters
            .apply_add_member(&self.namespace, &self.name, &self.tag, &self.value)
            .await
        {
            Err(e) if e.is_conflict() => {
                reschedule_after_conflict(ctx, &self.namespace, &self.name, self).await
            }
            other => other,
        }
    }
}

/// Shard-conflict recovery: grow the shard count by one and put the same
/// job back on the queue a few milliseconds out.
async fn reschedule_after_conflict(
    ctx: &AppContext,
    ns: &Namespace,
    name: &str,
    job: &dyn Job,
) -> Result<()> {
    let counters = ctx.counters();

    let observed = counters.shard_count(ns, name).await?;
    counters.increase_shards(ns, name, observed + 1).await?;

    let jitter_ms = rand::thread_rng().gen_range(0..counters.retry_jitter_ms().max(1));
    let run_at = Utc::now() + Duration::milliseconds(jitter_ms as i64);
    ctx.jobs().schedule(job, run_at).await?;

    tracing::debug!(
        namespace = %ns,
        counter = %name,
        jitter_ms,
        "shard write contended; grew shards and re-scheduled"
    );
    Ok(())
}

/// Register counter job handlers with the registry.
pub async fn register_counter_jobs(registry: &JobRegistry) {
    registry
        .register(INCREMENT_JOB, |data, ctx| {
            Box::pin(async move {
                let job: IncrementJob = serde_json::from_value(data.payload)
                    .map_err(|e| PayrunError::internal(format!("bad increment payload: {}", e)))?;
                job.execute(&ctx).await
            })
        })
        .await;

    registry
        .register(ADD_MEMBER_JOB, |data, ctx| {
            Box::pin(async move {
                let job: AddMemberJob = serde_json::from_value(data.payload)
                    .map_err(|e| PayrunError::internal(format!("bad add-member payload: {}", e)))?;
                job.execute(&ctx).await
            })
        })
        .await;
}

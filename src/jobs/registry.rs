//! Job registry mapping job types to handler functions.
//!
//! Queued work is dispatched through this statically registered handler
//! table; there is no reflective lookup anywhere. A job type string maps
//! to exactly one handler, which deserializes the payload into its
//! concrete job type and executes it.

use crate::app::AppContext;
use crate::error::{PayrunError, Result};
use crate::traits::job::JobData;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// Handler signature: receives the raw [`JobData`] and the application
/// context, deserializes the payload, runs the job.
type JobHandler =
    Arc<dyn Fn(JobData, Arc<AppContext>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Registry for mapping job types to their handlers.
///
/// Thread-safe and shared across workers. Job types must be registered
/// before workers start; an unregistered type fails the unit.
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: Arc<tokio::sync::RwLock<HashMap<String, JobHandler>>>,
}

impl JobRegistry {
    /// Create a new empty job registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job type with its handler function.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use payrun::jobs::JobRegistry;
    /// # use payrun::payout::SettleFeeJob;
    /// # use payrun::traits::job::Job;
    /// # async fn wire(registry: &JobRegistry) {
    /// registry
    ///     .register("payout.settle_fee", |data, ctx| {
    ///         Box::pin(async move {
    ///             let job: SettleFeeJob = serde_json::from_value(data.payload)
    ///                 .map_err(|e| payrun::PayrunError::internal(e.to_string()))?;
    ///             job.execute(&ctx).await
    ///         })
    ///     })
    ///     .await;
    /// # }
    /// ```
    pub async fn register<F>(&self, job_type: &str, handler: F)
    where
        F: Fn(JobData, Arc<AppContext>) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        let handler: JobHandler = Arc::new(handler);
        let mut handlers = self.handlers.write().await;
        handlers.insert(job_type.to_string(), handler);
    }

    /// Execute a job by looking up its handler.
    pub async fn execute(&self, data: JobData, ctx: Arc<AppContext>) -> Result<()> {
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&data.job_type).cloned().ok_or_else(|| {
                PayrunError::internal(format!(
                    "no handler registered for job type: {}",
                    data.job_type
                ))
            })?
        };

        handler(data, ctx).await
    }

    /// Check if a job type is registered.
    pub async fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.read().await.contains_key(job_type)
    }

    /// All registered job types.
    pub async fn registered_types(&self) -> Vec<String> {
        self.handlers.read().await.keys().cloned().collect()
    }
}

//! In-memory job queue implementation.
//!
//! Stores jobs in process memory. Suitable for development, testing, and
//! single-instance deployments; jobs do not survive a restart. The
//! delivery contract is the same at-least-once one a broker-backed
//! implementation provides, so handlers written against this queue stay
//! correct in production.

use crate::error::Result;
use crate::traits::job::{Job, JobData, JobQueue};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// How often the promoter task moves due scheduled jobs into the runnable
/// queue. Counter contention retries are scheduled tens of milliseconds
/// out, so the grain must stay well under that.
const PROMOTER_TICK_MS: u64 = 20;

/// Maximum number of dead jobs retained for inspection.
const DEFAULT_MAX_DEAD_SIZE: usize = 10_000;

/// In-memory job queue.
///
/// Failed jobs are re-scheduled with exponential backoff up to
/// `max_retries` attempts, then parked in a bounded dead list.
///
/// Call [`shutdown`](Self::shutdown) before dropping to stop the
/// background promoter task cleanly.
#[derive(Clone)]
pub struct InMemoryJobQueue {
    runnable: Arc<Mutex<VecDeque<JobData>>>,
    processing: Arc<Mutex<HashMap<String, JobData>>>,
    scheduled: Arc<Mutex<BTreeMap<DateTime<Utc>, Vec<JobData>>>>,
    /// Jobs that exhausted their retries, oldest first.
    dead: Arc<Mutex<VecDeque<JobData>>>,
    max_retries: u32,
    retry_backoff_ms: u64,
    max_dead_size: usize,
    shutdown: Arc<AtomicBool>,
    promoter_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl InMemoryJobQueue {
    /// Create a new in-memory job queue.
    pub fn new(max_retries: u32, retry_backoff_ms: u64) -> Self {
        let runnable = Arc::new(Mutex::new(VecDeque::new()));
        let scheduled = Arc::new(Mutex::new(BTreeMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = Self::start_promoter_task(scheduled.clone(), runnable.clone(), shutdown.clone());

        Self {
            runnable,
            processing: Arc::new(Mutex::new(HashMap::new())),
            scheduled,
            dead: Arc::new(Mutex::new(VecDeque::new())),
            max_retries,
            retry_backoff_ms,
            max_dead_size: DEFAULT_MAX_DEAD_SIZE,
            shutdown,
            promoter_handle: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Stop the background promoter task.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);

        let mut handle_guard = self.promoter_handle.lock().await;
        if let Some(handle) = handle_guard.take() {
            match tokio::time::timeout(tokio::time::Duration::from_secs(5), handle).await {
                Ok(_) => tracing::debug!("job queue promoter stopped cleanly"),
                Err(_) => tracing::warn!("job queue promoter did not stop within timeout"),
            }
        }
    }

    /// Jobs that exhausted their retries, for inspection in tests and ops
    /// tooling.
    pub async fn dead_jobs(&self) -> Vec<JobData> {
        self.dead.lock().await.iter().cloned().collect()
    }

    /// Number of jobs not yet finished: runnable, in flight, or awaiting
    /// their scheduled time. Zero means the queue has drained.
    pub async fn depth(&self) -> usize {
        let runnable = self.runnable.lock().await.len();
        let processing = self.processing.lock().await.len();
        let scheduled: usize = self.scheduled.lock().await.values().map(Vec::len).sum();
        runnable + processing + scheduled
    }

    fn start_promoter_task(
        scheduled: Arc<Mutex<BTreeMap<DateTime<Utc>, Vec<JobData>>>>,
        runnable: Arc<Mutex<VecDeque<JobData>>>,
        shutdown: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick =
                tokio::time::interval(tokio::time::Duration::from_millis(PROMOTER_TICK_MS));

            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                tick.tick().await;

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                let now = Utc::now();
                let mut scheduled_guard = scheduled.lock().await;
                let mut runnable_guard = runnable.lock().await;

                let due: Vec<DateTime<Utc>> = scheduled_guard
                    .iter()
                    .take_while(|(time, _)| **time <= now)
                    .map(|(time, _)| *time)
                    .collect();

                for key in due {
                    if let Some(jobs) = scheduled_guard.remove(&key) {
                        runnable_guard.extend(jobs);
                    }
                }
            }
        })
    }

    async fn push_scheduled(&self, data: JobData, run_at: DateTime<Utc>) {
        let mut scheduled = self.scheduled.lock().await;
        scheduled.entry(run_at).or_default().push(data);
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: &dyn Job) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();
        let data = JobData::new(job_id.clone(), job.job_type().to_string(), job.serialize()?);

        self.runnable.lock().await.push_back(data);
        tracing::debug!(job_id = %job_id, job_type = %job.job_type(), "job enqueued");
        Ok(job_id)
    }

    async fn schedule(&self, job: &dyn Job, run_at: DateTime<Utc>) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();
        let data = JobData::scheduled(
            job_id.clone(),
            job.job_type().to_string(),
            job.serialize()?,
            run_at,
        );

        self.push_scheduled(data, run_at).await;
        tracing::debug!(job_id = %job_id, job_type = %job.job_type(), run_at = %run_at, "job scheduled");
        Ok(job_id)
    }

    async fn dequeue(&self) -> Result<Option<JobData>> {
        let mut runnable = self.runnable.lock().await;
        let Some(data) = runnable.pop_front() else {
            return Ok(None);
        };
        drop(runnable);

        self.processing
            .lock()
            .await
            .insert(data.job_id.clone(), data.clone());
        Ok(Some(data))
    }

    async fn complete(&self, job_id: &str) -> Result<()> {
        self.processing.lock().await.remove(job_id);
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: String) -> Result<()> {
        let Some(mut data) = self.processing.lock().await.remove(job_id) else {
            return Ok(());
        };

        data.attempts += 1;
        if data.attempts <= self.max_retries {
            // Exponential backoff: base * 2^(attempt - 1).
            let backoff_ms = self.retry_backoff_ms << (data.attempts - 1).min(16);
            let run_at = Utc::now() + Duration::milliseconds(backoff_ms as i64);
            tracing::debug!(
                job_id = %job_id,
                attempts = data.attempts,
                error = %error,
                "job failed, retrying with backoff"
            );
            self.push_scheduled(data, run_at).await;
        } else {
            tracing::warn!(
                job_id = %job_id,
                attempts = data.attempts,
                error = %error,
                "job exhausted retries"
            );
            let mut dead = self.dead.lock().await;
            if dead.len() >= self.max_dead_size {
                dead.pop_front();
            }
            dead.push_back(data);
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }
}

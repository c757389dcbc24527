//! Workers that poll the queue and execute jobs through the registry.

use crate::app::AppContext;
use crate::error::Result;
use crate::jobs::registry::JobRegistry;
use crate::traits::job::JobQueue;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

/// How long an idle worker waits before polling again.
const IDLE_POLL_MS: u64 = 50;

/// A single worker that processes jobs from a queue.
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    registry: Arc<JobRegistry>,
    ctx: Arc<AppContext>,
    worker_id: String,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(
        queue: Arc<dyn JobQueue>,
        registry: Arc<JobRegistry>,
        ctx: Arc<AppContext>,
        worker_id: String,
    ) -> (Self, mpsc::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                queue,
                registry,
                ctx,
                worker_id,
                shutdown_tx,
            },
            shutdown_rx,
        )
    }

    /// Run until shutdown is requested.
    ///
    /// A job that has started executing runs to completion before the
    /// worker exits; units mid-external-call are never abandoned.
    pub async fn start(self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(worker_id = %self.worker_id, "job worker started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(worker_id = %self.worker_id, "shutdown requested, finishing current job");
                    break;
                }
                result = self.process_next_job() => {
                    match result {
                        Ok(Some(_)) => {
                            // Processed a job; poll again immediately.
                        }
                        Ok(None) => {
                            tokio::select! {
                                _ = shutdown_rx.recv() => break,
                                _ = sleep(Duration::from_millis(IDLE_POLL_MS)) => {},
                            }
                        }
                        Err(e) => {
                            tracing::error!(worker_id = %self.worker_id, error = %e, "error processing job");
                            tokio::select! {
                                _ = shutdown_rx.recv() => break,
                                _ = sleep(Duration::from_secs(1)) => {},
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "job worker stopped");
    }

    /// Process the next available job, returning its id if one ran.
    async fn process_next_job(&self) -> Result<Option<String>> {
        let Some(job_data) = self.queue.dequeue().await? else {
            return Ok(None);
        };

        let job_id = job_data.job_id.clone();
        tracing::debug!(
            worker_id = %self.worker_id,
            job_id = %job_id,
            job_type = %job_data.job_type,
            "processing job"
        );

        match self.registry.execute(job_data, self.ctx.clone()).await {
            Ok(()) => {
                self.queue.complete(&job_id).await?;
                tracing::debug!(worker_id = %self.worker_id, job_id = %job_id, "job completed");
                Ok(Some(job_id))
            }
            Err(e) => {
                // The queue owns retry policy; the handler has already
                // classified fatal errors as Ok-after-logging.
                self.queue.fail(&job_id, e.to_string()).await?;
                tracing::warn!(worker_id = %self.worker_id, job_id = %job_id, error = %e, "job failed");
                Ok(Some(job_id))
            }
        }
    }

    /// Request shutdown of this worker.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Pool of workers processing jobs concurrently.
pub struct WorkerPool {
    workers: Vec<tokio::task::JoinHandle<()>>,
    shutdown_txs: Vec<mpsc::Sender<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers against the shared queue.
    pub fn new(
        queue: Arc<dyn JobQueue>,
        registry: Arc<JobRegistry>,
        ctx: Arc<AppContext>,
        worker_count: usize,
    ) -> Self {
        let mut workers = Vec::new();
        let mut shutdown_txs = Vec::new();

        for i in 0..worker_count {
            let worker_id = format!("worker-{}", i);
            let (worker, shutdown_rx) = JobWorker::new(
                queue.clone(),
                registry.clone(),
                ctx.clone(),
                worker_id,
            );
            shutdown_txs.push(worker.shutdown_tx.clone());
            workers.push(tokio::spawn(worker.start(shutdown_rx)));
        }

        Self {
            workers,
            shutdown_txs,
        }
    }

    /// Signal all workers to stop and wait for them to finish.
    pub async fn shutdown(self) {
        for tx in &self.shutdown_txs {
            let _ = tx.send(()).await;
        }
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

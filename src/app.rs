use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::counter::{CounterCache, ShardedCounter};
use crate::error::{PayrunError, Result};
use crate::ledger::TransferCreator;
use crate::payout::{PayoutOrchestrator, ReconciliationSweep, SettlementExecutor};
use crate::processor::PayoutProcessor;
use crate::traits::job::JobQueue;
use crate::traits::store::{CounterStore, LedgerStore};

/// Application context for dependency injection and shared state.
///
/// Holds the engine's collaborators (ledger store, counter store, job
/// queue, processor client) plus the process-wide counter cache, which
/// is constructed here once at startup. Workers receive an
/// `Arc<AppContext>` and jobs reach everything through it.
///
/// Unlike a general-purpose app container, every collaborator is
/// required: the builder refuses to produce a context with a missing
/// piece, so accessors return the dependency directly.
#[derive(Clone)]
pub struct AppContext {
    config: Config,
    ledger: Arc<dyn LedgerStore>,
    counter_store: Arc<dyn CounterStore>,
    jobs: Arc<dyn JobQueue>,
    processor: Arc<dyn PayoutProcessor>,
    counter_cache: CounterCache,
}

impl AppContext {
    /// Builder pattern for constructing an `AppContext`.
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    pub fn counter_store(&self) -> &Arc<dyn CounterStore> {
        &self.counter_store
    }

    pub fn jobs(&self) -> &Arc<dyn JobQueue> {
        &self.jobs
    }

    pub fn processor(&self) -> &Arc<dyn PayoutProcessor> {
        &self.processor
    }

    /// Handle on the sharded counter service.
    pub fn counters(&self) -> ShardedCounter {
        ShardedCounter::new(
            self.counter_store.clone(),
            self.counter_cache.clone(),
            self.jobs.clone(),
            self.config.counter.clone(),
        )
    }

    /// Handle on the transfer creator.
    pub fn creator(&self) -> TransferCreator {
        TransferCreator::new(self.ledger.clone(), &self.config.payout)
    }

    /// Handle on the payout orchestrator.
    pub fn orchestrator(&self) -> PayoutOrchestrator {
        PayoutOrchestrator::new(self.ledger.clone(), self.jobs.clone())
    }

    /// Handle on the settlement executor.
    pub fn executor(&self) -> SettlementExecutor {
        SettlementExecutor::new(
            self.ledger.clone(),
            self.processor.clone(),
            &self.config.payout,
        )
    }

    /// Handle on the reconciliation sweep.
    pub fn sweep(&self) -> ReconciliationSweep {
        ReconciliationSweep::new(
            self.ledger.clone(),
            self.executor(),
            chrono::Duration::seconds(self.config.payout.sweep_grace_secs as i64),
        )
    }
}

/// Builder for [`AppContext`].
#[derive(Default)]
pub struct AppContextBuilder {
    config: Option<Config>,
    ledger: Option<Arc<dyn LedgerStore>>,
    counter_store: Option<Arc<dyn CounterStore>>,
    jobs: Option<Arc<dyn JobQueue>>,
    processor: Option<Arc<dyn PayoutProcessor>>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration to use; defaults to [`Config::default`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn ledger(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger = Some(store);
        self
    }

    pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counter_store = Some(store);
        self
    }

    pub fn jobs(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.jobs = Some(queue);
        self
    }

    pub fn processor(mut self, processor: Arc<dyn PayoutProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Build the context, constructing the counter cache from config.
    pub fn build(self) -> Result<AppContext> {
        let config = self.config.unwrap_or_default();
        let counter_cache = CounterCache::new(
            config.counter.cache_capacity,
            Duration::from_secs(config.counter.cache_ttl_secs),
        );

        Ok(AppContext {
            counter_cache,
            ledger: self
                .ledger
                .ok_or_else(|| PayrunError::internal("AppContext requires a ledger store"))?,
            counter_store: self
                .counter_store
                .ok_or_else(|| PayrunError::internal("AppContext requires a counter store"))?,
            jobs: self
                .jobs
                .ok_or_else(|| PayrunError::internal("AppContext requires a job queue"))?,
            processor: self
                .processor
                .ok_or_else(|| PayrunError::internal("AppContext requires a processor client"))?,
            config,
        })
    }
}

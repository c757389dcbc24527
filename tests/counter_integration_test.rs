//! Sharded counter tests: additivity under concurrent contention, shard
//! growth, membership, and tenant isolation.

use async_trait::async_trait;
use payrun::counter::{Shard, ShardConfig, register_counter_jobs};
use payrun::jobs::{InMemoryJobQueue, JobRegistry, WorkerPool};
use payrun::processor::MockProcessor;
use payrun::store::{InMemoryCounterStore, InMemoryLedgerStore};
use payrun::traits::store::{CounterStore, Versioned};
use payrun::{AppContext, Config, Namespace, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration as TokioDuration, sleep, timeout};

struct Harness {
    ns: Namespace,
    store: Arc<InMemoryCounterStore>,
    queue: Arc<InMemoryJobQueue>,
    ctx: Arc<AppContext>,
}

impl Harness {
    async fn new(default_shards: u32) -> Self {
        let mut config = Config::default();
        config.counter.default_shards = default_shards;

        let store = Arc::new(InMemoryCounterStore::new());
        let queue = Arc::new(InMemoryJobQueue::new(
            config.jobs.max_retries,
            config.jobs.retry_backoff_ms,
        ));
        let ctx = Arc::new(
            AppContext::builder()
                .config(config)
                .ledger(Arc::new(InMemoryLedgerStore::new()))
                .counter_store(store.clone())
                .jobs(queue.clone())
                .processor(Arc::new(MockProcessor::new()))
                .build()
                .unwrap(),
        );

        Self {
            ns: Namespace::new("tenant-a").unwrap(),
            store,
            queue,
            ctx,
        }
    }

    async fn start_workers(&self, count: usize) -> WorkerPool {
        let registry = Arc::new(JobRegistry::new());
        register_counter_jobs(&registry).await;
        WorkerPool::new(self.queue.clone(), registry, self.ctx.clone(), count)
    }

    /// Wait until the queue has fully drained, including jittered
    /// contention retries (stable across two reads).
    async fn drain(&self) {
        timeout(TokioDuration::from_secs(15), async {
            loop {
                if self.queue.depth().await == 0 {
                    sleep(TokioDuration::from_millis(50)).await;
                    if self.queue.depth().await == 0 {
                        return;
                    }
                }
                sleep(TokioDuration::from_millis(20)).await;
            }
        })
        .await
        .expect("counter jobs did not drain in time");
    }
}

#[tokio::test]
async fn concurrent_increments_are_additive() {
    // One starting shard maximizes contention, exercising the
    // grow-and-reschedule path rather than just the happy path.
    let h = Harness::new(1).await;
    let pool = h.start_workers(4).await;
    let counters = h.ctx.counters();

    let deltas: Vec<i64> = (1..=50).collect();
    let expected: i64 = deltas.iter().sum();
    for delta in &deltas {
        counters
            .increment_by(&h.ns, "orders.revenue", "order", *delta)
            .await
            .unwrap();
    }

    h.drain().await;

    assert_eq!(
        counters.count(&h.ns, "orders.revenue").await.unwrap(),
        expected
    );
    assert!(h.queue.dead_jobs().await.is_empty(), "no increment may be lost");

    pool.shutdown().await;
    h.queue.shutdown().await;
}

/// Counter store that force-fails the first `conflicts` shard writes,
/// making the contention path deterministic instead of timing-dependent.
struct ContendedCounterStore {
    inner: InMemoryCounterStore,
    conflicts: AtomicU32,
}

impl ContendedCounterStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryCounterStore::new(),
            conflicts: AtomicU32::new(conflicts),
        }
    }
}

#[async_trait]
impl CounterStore for ContendedCounterStore {
    async fn get_config(
        &self,
        ns: &Namespace,
        name: &str,
    ) -> Result<Option<Versioned<ShardConfig>>> {
        self.inner.get_config(ns, name).await
    }

    async fn put_config(
        &self,
        ns: &Namespace,
        name: &str,
        config: &ShardConfig,
        expected_version: Option<u64>,
    ) -> Result<bool> {
        self.inner.put_config(ns, name, config, expected_version).await
    }

    async fn get_shard(
        &self,
        ns: &Namespace,
        name: &str,
        index: u32,
    ) -> Result<Option<Versioned<Shard>>> {
        self.inner.get_shard(ns, name, index).await
    }

    async fn put_shard(
        &self,
        ns: &Namespace,
        shard: &Shard,
        expected_version: Option<u64>,
    ) -> Result<bool> {
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .conflicts
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Ok(false);
        }
        self.inner.put_shard(ns, shard, expected_version).await
    }

    async fn shards(&self, ns: &Namespace, name: &str) -> Result<Vec<Shard>> {
        self.inner.shards(ns, name).await
    }
}

#[tokio::test]
async fn contention_grows_the_shard_count_and_loses_nothing() {
    let mut config = Config::default();
    config.counter.default_shards = 1;

    let store = Arc::new(ContendedCounterStore::new(3));
    let queue = Arc::new(InMemoryJobQueue::new(
        config.jobs.max_retries,
        config.jobs.retry_backoff_ms,
    ));
    let ctx = Arc::new(
        AppContext::builder()
            .config(config)
            .ledger(Arc::new(InMemoryLedgerStore::new()))
            .counter_store(store.clone())
            .jobs(queue.clone())
            .processor(Arc::new(MockProcessor::new()))
            .build()
            .unwrap(),
    );
    let ns = Namespace::new("tenant-a").unwrap();

    let registry = Arc::new(JobRegistry::new());
    register_counter_jobs(&registry).await;
    let pool = WorkerPool::new(queue.clone(), registry, ctx.clone(), 2);

    // One increment, three forced conflicts: the job must grow the shard
    // count once per conflict and still land the delta exactly once.
    let counters = ctx.counters();
    counters.increment_by(&ns, "orders.count", "order", 7).await.unwrap();

    timeout(TokioDuration::from_secs(10), async {
        loop {
            if queue.depth().await == 0 {
                sleep(TokioDuration::from_millis(50)).await;
                if queue.depth().await == 0 {
                    return;
                }
            }
            sleep(TokioDuration::from_millis(20)).await;
        }
    })
    .await
    .expect("contended increment did not drain");

    assert_eq!(counters.count(&ns, "orders.count").await.unwrap(), 7);

    // 1 -> 2 -> 3 -> 4, one growth per conflict.
    let shard_config = store.get_config(&ns, "orders.count").await.unwrap().unwrap();
    assert_eq!(shard_config.record.shards, 4);

    pool.shutdown().await;
    queue.shutdown().await;
}

#[tokio::test]
async fn increase_shards_is_monotonic() {
    let h = Harness::new(3).await;
    let counters = h.ctx.counters();

    counters.increase_shards(&h.ns, "orders.count", 8).await.unwrap();
    let config = h.store.get_config(&h.ns, "orders.count").await.unwrap().unwrap();
    assert_eq!(config.record.shards, 8);

    // A lower target never shrinks the counter.
    counters.increase_shards(&h.ns, "orders.count", 3).await.unwrap();
    let config = h.store.get_config(&h.ns, "orders.count").await.unwrap().unwrap();
    assert_eq!(config.record.shards, 8);
}

#[tokio::test]
async fn members_deduplicate_across_shards() {
    let h = Harness::new(4).await;
    let pool = h.start_workers(2).await;
    let counters = h.ctx.counters();

    // The same customer seen many times lands on random shards; the
    // union still reports it once.
    for _ in 0..10 {
        counters
            .add_member(&h.ns, "customers.seen", "checkout", "cust_1")
            .await
            .unwrap();
    }
    counters
        .add_member(&h.ns, "customers.seen", "checkout", "cust_2")
        .await
        .unwrap();
    h.drain().await;

    let mut members = counters.members(&h.ns, "customers.seen").await.unwrap();
    members.sort();
    assert_eq!(members, vec!["cust_1".to_string(), "cust_2".to_string()]);

    assert!(
        counters
            .member_exists(&h.ns, "customers.seen", "cust_1")
            .await
            .unwrap()
    );
    assert!(
        !counters
            .member_exists(&h.ns, "customers.seen", "cust_3")
            .await
            .unwrap()
    );

    // add_member_once skips values already recorded.
    counters
        .add_member_once(&h.ns, "customers.seen", "checkout", "cust_1")
        .await
        .unwrap();
    h.drain().await;
    assert_eq!(counters.members(&h.ns, "customers.seen").await.unwrap().len(), 2);

    pool.shutdown().await;
    h.queue.shutdown().await;
}

#[tokio::test]
async fn counters_are_tenant_isolated() {
    let h = Harness::new(2).await;
    let pool = h.start_workers(2).await;
    let counters = h.ctx.counters();
    let other = Namespace::new("tenant-b").unwrap();

    counters.increment_by(&h.ns, "orders.count", "order", 5).await.unwrap();
    counters.increment_by(&other, "orders.count", "order", 9).await.unwrap();
    h.drain().await;

    assert_eq!(counters.count(&h.ns, "orders.count").await.unwrap(), 5);
    assert_eq!(counters.count(&other, "orders.count").await.unwrap(), 9);

    pool.shutdown().await;
    h.queue.shutdown().await;
}

#[tokio::test]
async fn count_reads_through_the_cache() {
    let h = Harness::new(2).await;
    let pool = h.start_workers(2).await;
    let counters = h.ctx.counters();

    counters.increment_by(&h.ns, "orders.count", "order", 4).await.unwrap();
    h.drain().await;
    assert_eq!(counters.count(&h.ns, "orders.count").await.unwrap(), 4);

    // An increment applied while the cache entry is warm keeps the
    // cached total in sync instead of invalidating it.
    counters.increment_by(&h.ns, "orders.count", "order", 6).await.unwrap();
    h.drain().await;
    assert_eq!(counters.count(&h.ns, "orders.count").await.unwrap(), 10);

    pool.shutdown().await;
    h.queue.shutdown().await;
}

//! End-to-end tests of the payout pipeline: orchestrator fan-out through
//! workers, settlement, and reconciliation, against in-memory stores and
//! the mock processor.

use payrun::jobs::{InMemoryJobQueue, JobRegistry, WorkerPool};
use payrun::ledger::{FeeStatus, PayeeKind, TransferStatus};
use payrun::payout::{Payee, PayoutSchedule, SettleFeeJob, register_payout_jobs};
use payrun::processor::MockProcessor;
use payrun::store::{InMemoryCounterStore, InMemoryLedgerStore};
use payrun::traits::job::Job;
use payrun::traits::store::LedgerStore;
use payrun::{AppContext, Config, Namespace};
use payrun::ledger::Fee;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::{Duration as TokioDuration, sleep, timeout};

struct Harness {
    ns: Namespace,
    store: Arc<InMemoryLedgerStore>,
    queue: Arc<InMemoryJobQueue>,
    processor: Arc<MockProcessor>,
    ctx: Arc<AppContext>,
}

impl Harness {
    async fn new() -> Self {
        let mut config = Config::default();
        // Sweeps in tests run against freshly written transfers.
        config.payout.sweep_grace_secs = 0;

        let store = Arc::new(InMemoryLedgerStore::new());
        let queue = Arc::new(InMemoryJobQueue::new(
            config.jobs.max_retries,
            config.jobs.retry_backoff_ms,
        ));
        let processor = Arc::new(MockProcessor::new());
        let ctx = Arc::new(
            AppContext::builder()
                .config(config)
                .ledger(store.clone())
                .counter_store(Arc::new(InMemoryCounterStore::new()))
                .jobs(queue.clone())
                .processor(processor.clone())
                .build()
                .unwrap(),
        );

        Self {
            ns: Namespace::new("tenant-a").unwrap(),
            store,
            queue,
            processor,
            ctx,
        }
    }

    /// Seed an affiliate payee and one fee old enough to be eligible.
    async fn seed_eligible_fee(&self, fee_id: &str) {
        self.store
            .put_payee(
                &self.ns,
                &Payee::affiliate("aff_1", "acct_aff_1", PayoutSchedule::every_days(7)),
            )
            .await
            .unwrap();

        let mut fee = Fee::payable(
            fee_id,
            self.ns.clone(),
            PayeeKind::Affiliate,
            Some("aff_1".into()),
            "usd",
            700,
        );
        fee.created_at = Utc::now() - Duration::days(10);
        self.store.put_fee(&self.ns, &fee).await.unwrap();
    }

    async fn registry(&self) -> Arc<JobRegistry> {
        let registry = Arc::new(JobRegistry::new());
        register_payout_jobs(&registry).await;
        registry
    }

    /// Wait until the queue has fully drained (stable across two reads,
    /// since a retrying job briefly hops between internal queues).
    async fn drain(&self) {
        timeout(TokioDuration::from_secs(10), async {
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
        .expect("queue did not drain in time");
    }

    async fn fee_status(&self, fee_id: &str) -> (FeeStatus, Option<String>) {
        let fee = self.store.get_fee(&self.ns, fee_id).await.unwrap().unwrap();
        (fee.record.status, fee.record.transfer_id)
    }

    async fn transfer_status(&self, transfer_id: &str) -> TransferStatus {
        self.store
            .get_transfer(&self.ns, transfer_id)
            .await
            .unwrap()
            .unwrap()
            .record
            .status
    }
}

#[tokio::test]
async fn end_to_end_settlement_is_exactly_once() {
    let h = Harness::new().await;
    h.seed_eligible_fee("fee_1").await;

    let registry = h.registry().await;
    let pool = WorkerPool::new(h.queue.clone(), registry, h.ctx.clone(), 2);

    let enqueued = h.ctx.orchestrator().run(&h.ns, Utc::now()).await.unwrap();
    assert_eq!(enqueued, 1);

    h.drain().await;

    // Fee claimed, transfer paid, exactly one processor execution.
    let (status, transfer_id) = h.fee_status("fee_1").await;
    assert_eq!(status, FeeStatus::Transferred);
    let transfer_id = transfer_id.expect("claimed fee must carry its transfer id");
    assert_eq!(h.transfer_status(&transfer_id).await, TransferStatus::Paid);
    assert_eq!(h.processor.executions(), 1);

    // Every processor request used the transfer's own id as key.
    for request in h.processor.requests() {
        assert_eq!(request.idempotency_key, transfer_id);
        assert_eq!(request.amount, 700);
        assert_eq!(request.currency, "usd");
    }

    // Re-running the orchestrator selects nothing: the fee is claimed.
    let enqueued = h.ctx.orchestrator().run(&h.ns, Utc::now()).await.unwrap();
    assert_eq!(enqueued, 0);

    // Re-running the settled unit performs zero additional external calls.
    h.ctx.executor().settle(&h.ns, "fee_1").await.unwrap();
    assert_eq!(h.processor.executions(), 1);

    pool.shutdown().await;
    h.queue.shutdown().await;
}

#[tokio::test]
async fn concurrent_claims_converge_on_one_transfer() {
    let h = Harness::new().await;
    h.seed_eligible_fee("fee_1").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let creator = h.ctx.creator();
        let ns = h.ns.clone();
        handles.push(tokio::spawn(async move {
            creator.create_transfer(&ns, "fee_1").await
        }));
    }

    let mut transfer_ids = Vec::new();
    let mut fresh_claims = 0;
    for handle in handles {
        let (transfer, already_done) = handle.await.unwrap().unwrap();
        if !already_done {
            fresh_claims += 1;
        }
        transfer_ids.push(transfer.id);
    }

    assert_eq!(fresh_claims, 1, "exactly one claim must win");
    transfer_ids.dedup();
    assert_eq!(transfer_ids.len(), 1, "all calls must see the same transfer");
    h.queue.shutdown().await;
}

#[tokio::test]
async fn crash_between_commit_and_external_call_never_double_pays() {
    let h = Harness::new().await;
    h.seed_eligible_fee("fee_1").await;

    // "Crash": the claim commits, then the process dies before the
    // external call.
    let (transfer, already_done) = h
        .ctx
        .creator()
        .create_transfer(&h.ns, "fee_1")
        .await
        .unwrap();
    assert!(!already_done);
    assert_eq!(h.processor.executions(), 0);
    assert_eq!(h.transfer_status(&transfer.id).await, TransferStatus::Pending);

    // Re-running the whole unit sees already_done and stays quiet.
    h.ctx.executor().settle(&h.ns, "fee_1").await.unwrap();
    assert_eq!(h.processor.executions(), 0);

    // Only the sweep moves the money, under the original idempotency key.
    let attempted = h.ctx.sweep().run(&h.ns, Utc::now() + Duration::seconds(1)).await.unwrap();
    assert_eq!(attempted, 1);
    assert_eq!(h.transfer_status(&transfer.id).await, TransferStatus::Paid);
    assert_eq!(h.processor.executions(), 1);
    for request in h.processor.requests() {
        assert_eq!(request.idempotency_key, transfer.id);
    }

    // Further unit re-runs and sweeps change nothing.
    h.ctx.executor().settle(&h.ns, "fee_1").await.unwrap();
    h.ctx.sweep().run(&h.ns, Utc::now() + Duration::seconds(1)).await.unwrap();
    assert_eq!(h.processor.executions(), 1);
    h.queue.shutdown().await;
}

#[tokio::test]
async fn disputed_fee_never_produces_a_transfer() {
    let h = Harness::new().await;
    h.seed_eligible_fee("fee_1").await;

    // The dispute lands after the fee became eligible.
    let mut fee = h
        .store
        .get_fee(&h.ns, "fee_1")
        .await
        .unwrap()
        .unwrap()
        .record;
    fee.status = FeeStatus::Disputed;
    h.store.put_fee(&h.ns, &fee).await.unwrap();

    // The orchestrator no longer selects it.
    let enqueued = h.ctx.orchestrator().run(&h.ns, Utc::now()).await.unwrap();
    assert_eq!(enqueued, 0);

    // Even a unit already in flight refuses to settle it.
    let err = h.ctx.executor().settle(&h.ns, "fee_1").await.unwrap_err();
    assert!(matches!(err, payrun::PayrunError::DisputedFee { .. }));

    // The queued job swallows the dispute as expected business state.
    let job = SettleFeeJob {
        namespace: h.ns.clone(),
        payee_kind: PayeeKind::Affiliate,
        fee_id: "fee_1".to_string(),
    };
    job.execute(&h.ctx).await.unwrap();

    let (status, transfer_id) = h.fee_status("fee_1").await;
    assert_eq!(status, FeeStatus::Disputed);
    assert!(transfer_id.is_none());
    assert_eq!(h.processor.executions(), 0);
    h.queue.shutdown().await;
}

#[tokio::test]
async fn rejection_parks_transfer_in_error_until_sweep_resolves_it() {
    let h = Harness::new().await;
    h.seed_eligible_fee("fee_1").await;
    h.processor.reject_next("account_closed", "destination closed");

    h.ctx.executor().settle(&h.ns, "fee_1").await.unwrap();

    let (_, transfer_id) = h.fee_status("fee_1").await;
    let transfer_id = transfer_id.unwrap();
    let stored = h
        .store
        .get_transfer(&h.ns, &transfer_id)
        .await
        .unwrap()
        .unwrap()
        .record;
    assert_eq!(stored.status, TransferStatus::Error);
    assert_eq!(stored.failure_code.as_deref(), Some("account_closed"));

    // The fee is not rolled back; the sweep owns recovery.
    let (status, _) = h.fee_status("fee_1").await;
    assert_eq!(status, FeeStatus::Transferred);

    // Destination fixed out of band; the sweep retries the same key.
    let attempted = h.ctx.sweep().run(&h.ns, Utc::now() + Duration::seconds(1)).await.unwrap();
    assert_eq!(attempted, 1);
    assert_eq!(h.transfer_status(&transfer_id).await, TransferStatus::Paid);
    h.queue.shutdown().await;
}

#[tokio::test]
async fn unknown_outcome_leaves_transfer_pending_for_sweep() {
    let h = Harness::new().await;
    h.seed_eligible_fee("fee_1").await;
    h.processor.unavailable_next("connection reset");

    h.ctx.executor().settle(&h.ns, "fee_1").await.unwrap();

    let (_, transfer_id) = h.fee_status("fee_1").await;
    let transfer_id = transfer_id.unwrap();
    assert_eq!(h.transfer_status(&transfer_id).await, TransferStatus::Pending);
    assert_eq!(h.processor.executions(), 0);

    let attempted = h.ctx.sweep().run(&h.ns, Utc::now() + Duration::seconds(1)).await.unwrap();
    assert_eq!(attempted, 1);
    assert_eq!(h.transfer_status(&transfer_id).await, TransferStatus::Paid);
    assert_eq!(h.processor.executions(), 1);
    h.queue.shutdown().await;
}

#[tokio::test]
async fn tenants_are_settled_in_isolation() {
    let h = Harness::new().await;
    h.seed_eligible_fee("fee_1").await;

    // Same payee id and fee shape under another tenant.
    let other = Namespace::new("tenant-b").unwrap();
    h.store
        .put_payee(
            &other,
            &Payee::affiliate("aff_1", "acct_other", PayoutSchedule::every_days(7)),
        )
        .await
        .unwrap();
    let mut fee = Fee::payable(
        "fee_1",
        other.clone(),
        PayeeKind::Affiliate,
        Some("aff_1".into()),
        "usd",
        300,
    );
    fee.created_at = Utc::now() - Duration::days(10);
    h.store.put_fee(&other, &fee).await.unwrap();

    // Settling tenant A's fee touches nothing in tenant B.
    h.ctx.executor().settle(&h.ns, "fee_1").await.unwrap();
    let (status_b, transfer_b) = {
        let fee = h.store.get_fee(&other, "fee_1").await.unwrap().unwrap();
        (fee.record.status, fee.record.transfer_id)
    };
    assert_eq!(status_b, FeeStatus::Payable);
    assert!(transfer_b.is_none());

    // And the paid amount was A's 700, not B's 300.
    assert_eq!(h.processor.requests()[0].amount, 700);
    h.queue.shutdown().await;
}

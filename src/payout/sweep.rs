//! The reconciliation sweep: recovery for ambiguous transfers.

use crate::error::Result;
use crate::payout::executor::SettlementExecutor;
use crate::tenant::Namespace;
use crate::traits::store::LedgerStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Periodic recovery pass over transfers stuck in an unresolved state.
///
/// A transfer is unresolved when its local commit succeeded but the
/// external call's outcome is unknown (`Pending`) or was an explicit
/// rejection awaiting ops (`Error`). The sweep re-drives each through the
/// processor using the transfer's own id as idempotency key; processors
/// treat a repeated key as "return the prior result", so the retry can
/// never double-pay. This is the only path that resolves a fee that is
/// `Transferred` but whose money never moved.
pub struct ReconciliationSweep {
    store: Arc<dyn LedgerStore>,
    executor: SettlementExecutor,
    grace: Duration,
}

impl ReconciliationSweep {
    /// `grace` is how long a transfer may sit unresolved before the
    /// sweep touches it, leaving room for the in-flight executor that
    /// created it to finish.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        executor: SettlementExecutor,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            executor,
            grace,
        }
    }

    /// Retry every unresolved transfer of `ns` older than the grace
    /// window. Individual failures are logged and skipped; one stuck
    /// transfer never blocks the rest. Returns the number of transfers
    /// attempted.
    pub async fn run(&self, ns: &Namespace, now: DateTime<Utc>) -> Result<usize> {
        let stuck = self
            .store
            .unresolved_transfers(ns, now - self.grace)
            .await?;

        if stuck.is_empty() {
            return Ok(0);
        }

        tracing::info!(namespace = %ns, count = stuck.len(), "reconciling unresolved transfers");

        let mut attempted = 0;
        for transfer in &stuck {
            attempted += 1;
            if let Err(e) = self
                .executor
                .execute_transfer(ns, &transfer.record.id)
                .await
            {
                tracing::warn!(
                    namespace = %ns,
                    transfer_id = %transfer.record.id,
                    error = %e,
                    "sweep retry failed; will try again next pass"
                );
            }
        }

        Ok(attempted)
    }
}

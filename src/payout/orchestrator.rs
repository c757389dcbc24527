//! The payout orchestrator: selects eligible fees and fans them out.

use crate::error::Result;
use crate::payout::jobs::SettleFeeJob;
use crate::tenant::Namespace;
use crate::traits::job::JobQueue;
use crate::traits::store::LedgerStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Periodic selector that enqueues one settlement unit per eligible fee.
///
/// Holds no state of its own and records nothing: re-running it only
/// re-enqueues fees still in `Payable` status, and redelivered units are
/// absorbed by the transfer creator's idempotent claim. Callers invoke
/// [`run`](Self::run) once per tenant per scheduling tick.
pub struct PayoutOrchestrator {
    store: Arc<dyn LedgerStore>,
    queue: Arc<dyn JobQueue>,
}

impl PayoutOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Select and enqueue all fees of `ns` eligible at `now`.
    ///
    /// Enqueuing never blocks on the outcome of a unit, and one payee's
    /// enqueue failure doesn't stop the rest of the fan-out. Returns the
    /// number of units enqueued.
    pub async fn run(&self, ns: &Namespace, now: DateTime<Utc>) -> Result<usize> {
        let payees = self.store.list_payees(ns).await?;
        let mut enqueued = 0;

        for payee in payees {
            let cutoff = payee.schedule.cutoff(now);
            let fees = self
                .store
                .payable_fees(ns, payee.kind, payee.id.as_deref(), cutoff)
                .await?;

            for fee in fees {
                let job = SettleFeeJob {
                    namespace: ns.clone(),
                    payee_kind: payee.kind,
                    fee_id: fee.id.clone(),
                };
                match self.queue.enqueue(&job).await {
                    Ok(_) => enqueued += 1,
                    Err(e) => {
                        tracing::warn!(
                            namespace = %ns,
                            fee_id = %fee.id,
                            error = %e,
                            "failed to enqueue settlement unit"
                        );
                    }
                }
            }
        }

        tracing::info!(namespace = %ns, enqueued, "payout fan-out complete");
        Ok(enqueued)
    }
}

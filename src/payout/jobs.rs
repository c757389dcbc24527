//! The settlement work item.
//!
//! One queued unit per fee. Delivery is at-least-once, so the handler
//! leans on the transfer creator's idempotent claim: a redelivered unit
//! finds the fee already claimed and performs zero external calls.

use crate::app::AppContext;
use crate::error::{PayrunError, Result};
use crate::jobs::JobRegistry;
use crate::ledger::PayeeKind;
use crate::tenant::Namespace;
use crate::traits::job::Job;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const SETTLE_FEE_JOB: &str = "payout.settle_fee";

/// Settle one fee: claim it locally, then move the money.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleFeeJob {
    pub namespace: Namespace,
    pub payee_kind: PayeeKind,
    pub fee_id: String,
}

#[async_trait]
impl Job for SettleFeeJob {
    fn job_type(&self) -> &str {
        SETTLE_FEE_JOB
    }

    fn serialize(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| PayrunError::internal(e.to_string()))
    }

    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let executor = ctx.executor();
        match executor.settle(&self.namespace, &self.fee_id).await {
            Ok(()) => Ok(()),
            // Expected business state: the dispute handler flipped the
            // fee after selection. The unit is done; the orchestrator
            // naturally skips the fee while it stays disputed.
            Err(PayrunError::DisputedFee { fee_id }) => {
                tracing::info!(
                    namespace = %self.namespace,
                    fee_id = %fee_id,
                    "fee disputed; settlement blocked"
                );
                Ok(())
            }
            // Data-integrity failures can't be fixed by retrying the
            // unit: log and abandon.
            Err(e) if e.is_fatal_for_unit() => {
                tracing::error!(
                    namespace = %self.namespace,
                    fee_id = %self.fee_id,
                    error = %e,
                    "settlement unit abandoned"
                );
                Ok(())
            }
            // Everything else (claim contention, store trouble) is
            // transient; let the queue retry with backoff.
            Err(e) => Err(e),
        }
    }
}

/// Register payout job handlers with the registry.
pub async fn register_payout_jobs(registry: &JobRegistry) {
    registry
        .register(SETTLE_FEE_JOB, |data, ctx| {
            Box::pin(async move {
                let job: SettleFeeJob = serde_json::from_value(data.payload)
                    .map_err(|e| PayrunError::internal(format!("bad settle payload: {}", e)))?;
                job.execute(&ctx).await
            })
        })
        .await;
}

//! The transfer creator: idempotent claim of a fee for payout.

use crate::config::PayoutConfig;
use crate::error::{PayrunError, Result};
use crate::ledger::fee::FeeStatus;
use crate::ledger::transfer::Transfer;
use crate::tenant::Namespace;
use crate::traits::store::LedgerStore;
use rand::Rng;
use std::sync::Arc;
use tokio::time::{Duration, sleep};

/// Creates transfer records, flipping their owning fee to `Transferred`
/// in the same atomic commit.
///
/// This is the only writer of the `Payable -> Transferred` transition.
/// The local commit always precedes any external money movement, and the
/// transfer id allocated here is the idempotency key every later
/// processor attempt reuses. That ordering is what makes a crash between
/// commit and external call recoverable without a duplicate payment.
#[derive(Clone)]
pub struct TransferCreator {
    store: Arc<dyn LedgerStore>,
    claim_attempts: u32,
    claim_jitter_ms: u64,
}

impl TransferCreator {
    pub fn new(store: Arc<dyn LedgerStore>, settings: &PayoutConfig) -> Self {
        Self {
            store,
            claim_attempts: settings.claim_attempts.max(1),
            claim_jitter_ms: settings.claim_jitter_ms.max(1),
        }
    }

    /// Claim `fee_id` for transfer.
    ///
    /// Returns the transfer and an `already_done` flag. `already_done`
    /// means the fee was claimed previously (by this call or an earlier
    /// crash-interrupted unit) and the existing transfer is returned; the
    /// caller must not treat it as freshly created.
    ///
    /// Concurrent calls for the same fee converge: exactly one commit
    /// wins, every other call returns the winner's transfer.
    pub async fn create_transfer(
        &self,
        ns: &Namespace,
        fee_id: &str,
    ) -> Result<(Transfer, bool)> {
        for attempt in 0..self.claim_attempts {
            if attempt > 0 {
                // Lost a race last round; pause briefly before re-reading
                // so the winner's commit is visible.
                let jitter = rand::thread_rng().gen_range(0..self.claim_jitter_ms);
                sleep(Duration::from_millis(jitter)).await;
            }

            let fee = self
                .store
                .get_fee(ns, fee_id)
                .await?
                .ok_or_else(|| {
                    // The fee id came out of a payable-fee query; a miss
                    // here is corrupt data, not a transient condition.
                    PayrunError::integrity(format!("fee {} not found in {}", fee_id, ns))
                })?;

            match fee.record.status {
                FeeStatus::Disputed => {
                    return Err(PayrunError::disputed(fee_id));
                }
                FeeStatus::Transferred => {
                    // Idempotent short-circuit: the claim already
                    // happened. Surface the existing transfer.
                    let transfer_id = fee.record.transfer_id.as_deref().ok_or_else(|| {
                        PayrunError::integrity(format!(
                            "fee {} is transferred but has no transfer id",
                            fee_id
                        ))
                    })?;
                    let transfer =
                        self.store
                            .get_transfer(ns, transfer_id)
                            .await?
                            .ok_or_else(|| {
                                PayrunError::integrity(format!(
                                    "fee {} points at missing transfer {}",
                                    fee_id, transfer_id
                                ))
                            })?;
                    return Ok((transfer.record, true));
                }
                FeeStatus::Pending | FeeStatus::Refunded => {
                    return Err(PayrunError::integrity(format!(
                        "fee {} has status {} and cannot be claimed",
                        fee_id,
                        fee.record.status.as_str()
                    )));
                }
                FeeStatus::Payable => {}
            }

            let payee = self
                .store
                .get_payee(
                    ns,
                    fee.record.payee_kind,
                    fee.record.payee_id.as_deref(),
                )
                .await?
                .ok_or_else(|| {
                    PayrunError::integrity(format!(
                        "no {} payee {:?} in {}",
                        fee.record.payee_kind.as_str(),
                        fee.record.payee_id,
                        ns
                    ))
                })?;

            let transfer = Transfer::for_fee(&fee.record, payee.destination.clone());

            let mut claimed = fee.record.clone();
            claimed.status = FeeStatus::Transferred;
            claimed.transfer_id = Some(transfer.id.clone());

            if self
                .store
                .commit_claim(ns, &claimed, fee.version, &transfer)
                .await?
            {
                tracing::info!(
                    namespace = %ns,
                    fee_id = %fee_id,
                    transfer_id = %transfer.id,
                    amount = transfer.amount,
                    currency = %transfer.currency,
                    "fee claimed for transfer"
                );
                return Ok((transfer, false));
            }

            tracing::debug!(namespace = %ns, fee_id = %fee_id, attempt, "claim lost a concurrent write, retrying");
        }

        Err(PayrunError::conflict(format!(
            "claim of fee {} kept losing concurrent writes",
            fee_id
        )))
    }
}

//! The settlement executor: one unit of payout work, end to end.

use crate::config::PayoutConfig;
use crate::error::{PayrunError, Result};
use crate::ledger::{TransferCreator, TransferStatus};
use crate::processor::{PayoutProcessor, TransferRequest};
use crate::tenant::Namespace;
use crate::traits::store::LedgerStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// How many times an outcome write retries against a concurrent update
/// before deferring to the sweep.
const OUTCOME_WRITE_ATTEMPTS: u32 = 3;

/// Processes one `(namespace, fee_id)` unit: local claim first, external
/// call second, outcome reconciled onto the transfer record.
///
/// The ordering is the engine's core correctness property: the claim
/// commit strictly precedes the processor call, and the two are never
/// parallelized. Once the processor call has started it runs to its
/// timeout; the money movement is irrevocable and unobservable
/// mid-flight, so the executor never cancels it.
#[derive(Clone)]
pub struct SettlementExecutor {
    store: Arc<dyn LedgerStore>,
    processor: Arc<dyn PayoutProcessor>,
    creator: TransferCreator,
    processor_timeout: Duration,
}

impl SettlementExecutor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        processor: Arc<dyn PayoutProcessor>,
        settings: &PayoutConfig,
    ) -> Self {
        Self {
            creator: TransferCreator::new(store.clone(), settings),
            store,
            processor,
            processor_timeout: Duration::from_secs(settings.processor_timeout_secs),
        }
    }

    /// Settle one fee.
    ///
    /// When the claim reports `already_done`, the unit is complete with
    /// no external call: a redelivered or crash-retried unit must not
    /// issue a second payment request. Whatever state the existing
    /// transfer is in, the sweep owns it from here.
    pub async fn settle(&self, ns: &Namespace, fee_id: &str) -> Result<()> {
        let (transfer, already_done) = self.creator.create_transfer(ns, fee_id).await?;

        if already_done {
            tracing::debug!(
                namespace = %ns,
                fee_id = %fee_id,
                transfer_id = %transfer.id,
                status = transfer.status.as_str(),
                "fee already claimed; skipping external call"
            );
            return Ok(());
        }

        self.execute_transfer(ns, &transfer.id).await
    }

    /// Drive the external processor call for a transfer and write the
    /// outcome back. Also the sweep's retry path: the idempotency key is
    /// the transfer id, so re-driving a transfer is always safe.
    pub async fn execute_transfer(&self, ns: &Namespace, transfer_id: &str) -> Result<()> {
        let stored = self
            .store
            .get_transfer(ns, transfer_id)
            .await?
            .ok_or_else(|| {
                PayrunError::integrity(format!("transfer {} not found in {}", transfer_id, ns))
            })?;
        let mut transfer = stored.record;
        let mut version = stored.version;

        let request = TransferRequest {
            idempotency_key: transfer.idempotency_key().to_string(),
            destination: transfer.destination.clone(),
            amount: transfer.amount,
            currency: transfer.currency.clone(),
        };

        let call = tokio::time::timeout(self.processor_timeout, self.processor.transfer(&request));
        match call.await {
            Err(_elapsed) => {
                // Outcome unknown. Leave the transfer as it stands; the
                // sweep retries it under the same idempotency key.
                tracing::warn!(
                    namespace = %ns,
                    transfer_id = %transfer_id,
                    timeout_secs = self.processor_timeout.as_secs(),
                    "processor call timed out; transfer left unresolved"
                );
                return Ok(());
            }
            Ok(Err(PayrunError::ProcessorUnavailable { reason, .. })) => {
                tracing::warn!(
                    namespace = %ns,
                    transfer_id = %transfer_id,
                    reason = %reason,
                    "processor unreachable; transfer left unresolved"
                );
                return Ok(());
            }
            Ok(Err(PayrunError::ProcessorRejected { code, message, .. })) => {
                tracing::warn!(
                    namespace = %ns,
                    transfer_id = %transfer_id,
                    code = %code,
                    "processor rejected transfer"
                );
                transfer.status = TransferStatus::Error;
                transfer.failure_code = Some(if code.is_empty() { "error".into() } else { code });
                transfer.failure_message = Some(message);
            }
            Ok(Err(other)) => return Err(other),
            Ok(Ok(outcome)) => {
                tracing::info!(
                    namespace = %ns,
                    transfer_id = %transfer_id,
                    external_ref = %outcome.external_ref,
                    status = outcome.status.as_str(),
                    "processor accepted transfer"
                );
                transfer.status = outcome.transfer_status();
                transfer.external_ref = Some(outcome.external_ref);
                transfer.failure_code = outcome.failure_code;
                transfer.failure_message = outcome.failure_message;
            }
        }
        transfer.updated_at = Utc::now();

        // CAS the outcome onto the record. A concurrent writer here is
        // another executor or the sweep resolving the same transfer; the
        // processor replays the same result for the same idempotency key,
        // so last-writer-wins after a re-read is sound.
        for _ in 0..OUTCOME_WRITE_ATTEMPTS {
            if self.store.update_transfer(ns, &transfer, version).await? {
                return Ok(());
            }
            let current = self
                .store
                .get_transfer(ns, transfer_id)
                .await?
                .ok_or_else(|| {
                    PayrunError::integrity(format!(
                        "transfer {} vanished during outcome write",
                        transfer_id
                    ))
                })?;
            version = current.version;
        }

        Err(PayrunError::conflict(format!(
            "outcome write for transfer {} kept losing concurrent updates",
            transfer_id
        )))
    }
}

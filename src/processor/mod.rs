//! Payment processor client contract.
//!
//! The engine calls exactly one processor operation: create a transfer to
//! a destination account, identified by a caller-supplied idempotency
//! key. Implementations map their wire-level failures onto the engine's
//! taxonomy:
//!
//! - an explicit decline becomes [`PayrunError::ProcessorRejected`]
//! - a timeout or transport failure becomes
//!   [`PayrunError::ProcessorUnavailable`]: the outcome is unknown and
//!   must never be reported as success or failure
//!
//! [`PayrunError::ProcessorRejected`]: crate::PayrunError::ProcessorRejected
//! [`PayrunError::ProcessorUnavailable`]: crate::PayrunError::ProcessorUnavailable

mod mock;

#[cfg(feature = "live-processor")]
mod live;

pub use mock::MockProcessor;

#[cfg(feature = "live-processor")]
pub use live::{StripeProcessor, StripeProcessorConfig};

use crate::error::Result;
use crate::ledger::TransferStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A transfer request to the external processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Caller-supplied key the processor uses to recognize a repeated
    /// request and return the prior result instead of double-executing.
    /// Always the transfer record's own id.
    pub idempotency_key: String,
    /// Processor-side destination account.
    pub destination: String,
    /// Amount in the currency's minor units.
    pub amount: i64,
    /// ISO 4217 currency code, lowercase.
    pub currency: String,
}

/// Processor-side state of an accepted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorStatus {
    Paid,
    InTransit,
    /// Accepted, still settling.
    Pending,
    Failed,
    Canceled,
}

impl ProcessorStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::InTransit => "in_transit",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Parse a processor status string; anything unrecognized is treated
    /// as still settling.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "paid" => Self::Paid,
            "in_transit" => Self::InTransit,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            _ => Self::Pending,
        }
    }
}

/// The processor's answer to an accepted transfer request.
///
/// Rejections are not outcomes; they surface as
/// `PayrunError::ProcessorRejected` from [`PayoutProcessor::transfer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// The processor's reference id for this transfer.
    pub external_ref: String,
    pub status: ProcessorStatus,
    /// Set when the processor reports a settled failure.
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
}

impl TransferOutcome {
    /// A successfully paid outcome.
    #[must_use]
    pub fn paid(external_ref: impl Into<String>) -> Self {
        Self {
            external_ref: external_ref.into(),
            status: ProcessorStatus::Paid,
            failure_code: None,
            failure_message: None,
        }
    }

    /// Map the processor-side status onto the local transfer state.
    #[must_use]
    pub fn transfer_status(&self) -> TransferStatus {
        match self.status {
            ProcessorStatus::Paid => TransferStatus::Paid,
            // "Accepted, still settling" and "en route" both mean the
            // money is in the processor's hands.
            ProcessorStatus::InTransit | ProcessorStatus::Pending => TransferStatus::InTransit,
            ProcessorStatus::Failed => TransferStatus::Failed,
            ProcessorStatus::Canceled => TransferStatus::Canceled,
        }
    }
}

/// The single processor operation this engine calls.
#[async_trait]
pub trait PayoutProcessor: Send + Sync {
    /// Execute (or replay, for a repeated idempotency key) a transfer.
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_defaults_to_pending() {
        assert_eq!(ProcessorStatus::parse("paid"), ProcessorStatus::Paid);
        assert_eq!(ProcessorStatus::parse("weird"), ProcessorStatus::Pending);
    }

    #[test]
    fn outcome_maps_onto_transfer_status() {
        assert_eq!(
            TransferOutcome::paid("po_1").transfer_status(),
            TransferStatus::Paid
        );
        let pending = TransferOutcome {
            external_ref: "po_2".into(),
            status: ProcessorStatus::Pending,
            failure_code: None,
            failure_message: None,
        };
        assert_eq!(pending.transfer_status(), TransferStatus::InTransit);
    }
}

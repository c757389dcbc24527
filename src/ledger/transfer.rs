//! Transfer records: money movements funding fees.

use crate::ledger::fee::Fee;
use crate::tenant::Namespace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Exists locally; processor outcome unknown. This is the
    /// recoverable ambiguous state the reconciliation sweep resolves.
    Pending,
    /// Accepted by the processor, funds en route.
    InTransit,
    /// Funds arrived.
    Paid,
    /// Accepted by the processor but later failed.
    Failed,
    /// Canceled at the processor.
    Canceled,
    /// The processor explicitly rejected the request. Holds the failure
    /// code and message for ops.
    Error,
}

impl TransferStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InTransit => "in_transit",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Error => "error",
        }
    }
}

/// A record of money movement to a payee, funding one fee.
///
/// The id is allocated locally, before the external call, and is reused
/// as the idempotency key on every processor attempt for this transfer.
/// The model keeps `fee_id` singular because this engine creates one
/// transfer per fee; nothing in the storage contract prevents an
/// aggregating implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub namespace: Namespace,
    pub fee_id: String,
    /// Processor-side account the money goes to.
    pub destination: String,
    pub currency: String,
    pub amount: i64,
    pub status: TransferStatus,
    /// Set only when status is `Error` or `Failed`.
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    /// The processor's reference for this transfer, once known.
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    /// Allocate a new pending transfer funding `fee`.
    #[must_use]
    pub fn for_fee(fee: &Fee, destination: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            namespace: fee.namespace.clone(),
            fee_id: fee.id.clone(),
            destination: destination.into(),
            currency: fee.currency.clone(),
            amount: fee.amount,
            status: TransferStatus::Pending,
            failure_code: None,
            failure_message: None,
            external_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the processor outcome for this transfer is still
    /// unresolved (sweep-eligible).
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self.status, TransferStatus::Pending | TransferStatus::Error)
    }

    /// The idempotency key for processor calls: the transfer's own id.
    #[must_use]
    pub fn idempotency_key(&self) -> &str {
        &self.id
    }
}

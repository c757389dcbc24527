use std::fmt;

/// The main error type for the payout engine.
///
/// The variants follow the engine's error taxonomy: integrity errors are
/// fatal for the unit that hit them, conflicts are transient and retried
/// with jitter, dispute blocks are expected business state, and processor
/// errors are partitioned into "rejected" (explicit decline) and
/// "unavailable" (outcome unknown, resolved by the reconciliation sweep).
#[derive(Debug, thiserror::Error)]
pub enum PayrunError {
    /// A record this unit depends on is missing or malformed.
    ///
    /// Fatal for the unit: re-running it cannot produce the missing data,
    /// so callers log and abandon instead of retrying.
    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An optimistic write lost against a concurrent writer.
    ///
    /// Transient; the owning component retries with jittered backoff.
    /// Counter shards additionally grow their shard count.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// The fee has an open dispute; settlement is blocked until it clears.
    #[error("Fee {fee_id} is disputed")]
    DisputedFee { fee_id: String },

    /// The payment processor explicitly declined the transfer.
    ///
    /// The transfer record is parked in `Error` status with the code and
    /// message for ops to act on.
    #[error("Processor rejected transfer {transfer_id}: {code}")]
    ProcessorRejected {
        transfer_id: String,
        code: String,
        message: String,
    },

    /// The processor call timed out or failed in transit.
    ///
    /// The outcome is unknown: the transfer must stay unresolved so the
    /// reconciliation sweep can retry it under the same idempotency key.
    /// Never treat this as success or failure.
    #[error("Processor outcome unknown for transfer {transfer_id}: {reason}")]
    ProcessorUnavailable { transfer_id: String, reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience result type using [`PayrunError`].
pub type Result<T> = std::result::Result<T, PayrunError>;

impl PayrunError {
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn disputed(fee_id: impl Into<String>) -> Self {
        Self::DisputedFee {
            fee_id: fee_id.into(),
        }
    }

    pub fn rejected(
        transfer_id: impl Into<String>,
        code: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::ProcessorRejected {
            transfer_id: transfer_id.into(),
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn unavailable(transfer_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProcessorUnavailable {
            transfer_id: transfer_id.into(),
            reason: reason.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is a transient write conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether this error is fatal for the unit that produced it.
    ///
    /// Fatal errors are logged and abandoned; everything else is eligible
    /// for a queue-level retry.
    #[must_use]
    pub fn is_fatal_for_unit(&self) -> bool {
        matches!(
            self,
            Self::Integrity(_) | Self::NotFound(_) | Self::DisputedFee { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classification() {
        assert!(PayrunError::conflict("shard 2").is_conflict());
        assert!(!PayrunError::integrity("missing fee").is_conflict());
    }

    #[test]
    fn fatal_classification() {
        assert!(PayrunError::integrity("missing fee").is_fatal_for_unit());
        assert!(PayrunError::disputed("fee_1").is_fatal_for_unit());
        assert!(!PayrunError::conflict("lost race").is_fatal_for_unit());
        assert!(
            !PayrunError::unavailable("tr_1", "timeout").is_fatal_for_unit(),
            "unknown outcomes are resolved by the sweep, not abandoned"
        );
    }

    #[test]
    fn display_includes_identifiers() {
        let err = PayrunError::rejected("tr_9", "account_closed", "destination closed");
        assert!(err.to_string().contains("tr_9"));
        assert!(err.to_string().contains("account_closed"));
    }
}

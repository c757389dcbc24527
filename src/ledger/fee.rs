//! Fee records and their settlement state machine.

use crate::tenant::Namespace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a fee is owed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayeeKind {
    /// The platform's own cut.
    Platform,
    /// An affiliate commission.
    Affiliate,
    /// A partner commission.
    Partner,
}

impl PayeeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Affiliate => "affiliate",
            Self::Partner => "partner",
        }
    }
}

/// Settlement state of a fee.
///
/// Fees are never deleted, only superseded in status. The only
/// transition this engine performs is `Payable -> Transferred` (the
/// transfer creator); disputes and refunds are flipped by handlers
/// outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    /// Recorded, not yet eligible for payout.
    Pending,
    /// Eligible for payout once past the payee's cutoff.
    Payable,
    /// Under dispute; blocks transfer creation entirely.
    Disputed,
    /// Claimed by a transfer. Terminal for this engine.
    Transferred,
    /// The underlying charge was refunded; never paid out.
    Refunded,
}

impl FeeStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Payable => "payable",
            Self::Disputed => "disputed",
            Self::Transferred => "transferred",
            Self::Refunded => "refunded",
        }
    }
}

/// An obligation to pay a payee a monetary amount in a specific currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fee {
    pub id: String,
    pub namespace: Namespace,
    /// What kind of payee this fee is owed to.
    pub payee_kind: PayeeKind,
    /// Affiliate or partner id; `None` for platform fees.
    pub payee_id: Option<String>,
    /// ISO 4217 currency code, lowercase (e.g. `"usd"`).
    pub currency: String,
    /// Amount in the currency's minor units.
    pub amount: i64,
    pub status: FeeStatus,
    /// Id of the transfer that claimed this fee; `None` until claimed.
    pub transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Fee {
    /// A payable fee, as a charge/commission event would record it.
    #[must_use]
    pub fn payable(
        id: impl Into<String>,
        namespace: Namespace,
        payee_kind: PayeeKind,
        payee_id: Option<String>,
        currency: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            id: id.into(),
            namespace,
            payee_kind,
            payee_id,
            currency: currency.into(),
            amount,
            status: FeeStatus::Payable,
            transfer_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this fee may be selected for payout.
    #[must_use]
    pub fn is_payable(&self) -> bool {
        self.status == FeeStatus::Payable && self.transfer_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payable_constructor_is_unclaimed() {
        let ns = Namespace::new("tenant-a").unwrap();
        let fee = Fee::payable("fee_1", ns, PayeeKind::Affiliate, Some("aff_1".into()), "usd", 700);
        assert!(fee.is_payable());
        assert_eq!(fee.status, FeeStatus::Payable);
        assert!(fee.transfer_id.is_none());
    }

    #[test]
    fn claimed_fee_is_not_payable() {
        let ns = Namespace::new("tenant-a").unwrap();
        let mut fee = Fee::payable("fee_1", ns, PayeeKind::Platform, None, "usd", 100);
        fee.status = FeeStatus::Transferred;
        fee.transfer_id = Some("tr_1".into());
        assert!(!fee.is_payable());
    }

    #[test]
    fn status_round_trips_through_serde() {
        let json = serde_json::to_string(&FeeStatus::Transferred).unwrap();
        assert_eq!(json, "\"transferred\"");
        let status: FeeStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, FeeStatus::Transferred);
    }
}

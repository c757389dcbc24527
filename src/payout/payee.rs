//! Payee records and payout schedules.
//!
//! Payees are owned by the surrounding application (affiliate and partner
//! records, plus one row for the platform itself); this engine only reads
//! them to resolve destinations and compute cutoffs.

use crate::ledger::PayeeKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How often a payee is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSchedule {
    /// Settlement period in whole days.
    pub period_days: u32,
    /// When this payee last received a payout. Maintained by the payout
    /// recording layer outside this engine; informational here.
    #[serde(default)]
    pub last_paid_at: Option<DateTime<Utc>>,
}

impl PayoutSchedule {
    /// A schedule paying out every `period_days` days.
    #[must_use]
    pub fn every_days(period_days: u32) -> Self {
        Self {
            period_days,
            last_paid_at: None,
        }
    }

    /// The eligibility cutoff for this schedule at `now`.
    ///
    /// Fees created before the cutoff are eligible. Computed at whole-day
    /// granularity: `now` is floored to midnight UTC before the period is
    /// subtracted, so eligibility doesn't drift with the hour the
    /// orchestrator happens to run.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        midnight - Duration::days(i64::from(self.period_days))
    }
}

impl Default for PayoutSchedule {
    fn default() -> Self {
        // Weekly settlement unless the payee record says otherwise.
        Self::every_days(7)
    }
}

/// A payout recipient: the platform, an affiliate, or a partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payee {
    pub kind: PayeeKind,
    /// Affiliate or partner id; `None` for the platform.
    pub id: Option<String>,
    /// Processor-side account reference transfers are sent to.
    pub destination: String,
    pub schedule: PayoutSchedule,
}

impl Payee {
    #[must_use]
    pub fn platform(destination: impl Into<String>, schedule: PayoutSchedule) -> Self {
        Self {
            kind: PayeeKind::Platform,
            id: None,
            destination: destination.into(),
            schedule,
        }
    }

    #[must_use]
    pub fn affiliate(
        id: impl Into<String>,
        destination: impl Into<String>,
        schedule: PayoutSchedule,
    ) -> Self {
        Self {
            kind: PayeeKind::Affiliate,
            id: Some(id.into()),
            destination: destination.into(),
            schedule,
        }
    }

    #[must_use]
    pub fn partner(
        id: impl Into<String>,
        destination: impl Into<String>,
        schedule: PayoutSchedule,
    ) -> Self {
        Self {
            kind: PayeeKind::Partner,
            id: Some(id.into()),
            destination: destination.into(),
            schedule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cutoff_floors_to_midnight() {
        let schedule = PayoutSchedule::every_days(7);
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 42, 9).unwrap();
        let cutoff = schedule.cutoff(now);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap());
    }

    #[test]
    fn zero_period_cuts_off_at_today_midnight() {
        let schedule = PayoutSchedule::every_days(0);
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 1, 0, 0).unwrap();
        assert_eq!(
            schedule.cutoff(now),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
    }
}

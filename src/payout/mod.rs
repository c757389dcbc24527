//! Payout pipeline: selection, settlement, reconciliation.
//!
//! The orchestrator is a stateless selector that fans eligible fees out
//! onto the job queue, one unit per fee. The settlement executor consumes
//! a unit: it claims the fee locally (transfer creator), then calls the
//! external processor with the transfer's own id as idempotency key, then
//! reconciles the outcome back onto the transfer record. Transfers whose
//! outcome is unknown (the call timed out, the process crashed, the
//! processor was down) are picked up by the reconciliation sweep and
//! retried under the same idempotency key.

mod executor;
mod jobs;
mod orchestrator;
mod payee;
mod sweep;

pub use executor::SettlementExecutor;
pub use jobs::{SETTLE_FEE_JOB, SettleFeeJob, register_payout_jobs};
pub use orchestrator::PayoutOrchestrator;
pub use payee::{Payee, PayoutSchedule};
pub use sweep::ReconciliationSweep;

// The payee kinds are the fee types; re-export so payout callers don't
// have to reach into the ledger module for them.
pub use crate::ledger::PayeeKind;

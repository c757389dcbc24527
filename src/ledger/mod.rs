//! Fee ledger: the record of money owed, and the transfer records that
//! settle it.
//!
//! A fee is an obligation to pay a payee; a transfer is the record of the
//! money movement that funds it. The one invariant everything else hangs
//! off: a fee flips to `Transferred` and gains its transfer id in a
//! single atomic commit, *before* any external money movement is
//! attempted. The transfer id doubles as the idempotency key for the
//! processor call, so a crash anywhere after that commit can be retried
//! without paying twice.

mod creator;
mod fee;
mod transfer;

pub use creator::TransferCreator;
pub use fee::{Fee, FeeStatus, PayeeKind};
pub use transfer::{Transfer, TransferStatus};

//! Storage contracts for ledger and counter state.
//!
//! Implement these traits to persist engine state to your database. The
//! contracts use optimistic concurrency throughout: reads return the
//! record together with a version, and every write names the version the
//! caller read. A write against a stale version returns `Ok(false)`
//! rather than clobbering the concurrent update; the caller retries from
//! a fresh read.
//!
//! All methods are scoped to an explicit [`Namespace`]. Implementations
//! must never let records from different namespaces meet, whether in a
//! query, a sum, or a transaction.

use crate::counter::{Shard, ShardConfig};
use crate::error::Result;
use crate::ledger::{Fee, Transfer};
use crate::payout::{Payee, PayeeKind};
use crate::tenant::Namespace;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A stored record together with the version that guards its next write.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(record: T, version: u64) -> Self {
        Self { record, version }
    }
}

/// Persistence for fees, transfers, and payee records.
///
/// Production implementations back this with a transactional database;
/// [`InMemoryLedgerStore`](crate::store::InMemoryLedgerStore) is provided
/// for development and testing.
///
/// # Important: atomicity of `commit_claim`
///
/// `commit_claim` is the one multi-entity write in the engine. The fee
/// status flip and the transfer insert must become visible together or
/// not at all; a fee marked `Transferred` without its transfer record
/// (or the reverse) is unrecoverable without manual intervention.
/// Implementations must put both writes in a single database transaction.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Fees

    /// Load a fee with its current version.
    async fn get_fee(&self, ns: &Namespace, fee_id: &str) -> Result<Option<Versioned<Fee>>>;

    /// Insert or overwrite a fee.
    ///
    /// Fees are created by charge/commission events outside this engine;
    /// this is the ingest path those events (and tests) use.
    async fn put_fee(&self, ns: &Namespace, fee: &Fee) -> Result<()>;

    /// Fees eligible for payout: payee matches, status `Payable`,
    /// unclaimed (`transfer_id` empty), created before `cutoff`.
    async fn payable_fees(
        &self,
        ns: &Namespace,
        kind: PayeeKind,
        payee_id: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Fee>>;

    // Transfers

    /// Load a transfer with its current version.
    async fn get_transfer(
        &self,
        ns: &Namespace,
        transfer_id: &str,
    ) -> Result<Option<Versioned<Transfer>>>;

    /// Atomically claim a fee for transfer.
    ///
    /// Writes the fee (now `Transferred`, pointing at `transfer.id`) and
    /// inserts the transfer record in one transaction. Returns
    /// `Ok(false)` if the fee's version no longer matches
    /// `expected_version`; nothing is written in that case.
    async fn commit_claim(
        &self,
        ns: &Namespace,
        fee: &Fee,
        expected_version: u64,
        transfer: &Transfer,
    ) -> Result<bool>;

    /// Update a transfer if its version still matches.
    ///
    /// Returns `Ok(false)` on version mismatch.
    async fn update_transfer(
        &self,
        ns: &Namespace,
        transfer: &Transfer,
        expected_version: u64,
    ) -> Result<bool>;

    /// Transfers whose processor outcome is unresolved: status `Pending`
    /// or `Error`, `amount > 0`, last updated before `updated_before`.
    async fn unresolved_transfers(
        &self,
        ns: &Namespace,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Versioned<Transfer>>>;

    // Payees

    /// All payees of the tenant (affiliates, partners, and the platform
    /// itself).
    async fn list_payees(&self, ns: &Namespace) -> Result<Vec<Payee>>;

    /// Look up one payee by kind and id (`None` id for the platform).
    async fn get_payee(
        &self,
        ns: &Namespace,
        kind: PayeeKind,
        payee_id: Option<&str>,
    ) -> Result<Option<Payee>>;

    /// Insert or overwrite a payee record.
    async fn put_payee(&self, ns: &Namespace, payee: &Payee) -> Result<()>;
}

/// Persistence for sharded counter state.
///
/// A counter's true value is the sum of its shards; no shard write may
/// block a concurrent write to a different shard of the same counter.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Load the shard-count config for a counter.
    async fn get_config(
        &self,
        ns: &Namespace,
        name: &str,
    ) -> Result<Option<Versioned<ShardConfig>>>;

    /// Write the shard-count config.
    ///
    /// `expected_version: None` means insert-if-absent. Returns
    /// `Ok(false)` when the insert raced another writer or the version
    /// didn't match.
    async fn put_config(
        &self,
        ns: &Namespace,
        name: &str,
        config: &ShardConfig,
        expected_version: Option<u64>,
    ) -> Result<bool>;

    /// Load one shard of a counter.
    async fn get_shard(
        &self,
        ns: &Namespace,
        name: &str,
        index: u32,
    ) -> Result<Option<Versioned<Shard>>>;

    /// Write one shard.
    ///
    /// `expected_version: None` means insert-if-absent. `Ok(false)` is
    /// the concurrent-write conflict that triggers shard growth and a
    /// jittered retry in the counter service.
    async fn put_shard(
        &self,
        ns: &Namespace,
        shard: &Shard,
        expected_version: Option<u64>,
    ) -> Result<bool>;

    /// All existing shards of a counter, in no particular order.
    async fn shards(&self, ns: &Namespace, name: &str) -> Result<Vec<Shard>>;
}

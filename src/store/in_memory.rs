//! In-memory ledger and counter stores.
//!
//! Versioned maps behind async mutexes. Every record carries the version
//! its next write must name, which gives these stores the same
//! compare-and-swap semantics a production implementation provides with
//! conditional writes, including genuine CAS failures under concurrent
//! tasks, which the engine's contention tests rely on.

use crate::counter::{Shard, ShardConfig, shard_key};
use crate::error::Result;
use crate::ledger::{Fee, PayeeKind, Transfer};
use crate::payout::Payee;
use crate::tenant::Namespace;
use crate::traits::store::{CounterStore, LedgerStore, Versioned};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct TenantLedger {
    fees: HashMap<String, Versioned<Fee>>,
    transfers: HashMap<String, Versioned<Transfer>>,
    payees: HashMap<(PayeeKind, Option<String>), Payee>,
}

/// In-memory [`LedgerStore`].
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    tenants: Arc<Mutex<HashMap<Namespace, TenantLedger>>>,
}

impl InMemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_fee(&self, ns: &Namespace, fee_id: &str) -> Result<Option<Versioned<Fee>>> {
        let tenants = self.tenants.lock().await;
        Ok(tenants
            .get(ns)
            .and_then(|t| t.fees.get(fee_id))
            .map(|v| Versioned::new(v.record.clone(), v.version)))
    }

    async fn put_fee(&self, ns: &Namespace, fee: &Fee) -> Result<()> {
        let mut tenants = self.tenants.lock().await;
        let tenant = tenants.entry(ns.clone()).or_default();
        let version = tenant
            .fees
            .get(&fee.id)
            .map(|v| v.version + 1)
            .unwrap_or(1);
        tenant
            .fees
            .insert(fee.id.clone(), Versioned::new(fee.clone(), version));
        Ok(())
    }

    async fn payable_fees(
        &self,
        ns: &Namespace,
        kind: PayeeKind,
        payee_id: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Fee>> {
        let tenants = self.tenants.lock().await;
        let Some(tenant) = tenants.get(ns) else {
            return Ok(Vec::new());
        };
        Ok(tenant
            .fees
            .values()
            .filter(|v| {
                let fee = &v.record;
                fee.payee_kind == kind
                    && fee.payee_id.as_deref() == payee_id
                    && fee.is_payable()
                    && fee.created_at < cutoff
            })
            .map(|v| v.record.clone())
            .collect())
    }

    async fn get_transfer(
        &self,
        ns: &Namespace,
        transfer_id: &str,
    ) -> Result<Option<Versioned<Transfer>>> {
        let tenants = self.tenants.lock().await;
        Ok(tenants
            .get(ns)
            .and_then(|t| t.transfers.get(transfer_id))
            .map(|v| Versioned::new(v.record.clone(), v.version)))
    }

    async fn commit_claim(
        &self,
        ns: &Namespace,
        fee: &Fee,
        expected_version: u64,
        transfer: &Transfer,
    ) -> Result<bool> {
        let mut tenants = self.tenants.lock().await;
        let tenant = tenants.entry(ns.clone()).or_default();

        // Both checks before either write: the claim is all-or-nothing.
        match tenant.fees.get(&fee.id) {
            Some(existing) if existing.version == expected_version => {}
            _ => return Ok(false),
        }
        if tenant.transfers.contains_key(&transfer.id) {
            return Ok(false);
        }

        tenant.fees.insert(
            fee.id.clone(),
            Versioned::new(fee.clone(), expected_version + 1),
        );
        tenant
            .transfers
            .insert(transfer.id.clone(), Versioned::new(transfer.clone(), 1));
        Ok(true)
    }

    async fn update_transfer(
        &self,
        ns: &Namespace,
        transfer: &Transfer,
        expected_version: u64,
    ) -> Result<bool> {
        let mut tenants = self.tenants.lock().await;
        let tenant = tenants.entry(ns.clone()).or_default();

        match tenant.transfers.get(&transfer.id) {
            Some(existing) if existing.version == expected_version => {
                tenant.transfers.insert(
                    transfer.id.clone(),
                    Versioned::new(transfer.clone(), expected_version + 1),
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unresolved_transfers(
        &self,
        ns: &Namespace,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Versioned<Transfer>>> {
        let tenants = self.tenants.lock().await;
        let Some(tenant) = tenants.get(ns) else {
            return Ok(Vec::new());
        };
        Ok(tenant
            .transfers
            .values()
            .filter(|v| {
                let t = &v.record;
                t.is_unresolved() && t.amount > 0 && t.updated_at < updated_before
            })
            .map(|v| Versioned::new(v.record.clone(), v.version))
            .collect())
    }

    async fn list_payees(&self, ns: &Namespace) -> Result<Vec<Payee>> {
        let tenants = self.tenants.lock().await;
        Ok(tenants
            .get(ns)
            .map(|t| t.payees.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_payee(
        &self,
        ns: &Namespace,
        kind: PayeeKind,
        payee_id: Option<&str>,
    ) -> Result<Option<Payee>> {
        let tenants = self.tenants.lock().await;
        Ok(tenants
            .get(ns)
            .and_then(|t| t.payees.get(&(kind, payee_id.map(String::from))))
            .cloned())
    }

    async fn put_payee(&self, ns: &Namespace, payee: &Payee) -> Result<()> {
        let mut tenants = self.tenants.lock().await;
        let tenant = tenants.entry(ns.clone()).or_default();
        tenant
            .payees
            .insert((payee.kind, payee.id.clone()), payee.clone());
        Ok(())
    }
}

#[derive(Default)]
struct TenantCounters {
    configs: HashMap<String, Versioned<ShardConfig>>,
    /// Keyed by `{name}-shard{index}`.
    shards: HashMap<String, Versioned<Shard>>,
}

/// In-memory [`CounterStore`].
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    tenants: Arc<Mutex<HashMap<Namespace, TenantCounters>>>,
}

impl InMemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get_config(
        &self,
        ns: &Namespace,
        name: &str,
    ) -> Result<Option<Versioned<ShardConfig>>> {
        let tenants = self.tenants.lock().await;
        Ok(tenants
            .get(ns)
            .and_then(|t| t.configs.get(name))
            .map(|v| Versioned::new(v.record.clone(), v.version)))
    }

    async fn put_config(
        &self,
        ns: &Namespace,
        name: &str,
        config: &ShardConfig,
        expected_version: Option<u64>,
    ) -> Result<bool> {
        let mut tenants = self.tenants.lock().await;
        let tenant = tenants.entry(ns.clone()).or_default();

        match (tenant.configs.get(name), expected_version) {
            (None, None) => {
                tenant
                    .configs
                    .insert(name.to_string(), Versioned::new(config.clone(), 1));
                Ok(true)
            }
            (Some(existing), Some(expected)) if existing.version == expected => {
                tenant
                    .configs
                    .insert(name.to_string(), Versioned::new(config.clone(), expected + 1));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_shard(
        &self,
        ns: &Namespace,
        name: &str,
        index: u32,
    ) -> Result<Option<Versioned<Shard>>> {
        let tenants = self.tenants.lock().await;
        Ok(tenants
            .get(ns)
            .and_then(|t| t.shards.get(&shard_key(name, index)))
            .map(|v| Versioned::new(v.record.clone(), v.version)))
    }

    async fn put_shard(
        &self,
        ns: &Namespace,
        shard: &Shard,
        expected_version: Option<u64>,
    ) -> Result<bool> {
        let mut tenants = self.tenants.lock().await;
        let tenant = tenants.entry(ns.clone()).or_default();
        let key = shard.key();

        match (tenant.shards.get(&key), expected_version) {
            (None, None) => {
                tenant.shards.insert(key, Versioned::new(shard.clone(), 1));
                Ok(true)
            }
            (Some(existing), Some(expected)) if existing.version == expected => {
                tenant
                    .shards
                    .insert(key, Versioned::new(shard.clone(), expected + 1));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn shards(&self, ns: &Namespace, name: &str) -> Result<Vec<Shard>> {
        let tenants = self.tenants.lock().await;
        let Some(tenant) = tenants.get(ns) else {
            return Ok(Vec::new());
        };
        Ok(tenant
            .shards
            .values()
            .filter(|v| v.record.name == name)
            .map(|v| v.record.clone())
            .collect())
    }
}

//! Read-through cache for counter totals and member sets.
//!
//! Backed by moka with a uniform short TTL. The cache is constructed once
//! at startup and shared; there is no lazy global initialization. Entries
//! are only ever a fast path: a miss falls through to a full shard scan,
//! so eviction is always safe.

use crate::tenant::Namespace;
use moka::future::Cache as MokaCache;
use moka::ops::compute::Op;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide cache for counter reads.
///
/// Keys are namespace-qualified, so two tenants' counters with the same
/// name never share an entry.
#[derive(Clone)]
pub struct CounterCache {
    totals: MokaCache<String, i64>,
    members: MokaCache<String, Arc<HashSet<String>>>,
}

impl CounterCache {
    /// Create a cache bounded to `capacity` entries per kind, expiring
    /// entries `ttl` after write.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            totals: MokaCache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            members: MokaCache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    fn key(ns: &Namespace, name: &str) -> String {
        format!("{}/{}", ns, name)
    }

    /// Cached total for a counter, if present.
    pub async fn total(&self, ns: &Namespace, name: &str) -> Option<i64> {
        self.totals.get(&Self::key(ns, name)).await
    }

    /// Populate the cached total after a shard scan.
    pub async fn set_total(&self, ns: &Namespace, name: &str, total: i64) {
        self.totals.insert(Self::key(ns, name), total).await;
    }

    /// Apply `delta` to the cached total, only if an entry exists.
    ///
    /// Mirrors a memcache increment-existing: an absent entry stays
    /// absent, so a later read repopulates from the shards instead of
    /// trusting a partial value.
    pub async fn bump_total(&self, ns: &Namespace, name: &str, delta: i64) {
        self.totals
            .entry(Self::key(ns, name))
            .and_compute_with(move |entry| {
                let next = entry.map(|e| e.into_value().saturating_add(delta));
                async move {
                    match next {
                        Some(v) => Op::Put(v),
                        None => Op::Nop,
                    }
                }
            })
            .await;
    }

    /// Cached member set for a counter, if present.
    pub async fn member_set(&self, ns: &Namespace, name: &str) -> Option<Arc<HashSet<String>>> {
        self.members.get(&Self::key(ns, name)).await
    }

    /// Populate the cached member set after a shard scan.
    pub async fn set_member_set(&self, ns: &Namespace, name: &str, set: HashSet<String>) {
        self.members.insert(Self::key(ns, name), Arc::new(set)).await;
    }

    /// Insert `value` into the cached member set, only if an entry
    /// exists.
    pub async fn add_member_existing(&self, ns: &Namespace, name: &str, value: &str) {
        let value = value.to_string();
        self.members
            .entry(Self::key(ns, name))
            .and_compute_with(move |entry| {
                let next = entry.map(|e| {
                    let mut set = (*e.into_value()).clone();
                    set.insert(value);
                    Arc::new(set)
                });
                async move {
                    match next {
                        Some(v) => Op::Put(v),
                        None => Op::Nop,
                    }
                }
            })
            .await;
    }
}

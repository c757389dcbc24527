//! The sharded counter service.

use crate::config::CounterConfig;
use crate::counter::cache::CounterCache;
use crate::counter::jobs::{AddMemberJob, IncrementJob};
use crate::counter::shard::{Shard, ShardConfig};
use crate::error::{PayrunError, Result};
use crate::tenant::Namespace;
use crate::traits::job::JobQueue;
use crate::traits::store::CounterStore;
use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// Durable, horizontally partitioned counter with a read-through cache.
///
/// Cheap to clone; all fields are shared handles. Writes go through the
/// background queue, reads come from the cache or a shard scan.
#[derive(Clone)]
pub struct ShardedCounter {
    store: Arc<dyn CounterStore>,
    cache: CounterCache,
    queue: Arc<dyn JobQueue>,
    settings: CounterConfig,
}

impl ShardedCounter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        cache: CounterCache,
        queue: Arc<dyn JobQueue>,
        settings: CounterConfig,
    ) -> Self {
        Self {
            store,
            cache,
            queue,
            settings,
        }
    }

    /// Increment the named counter by 1.
    pub async fn increment(&self, ns: &Namespace, name: &str, tag: &str) -> Result<()> {
        self.increment_by(ns, name, tag, 1).await
    }

    /// Increment the named counter by `delta`.
    ///
    /// Enqueues the write and returns immediately; durability is reached
    /// when the background job commits its shard. `delta` may be
    /// negative.
    pub async fn increment_by(
        &self,
        ns: &Namespace,
        name: &str,
        tag: &str,
        delta: i64,
    ) -> Result<()> {
        let job = IncrementJob {
            namespace: ns.clone(),
            name: name.to_string(),
            tag: tag.to_string(),
            delta,
        };
        self.queue.enqueue(&job).await?;
        Ok(())
    }

    /// Record `value` as a member of the named set counter.
    pub async fn add_member(
        &self,
        ns: &Namespace,
        name: &str,
        tag: &str,
        value: &str,
    ) -> Result<()> {
        let job = AddMemberJob {
            namespace: ns.clone(),
            name: name.to_string(),
            tag: tag.to_string(),
            value: value.to_string(),
        };
        self.queue.enqueue(&job).await?;
        Ok(())
    }

    /// Record `value` as a member unless it is already present.
    ///
    /// The existence check reads through the cache, so under concurrent
    /// adds of the same value a duplicate enqueue is possible; the shard
    /// member set deduplicates on write.
    pub async fn add_member_once(
        &self,
        ns: &Namespace,
        name: &str,
        tag: &str,
        value: &str,
    ) -> Result<()> {
        if self.member_exists(ns, name, value).await? {
            return Ok(());
        }
        self.add_member(ns, name, tag, value).await
    }

    /// Current value of the named counter: the sum of all its shards.
    pub async fn count(&self, ns: &Namespace, name: &str) -> Result<i64> {
        if let Some(total) = self.cache.total(ns, name).await {
            return Ok(total);
        }

        let shards = self.store.shards(ns, name).await?;
        let total = shards.iter().map(|s| s.count).sum();
        self.cache.set_total(ns, name, total).await;
        Ok(total)
    }

    /// All members of the named set counter: the union of all shards'
    /// member sets.
    pub async fn members(&self, ns: &Namespace, name: &str) -> Result<Vec<String>> {
        if let Some(set) = self.cache.member_set(ns, name).await {
            return Ok(set.iter().cloned().collect());
        }

        let shards = self.store.shards(ns, name).await?;
        let mut set = HashSet::new();
        for shard in shards {
            set.extend(shard.members);
        }
        let members: Vec<String> = set.iter().cloned().collect();
        self.cache.set_member_set(ns, name, set).await;
        Ok(members)
    }

    /// Whether `value` is a member of the named set counter.
    pub async fn member_exists(&self, ns: &Namespace, name: &str, value: &str) -> Result<bool> {
        if let Some(set) = self.cache.member_set(ns, name).await {
            return Ok(set.contains(value));
        }
        Ok(self.members(ns, name).await?.iter().any(|m| m == value))
    }

    /// Raise the shard count of the named counter to at least `n`.
    ///
    /// Never decreases the count. Creates the config record at the
    /// configured default if it does not exist yet.
    pub async fn increase_shards(&self, ns: &Namespace, name: &str, n: u32) -> Result<()> {
        // The config record sees far less contention than shards, but the
        // CAS can still race; a handful of attempts is plenty.
        for _ in 0..5 {
            match self.store.get_config(ns, name).await? {
                Some(existing) => {
                    if existing.record.shards >= n {
                        return Ok(());
                    }
                    let config = ShardConfig { shards: n };
                    if self
                        .store
                        .put_config(ns, name, &config, Some(existing.version))
                        .await?
                    {
                        tracing::debug!(namespace = %ns, counter = %name, shards = n, "shard count raised");
                        return Ok(());
                    }
                }
                None => {
                    let config = ShardConfig {
                        shards: n.max(self.settings.default_shards),
                    };
                    if self.store.put_config(ns, name, &config, None).await? {
                        return Ok(());
                    }
                }
            }
        }
        Err(PayrunError::conflict(format!(
            "unable to raise shard count for counter {}",
            name
        )))
    }

    /// Current shard count, creating the config lazily on first use.
    pub(crate) async fn shard_count(&self, ns: &Namespace, name: &str) -> Result<u32> {
        if let Some(existing) = self.store.get_config(ns, name).await? {
            return Ok(existing.record.shards);
        }

        let config = ShardConfig {
            shards: self.settings.default_shards,
        };
        if !self.store.put_config(ns, name, &config, None).await? {
            // Lost the insert race; the other writer's value wins.
            if let Some(existing) = self.store.get_config(ns, name).await? {
                return Ok(existing.record.shards);
            }
        }
        Ok(config.shards)
    }

    /// Apply one increment to a randomly chosen shard.
    ///
    /// Returns a conflict error when the shard write loses an optimistic
    /// race; the caller (the increment job) grows the shard count and
    /// re-schedules.
    pub(crate) async fn apply_increment(
        &self,
        ns: &Namespace,
        name: &str,
        tag: &str,
        delta: i64,
    ) -> Result<()> {
        let shards = self.shard_count(ns, name).await?;
        let index = rand::thread_rng().gen_range(0..shards);

        let (mut shard, expected) = match self.store.get_shard(ns, name, index).await? {
            Some(v) => (v.record, Some(v.version)),
            None => (Shard::new(name, index), None),
        };
        shard.tag = tag.to_string();
        shard.count += delta;
        shard.updated_at = Utc::now();

        if !self.store.put_shard(ns, &shard, expected).await? {
            return Err(PayrunError::conflict(format!(
                "counter {} shard {} lost a concurrent write",
                name, index
            )));
        }

        tracing::debug!(namespace = %ns, counter = %name, shard = index, delta, "counter incremented");
        self.cache.bump_total(ns, name, delta).await;
        Ok(())
    }

    /// Apply one member insert to a randomly chosen shard.
    pub(crate) async fn apply_add_member(
        &self,
        ns: &Namespace,
        name: &str,
        tag: &str,
        value: &str,
    ) -> Result<()> {
        let shards = self.shard_count(ns, name).await?;
        let index = rand::thread_rng().gen_range(0..shards);

        let (mut shard, expected) = match self.store.get_shard(ns, name, index).await? {
            Some(v) => (v.record, Some(v.version)),
            None => (Shard::new(name, index), None),
        };
        shard.tag = tag.to_string();
        shard.members.insert(value.to_string());
        shard.updated_at = Utc::now();

        if !self.store.put_shard(ns, &shard, expected).await? {
            return Err(PayrunError::conflict(format!(
                "counter {} shard {} lost a concurrent write",
                name, index
            )));
        }

        self.cache.add_member_existing(ns, name, value).await;
        Ok(())
    }

    /// Jitter bound for contention retries, from configuration.
    pub(crate) fn retry_jitter_ms(&self) -> u64 {
        self.settings.retry_jitter_ms
    }
}

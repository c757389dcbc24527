//! Counter shard and shard-count records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shard count a counter starts with when its config record does not
/// exist yet.
pub const DEFAULT_SHARDS: u32 = 3;

/// Per-counter shard-count record.
///
/// Created lazily on a counter's first write and only ever grows; the
/// shard count never decreases, so shard keys remain valid forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub shards: u32,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            shards: DEFAULT_SHARDS,
        }
    }
}

/// One partition of a named counter.
///
/// Carries both an accumulated value and a member set; sum-counters use
/// `count`, set-membership counters use `members`. Shards are created
/// lazily per increment and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    /// Counter name this shard belongs to.
    pub name: String,
    /// Free-form tag recorded with the last write (e.g. an event kind).
    pub tag: String,
    /// Shard index within the counter, in `[0, config.shards)`.
    pub index: u32,
    /// Accumulated value of this shard.
    pub count: i64,
    /// Members recorded on this shard, for set-membership counters.
    #[serde(default)]
    pub members: HashSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl Shard {
    /// A fresh, empty shard.
    #[must_use]
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            tag: String::new(),
            index,
            count: 0,
            members: HashSet::new(),
            updated_at: Utc::now(),
        }
    }

    /// Storage key of this shard, `{name}-shard{index}`.
    #[must_use]
    pub fn key(&self) -> String {
        shard_key(&self.name, self.index)
    }
}

/// Storage key of shard `index` of counter `name`.
#[must_use]
pub fn shard_key(name: &str, index: u32) -> String {
    format!("{}-shard{}", name, index)
}

//! Sharded counter store.
//!
//! High-frequency aggregates (order counts, revenue totals, webhook
//! dedupe sets) cannot live in a single row: every writer would serialize
//! on it. A named counter is therefore split across N shards; an
//! increment picks one shard at random and read-modify-writes only that
//! shard, so writers to the same counter almost never meet. The true
//! value is the sum over all shards, served through a short-TTL cache to
//! bound read amplification.
//!
//! Writes are asynchronous: [`ShardedCounter::increment`] enqueues a
//! background job and returns. When a shard write loses an optimistic
//! race, the job grows the counter's shard count by one (lowering future
//! collision probability) and re-schedules itself with a small random
//! delay instead of hammering the same hot shard.

mod cache;
mod jobs;
mod service;
mod shard;

pub use cache::CounterCache;
pub use jobs::{ADD_MEMBER_JOB, AddMemberJob, INCREMENT_JOB, IncrementJob, register_counter_jobs};
pub use service::ShardedCounter;
pub use shard::{DEFAULT_SHARDS, Shard, ShardConfig, shard_key};

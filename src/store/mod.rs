//! Store implementations.
//!
//! In-memory implementations of the storage contracts, for development,
//! testing, and single-instance deployments. Production deployments
//! implement [`LedgerStore`](crate::traits::store::LedgerStore) and
//! [`CounterStore`](crate::traits::store::CounterStore) against a
//! transactional database.

mod in_memory;

pub use in_memory::{InMemoryCounterStore, InMemoryLedgerStore};

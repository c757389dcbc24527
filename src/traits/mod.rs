//! Core trait definitions for pluggable infrastructure.
//!
//! The engine talks to its surroundings exclusively through these traits:
//! tenant-scoped storage for ledger and counter state, and the background
//! job queue that carries settlement and counter work.

pub mod job;
pub mod store;

//! Distributed coordination over the shared store.
//!
//! Everything here reduces to one primitive: a lease row claimed with a
//! single atomic set-if-absent-with-TTL statement. Cluster slots partition
//! the shard space across processes; job locks let identical worker
//! replicas run periodic maintenance as a singleton.

pub mod cluster;
pub mod jobs;
pub mod lease;

pub use cluster::{ClaimedSlot, ShardRange, claim_slot, spawn_heartbeat};
pub use jobs::{JobRunner, MaintenanceJob};

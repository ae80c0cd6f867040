//! Event type definitions.
//!
//! Events are idempotent nudges carrying identifiers at most; processors
//! fetch current state from the database when they act.

/// Emitted by the ingestion path after an accepted event is enqueued.
///
/// Tells the in-process aggregator that work is waiting so it can flush
/// ahead of its fallback interval.
#[derive(Debug, Clone, Copy)]
pub struct ActivityRecorded {
    pub guild_id: i64,
    pub user_id: i64,
}

/// Asks the aggregator to attempt a flush now.
///
/// Sent by the retry path when a flush left the queue non-empty, and by
/// admin tooling.
#[derive(Debug, Clone, Copy)]
pub struct FlushTick;

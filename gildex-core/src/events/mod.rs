//! In-process event plumbing.
//!
//! These channels only nudge loops inside one process; cross-process
//! coordination never depends on them. A lost nudge is repaired by the
//! aggregator's fallback interval tick.

mod channels;
mod types;

pub use channels::{
    ActivityRecordedReceiver, ActivityRecordedSender, EventSenders, FlushTickReceiver,
    FlushTickSender, activity_recorded_channel, flush_tick_channel,
};
pub use types::{ActivityRecorded, FlushTick};

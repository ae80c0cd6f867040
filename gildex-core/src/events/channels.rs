//! Event channel factories and handles.

use super::types::{ActivityRecorded, FlushTick};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// Enough to absorb ingestion bursts while keeping memory bounded; a full
/// channel is acceptable because every nudge is also covered by a timer.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for ActivityRecorded events.
pub type ActivityRecordedSender = mpsc::Sender<ActivityRecorded>;
/// Receiver handle for ActivityRecorded events.
pub type ActivityRecordedReceiver = mpsc::Receiver<ActivityRecorded>;

/// Sender handle for FlushTick events.
pub type FlushTickSender = mpsc::Sender<FlushTick>;
/// Receiver handle for FlushTick events.
pub type FlushTickReceiver = mpsc::Receiver<FlushTick>;

/// Create a new ActivityRecorded channel.
pub fn activity_recorded_channel() -> (ActivityRecordedSender, ActivityRecordedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new FlushTick channel.
pub fn flush_tick_channel() -> (FlushTickSender, FlushTickReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Container for the event senders handed to producers.
#[derive(Clone)]
pub struct EventSenders {
    /// Sender for ActivityRecorded events (ingestion path).
    pub activity_recorded: ActivityRecordedSender,
    /// Sender for FlushTick events (retry path, admin tooling).
    pub flush_tick: FlushTickSender,
}

impl EventSenders {
    pub fn new(
        activity_recorded: ActivityRecordedSender,
        flush_tick: FlushTickSender,
    ) -> Self {
        Self {
            activity_recorded,
            flush_tick,
        }
    }
}

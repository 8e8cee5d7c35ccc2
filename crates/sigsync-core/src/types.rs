use crate::{error::ReaderError, packet::EventPacket};
use indexmap::IndexMap;
use std::fmt;

/// Identifies an attached stream for the lifetime of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Outcome of a read, read-with-domain or skip call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStatus {
    /// Samples were delivered, or none were available before the timeout.
    Ok,
    /// At least one stream has an event at its head; nothing was consumed.
    Event,
    /// The call failed; see [ReadResult::error].
    Fail,
    #[default]
    Unknown,
}

/// The value every read-time call returns instead of an error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResult {
    pub status: ReadStatus,
    /// Common samples delivered or skipped.
    pub count: usize,
    /// Events at stream heads keyed by stream position, when the status is
    /// [ReadStatus::Event].
    pub events: IndexMap<usize, EventPacket>,
    /// Domain value, in common ticks, of the first common sample delivered.
    pub offset: Option<i64>,
    pub error: Option<ReaderError>,
}

impl ReadResult {
    pub(crate) fn ok(count: usize, offset: Option<i64>) -> Self {
        Self {
            status: ReadStatus::Ok,
            count,
            offset,
            ..Default::default()
        }
    }

    pub(crate) fn event(events: IndexMap<usize, EventPacket>) -> Self {
        Self {
            status: ReadStatus::Event,
            events,
            ..Default::default()
        }
    }

    pub(crate) fn fail(error: ReaderError) -> Self {
        Self {
            status: ReadStatus::Fail,
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReadStatus::Ok
    }

    pub fn is_event(&self) -> bool {
        self.status == ReadStatus::Event
    }
}

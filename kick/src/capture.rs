//! Capture/replay observation of kick side effects.
//!
//! A [`CaptureSink`] sees every ticket taken or given back and every write
//! into GPU-visible command memory. The kick path never looks at what the
//! sink does with these events; correctness does not depend on it.

use parking_lot::Mutex;

use crate::sync::{SyncChannel, SyncId};

/// One observed side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A ticket was taken; `value` is the snapshot embedded in the command.
    TicketTaken {
        sync: SyncId,
        channel: SyncChannel,
        value: u32,
    },
    /// A ticket was given back.
    TicketRolledBack { sync: SyncId, channel: SyncChannel },
    /// A command record was published into the command buffer.
    CommandWritten { offset: u32, words: usize },
    /// A published command record was withdrawn after a retry.
    CommandRetracted { offset: u32 },
    /// An entry of the destination sync list was written.
    SyncListEntryWritten { index: usize, bound: bool },
}

/// Observer for capture/replay recording.
pub trait CaptureSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: CaptureEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCapture;

impl CaptureSink for NullCapture {
    fn record(&self, _event: CaptureEvent) {}
}

/// Sink that keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct CaptureLog {
    events: Mutex<Vec<CaptureEvent>>,
}

impl CaptureLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events recorded so far.
    pub fn events(&self) -> Vec<CaptureEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl CaptureSink for CaptureLog {
    fn record(&self, event: CaptureEvent) {
        self.events.lock().push(event);
    }
}

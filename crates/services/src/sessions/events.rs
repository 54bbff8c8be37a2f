use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use headcheck_core::model::{PresentationId, Verdict};

use super::view::PageView;

/// Typed notifications for the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineEvent {
    /// The progress backend failed its probe; nothing will be persisted.
    StorageUnavailable,
    RestoreSucceeded,
    RestoreFailed { reason: String },
    LoadSucceeded,
    LoadFailed { reason: String },
    /// Fires after the fetch finished, whether it succeeded or not.
    LoadDone,
    StoreSucceeded,
    StoreFailed { reason: String },
    RenderCalibration { src: String },
    RenderPage(PageView),
    GatingViolation {
        blocked: PresentationId,
        waiting_on: PresentationId,
    },
    IncompleteTrial(PresentationId),
    PlaybackRequired(PresentationId),
    /// Audio for the trial ended; its response input may be enabled.
    ResponseUnlocked(PresentationId),
    CalibrationPlayed,
    Verdict(Verdict),
}

/// Observer receiving engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Forwards events over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the recorded events.
    pub fn drain(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

mod controller;
mod events;
mod plan;
mod playback;
mod progress;
mod view;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use controller::{ContinueOutcome, Phase, SessionController};
pub use events::{ChannelSink, EngineEvent, EventSink, NoopSink, RecordingSink};
pub use plan::{SamplePlan, Sampler};
pub use playback::{PlaybackLatch, PlaybackTarget, PlaybackToken};
pub use progress::SessionProgress;
pub use view::{PageView, TrialView};

#![forbid(unsafe_code)]

pub mod error;
pub mod fetch;
pub mod sessions;

pub use headcheck_core::Clock;
pub use sessions as session;

pub use error::{FetchError, SessionError};
pub use fetch::{HttpManifestFetcher, ManifestFetcher, StaticManifestFetcher};

pub use sessions::{
    ChannelSink, ContinueOutcome, EngineEvent, EventSink, NoopSink, PageView, Phase,
    PlaybackLatch, PlaybackTarget, PlaybackToken, RecordingSink, SamplePlan, Sampler,
    SessionController, SessionProgress, TrialView,
};

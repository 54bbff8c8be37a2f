mod ids;
mod manifest;
mod session;
mod settings;
mod trial;
mod verdict;

pub use ids::{Answer, ParseIdError, PresentationId, StimulusId};
pub use manifest::{CalibrationSpec, Manifest, ManifestError, StimulusSpec};
pub use session::{SessionParts, SessionState, SessionStateError};
pub use settings::{EngineSettings, EngineSettingsDraft, SettingsError};
pub use trial::{TrialError, TrialState};
pub use verdict::Verdict;

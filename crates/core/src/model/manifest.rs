use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{Answer, StimulusId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ManifestError {
    #[error("malformed manifest: {0}")]
    Malformed(String),

    #[error("manifest contains no stimuli")]
    NoStimuli,

    #[error("stimulus {0} has an empty source")]
    EmptySource(StimulusId),

    #[error("stimulus id cannot be empty")]
    EmptyId,

    #[error("stimulus id {0} appears more than once")]
    DuplicateId(StimulusId),

    #[error("calibration has an empty source")]
    EmptyCalibrationSource,
}

//
// ─── STIMULI ───────────────────────────────────────────────────────────────────
//

/// One test sound and the response that counts as correct for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusSpec {
    pub id: StimulusId,
    pub src: String,
    pub correct: Answer,
}

impl StimulusSpec {
    #[must_use]
    pub fn new(id: StimulusId, src: impl Into<String>, correct: Answer) -> Self {
        Self {
            id,
            src: src.into(),
            correct,
        }
    }
}

/// Warm-up sound used to set playback volume. Never scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationSpec {
    pub src: String,
}

//
// ─── MANIFEST ──────────────────────────────────────────────────────────────────
//

/// Stimulus manifest as published next to the audio files.
///
/// ```
/// # use headcheck_core::model::Manifest;
/// let manifest = Manifest::parse(
///     r#"{"stimuli": [{"id": 1, "src": "a.wav", "correct": 2}],
///         "calibration": {"src": "noise.wav"}}"#,
/// )?;
/// assert_eq!(manifest.stimuli().len(), 1);
/// assert!(manifest.calibration().is_some());
/// # Ok::<(), headcheck_core::model::ManifestError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    stimuli: Vec<StimulusSpec>,
    #[serde(default)]
    calibration: Option<CalibrationSpec>,
}

impl Manifest {
    /// Parse and validate a manifest document.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Malformed` if the JSON does not match the manifest shape,
    /// and the other variants when stimuli are missing, duplicated or lack a source.
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest =
            serde_json::from_str(raw).map_err(|e| ManifestError::Malformed(e.to_string()))?;
        manifest.validate()
    }

    /// Build a manifest from already-typed parts.
    ///
    /// # Errors
    ///
    /// Same validation as [`Manifest::parse`].
    pub fn new(
        stimuli: Vec<StimulusSpec>,
        calibration: Option<CalibrationSpec>,
    ) -> Result<Self, ManifestError> {
        Self {
            stimuli,
            calibration,
        }
        .validate()
    }

    fn validate(self) -> Result<Self, ManifestError> {
        if self.stimuli.is_empty() {
            return Err(ManifestError::NoStimuli);
        }

        let mut seen = HashSet::with_capacity(self.stimuli.len());
        for stimulus in &self.stimuli {
            if stimulus.id.as_str().trim().is_empty() {
                return Err(ManifestError::EmptyId);
            }
            if stimulus.src.trim().is_empty() {
                return Err(ManifestError::EmptySource(stimulus.id.clone()));
            }
            if !seen.insert(&stimulus.id) {
                return Err(ManifestError::DuplicateId(stimulus.id.clone()));
            }
        }

        if let Some(calibration) = &self.calibration {
            if calibration.src.trim().is_empty() {
                return Err(ManifestError::EmptyCalibrationSource);
            }
        }

        Ok(self)
    }

    #[must_use]
    pub fn stimuli(&self) -> &[StimulusSpec] {
        &self.stimuli
    }

    #[must_use]
    pub fn calibration(&self) -> Option<&CalibrationSpec> {
        self.calibration.as_ref()
    }

    /// Look up a stimulus by manifest id.
    #[must_use]
    pub fn stimulus(&self, id: &StimulusId) -> Option<&StimulusSpec> {
        self.stimuli.iter().find(|s| &s.id == id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

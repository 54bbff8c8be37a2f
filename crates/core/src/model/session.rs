use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::{Answer, PresentationId, StimulusId};
use crate::model::manifest::{CalibrationSpec, Manifest, ManifestError, StimulusSpec};
use crate::model::trial::{TrialError, TrialState};
use crate::sequencer::TrialSequencer;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session has no trials")]
    NoTrials,

    #[error("trials per page must be > 0")]
    InvalidTrialsPerPage,

    #[error("trial {index} references unknown stimulus {id}")]
    UnknownStimulus { index: usize, id: StimulusId },

    #[error("trial at position {expected} is stored with index {found}")]
    IndexMismatch { expected: usize, found: usize },

    #[error("page {page} is out of range (last page {last_page})")]
    PageOutOfRange { page: usize, last_page: usize },

    #[error("no trial with index {index}")]
    UnknownTrial { index: usize },

    #[error("already on the last page")]
    LastPage,

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Trial(#[from] TrialError),
}

/// Raw parts of a persisted session, validated by [`SessionState::from_persisted`].
#[derive(Debug, Clone)]
pub struct SessionParts {
    pub session_id: Uuid,
    pub trials_per_page: usize,
    pub page: usize,
    pub trials: Vec<TrialState>,
    pub manifest_raw: String,
    pub calibration: Option<CalibrationSpec>,
    pub calibration_acknowledged: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Everything needed to resume a headphone check after a reload.
///
/// The trial order is fixed at construction. The manifest document is kept
/// verbatim so a restored session never has to fetch it again.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    session_id: Uuid,
    trials_per_page: usize,
    page: usize,
    trials: Vec<TrialState>,
    manifest: Manifest,
    manifest_raw: String,
    calibration: Option<CalibrationSpec>,
    calibration_acknowledged: bool,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Start a session over the sampled stimuli, in the given order.
    ///
    /// `calibration` is only kept when the manifest provides one.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NoTrials` for an empty selection,
    /// `InvalidTrialsPerPage` for a zero page size, and `UnknownStimulus` if a
    /// selected stimulus is not part of the manifest.
    pub fn new(
        manifest_raw: String,
        manifest: Manifest,
        selected: &[StimulusSpec],
        trials_per_page: usize,
        calibration: bool,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionStateError> {
        if trials_per_page == 0 {
            return Err(SessionStateError::InvalidTrialsPerPage);
        }
        if selected.is_empty() {
            return Err(SessionStateError::NoTrials);
        }

        let mut trials = Vec::with_capacity(selected.len());
        for (index, stimulus) in selected.iter().enumerate() {
            if manifest.stimulus(&stimulus.id).is_none() {
                return Err(SessionStateError::UnknownStimulus {
                    index,
                    id: stimulus.id.clone(),
                });
            }
            trials.push(TrialState::new(index, stimulus.id.clone()));
        }

        let calibration = if calibration {
            manifest.calibration().cloned()
        } else {
            None
        };

        Ok(Self {
            session_id: Uuid::new_v4(),
            trials_per_page,
            page: 0,
            trials,
            manifest,
            manifest_raw,
            calibration,
            calibration_acknowledged: false,
            started_at,
            completed_at: None,
        })
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// The manifest is parsed again from `manifest_raw`; every trial must point at
    /// one of its stimuli.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the manifest no longer parses, trial indices are
    /// not `0..n` in order, a trial references an unknown stimulus, or the page is out
    /// of range.
    pub fn from_persisted(parts: SessionParts) -> Result<Self, SessionStateError> {
        let manifest = Manifest::parse(&parts.manifest_raw)?;

        if parts.trials_per_page == 0 {
            return Err(SessionStateError::InvalidTrialsPerPage);
        }
        if parts.trials.is_empty() {
            return Err(SessionStateError::NoTrials);
        }
        for (expected, trial) in parts.trials.iter().enumerate() {
            if trial.index() != expected {
                return Err(SessionStateError::IndexMismatch {
                    expected,
                    found: trial.index(),
                });
            }
            if manifest.stimulus(trial.stimulus_id()).is_none() {
                return Err(SessionStateError::UnknownStimulus {
                    index: expected,
                    id: trial.stimulus_id().clone(),
                });
            }
        }

        let last_page = parts.trials.len().div_ceil(parts.trials_per_page);
        if parts.page >= last_page {
            return Err(SessionStateError::PageOutOfRange {
                page: parts.page,
                last_page,
            });
        }
        if let Some(completed_at) = parts.completed_at {
            if completed_at < parts.started_at {
                return Err(SessionStateError::InvalidTimeRange);
            }
        }

        Ok(Self {
            session_id: parts.session_id,
            trials_per_page: parts.trials_per_page,
            page: parts.page,
            trials: parts.trials,
            manifest,
            manifest_raw: parts.manifest_raw,
            calibration: parts.calibration,
            calibration_acknowledged: parts.calibration_acknowledged,
            started_at: parts.started_at,
            completed_at: parts.completed_at,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn trials_per_page(&self) -> usize {
        self.trials_per_page
    }

    /// Current page, 0-based.
    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    /// Number of pages, `ceil(trials / trials_per_page)`.
    #[must_use]
    pub fn last_page(&self) -> usize {
        self.trials.len().div_ceil(self.trials_per_page)
    }

    #[must_use]
    pub fn trials(&self) -> &[TrialState] {
        &self.trials
    }

    #[must_use]
    pub fn trial(&self, index: usize) -> Option<&TrialState> {
        self.trials.get(index)
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn manifest_raw(&self) -> &str {
        &self.manifest_raw
    }

    #[must_use]
    pub fn calibration(&self) -> Option<&CalibrationSpec> {
        self.calibration.as_ref()
    }

    #[must_use]
    pub fn calibration_acknowledged(&self) -> bool {
        self.calibration_acknowledged
    }

    /// True while a calibration sound exists and has not been confirmed.
    #[must_use]
    pub fn needs_calibration(&self) -> bool {
        self.calibration.is_some() && !self.calibration_acknowledged
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn sequencer(&self) -> TrialSequencer {
        TrialSequencer::for_session(self.trials.len(), self.trials_per_page)
    }

    /// Stimulus presented by the trial at `index`.
    #[must_use]
    pub fn stimulus_for(&self, index: usize) -> Option<&StimulusSpec> {
        let trial = self.trials.get(index)?;
        self.manifest.stimulus(trial.stimulus_id())
    }

    /// Resolve a presentation id to its trial, checking the stimulus matches.
    #[must_use]
    pub fn resolve(&self, id: &PresentationId) -> Option<&TrialState> {
        self.trials
            .get(id.index())
            .filter(|trial| trial.stimulus_id() == id.stimulus_id())
    }

    /// Trials on the current page that have no answer yet.
    #[must_use]
    pub fn unanswered_on_page(&self) -> Vec<PresentationId> {
        self.sequencer()
            .trials_on_page(self.page)
            .filter_map(|i| self.trials.get(i))
            .filter(|trial| !trial.has_answer())
            .map(TrialState::presentation_id)
            .collect()
    }

    /// Every trial on the current page has an answer.
    #[must_use]
    pub fn can_continue(&self) -> bool {
        self.unanswered_on_page().is_empty()
    }

    /// Record a pending answer for a trial.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::UnknownTrial` for an out-of-range index and
    /// `SessionStateError::Trial` if the trial is already scored.
    pub fn select(&mut self, index: usize, answer: Answer) -> Result<(), SessionStateError> {
        let trial = self
            .trials
            .get_mut(index)
            .ok_or(SessionStateError::UnknownTrial { index })?;
        trial.select(answer)?;
        Ok(())
    }

    pub fn acknowledge_calibration(&mut self) {
        self.calibration_acknowledged = true;
    }

    /// Move to the next page.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::LastPage` when already on the final page.
    pub fn advance_page(&mut self) -> Result<usize, SessionStateError> {
        if self.page + 1 >= self.last_page() {
            return Err(SessionStateError::LastPage);
        }
        self.page += 1;
        Ok(self.page)
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.completed_at = Some(at);
    }

    /// Mutable trial together with the stimulus it presents.
    pub fn trial_with_stimulus_mut(
        &mut self,
        index: usize,
    ) -> Option<(&mut TrialState, &StimulusSpec)> {
        let trial = self.trials.get_mut(index)?;
        let stimulus = self.manifest.stimulus(trial.stimulus_id())?;
        Some((trial, stimulus))
    }
}

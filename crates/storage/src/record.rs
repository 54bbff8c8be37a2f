use chrono::{DateTime, Utc};
use headcheck_core::model::{
    Answer, CalibrationSpec, SessionParts, SessionState, SessionStateError, StimulusId,
    TrialState,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StorageError;

/// Persisted shape of one trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub index: usize,
    pub stimulus_id: StimulusId,
    #[serde(default)]
    pub selection: Option<Answer>,
    #[serde(default)]
    pub response: Option<Answer>,
    #[serde(default)]
    pub score: Option<u8>,
}

/// Persisted shape of a whole session, written as a single JSON blob.
///
/// This mirrors the domain `SessionState` so the store can serialize it
/// without leaking serde concerns into the domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub trials_per_page: usize,
    pub page: usize,
    pub trials: Vec<TrialRecord>,
    pub manifest_raw: String,
    #[serde(default)]
    pub calibration: Option<CalibrationSpec>,
    #[serde(default)]
    pub calibration_acknowledged: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    #[must_use]
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            session_id: state.session_id(),
            trials_per_page: state.trials_per_page(),
            page: state.page(),
            trials: state
                .trials()
                .iter()
                .map(|trial| TrialRecord {
                    index: trial.index(),
                    stimulus_id: trial.stimulus_id().clone(),
                    selection: trial.selection().cloned(),
                    response: trial.response().cloned(),
                    score: trial.score(),
                })
                .collect(),
            manifest_raw: state.manifest_raw().to_owned(),
            calibration: state.calibration().cloned(),
            calibration_acknowledged: state.calibration_acknowledged(),
            started_at: state.started_at(),
            completed_at: state.completed_at(),
        }
    }

    /// Convert the record back into a domain `SessionState`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if a trial or the session fails validation.
    pub fn into_state(self) -> Result<SessionState, SessionStateError> {
        let trials = self
            .trials
            .into_iter()
            .map(|t| TrialState::from_persisted(t.index, t.stimulus_id, t.selection, t.response, t.score))
            .collect::<Result<Vec<_>, _>>()?;

        SessionState::from_persisted(SessionParts {
            session_id: self.session_id,
            trials_per_page: self.trials_per_page,
            page: self.page,
            trials,
            manifest_raw: self.manifest_raw,
            calibration: self.calibration,
            calibration_acknowledged: self.calibration_acknowledged,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if `raw` is not a session record.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headcheck_core::model::Manifest;
    use headcheck_core::scorer::Scorer;
    use headcheck_core::time::fixed_now;

    const RAW: &str = r#"{"stimuli": [
        {"id": 1, "src": "one.wav", "correct": 1},
        {"id": 2, "src": "two.wav", "correct": 2}
    ]}"#;

    fn scored_state() -> SessionState {
        let manifest = Manifest::parse(RAW).unwrap();
        let selected = manifest.stimuli().to_vec();
        let mut state =
            SessionState::new(RAW.to_string(), manifest, &selected, 1, false, fixed_now())
                .unwrap();
        state.select(0, Answer::new("1")).unwrap();
        let (trial, stimulus) = state.trial_with_stimulus_mut(0).unwrap();
        let response = trial.selection().cloned();
        Scorer::score(trial, stimulus, response.as_ref()).unwrap();
        state.advance_page().unwrap();
        state
    }

    #[test]
    fn record_round_trips_through_json() {
        let state = scored_state();
        let json = SessionRecord::from_state(&state).to_json().unwrap();
        let restored = SessionRecord::from_json(&json).unwrap().into_state().unwrap();

        assert_eq!(restored, state);
        assert_eq!(restored.page(), 1);
        assert_eq!(restored.trials()[0].score(), Some(1));
        assert_eq!(restored.trials()[0].response(), Some(&Answer::new("1")));
    }

    #[test]
    fn invalid_trial_record_is_rejected() {
        let mut record = SessionRecord::from_state(&scored_state());
        record.trials[0].response = None;
        assert!(matches!(
            record.into_state().unwrap_err(),
            SessionStateError::Trial(_)
        ));
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(
            SessionRecord::from_json("{\"page\": \"x\"}"),
            Err(StorageError::Serialization(_))
        ));
    }
}

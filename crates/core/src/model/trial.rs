use thiserror::Error;

use crate::model::ids::{Answer, PresentationId, StimulusId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrialError {
    #[error("trial {index}: score and response must be recorded together")]
    ScoreWithoutResponse { index: usize },

    #[error("trial {index}: score must be 0 or 1, got {score}")]
    InvalidScore { index: usize, score: u8 },

    #[error("trial {index}: response already recorded")]
    Locked { index: usize },

    #[error("trial {index}: selection differs from the recorded response")]
    SelectionMismatch { index: usize },
}

/// Progress of one presented stimulus.
///
/// `selection` is the participant's current choice and may change until the
/// page is continued. `response` and `score` are written together, once, when
/// the trial is scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialState {
    index: usize,
    stimulus_id: StimulusId,
    selection: Option<Answer>,
    response: Option<Answer>,
    score: Option<u8>,
}

impl TrialState {
    #[must_use]
    pub fn new(index: usize, stimulus_id: StimulusId) -> Self {
        Self {
            index,
            stimulus_id,
            selection: None,
            response: None,
            score: None,
        }
    }

    /// Rehydrate a trial from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `TrialError::ScoreWithoutResponse` if only one of `response`/`score` is set,
    /// `TrialError::InvalidScore` if the score is not 0 or 1, and
    /// `TrialError::SelectionMismatch` if a scored trial holds a different selection.
    /// A scored trial without a selection takes its response as the selection.
    pub fn from_persisted(
        index: usize,
        stimulus_id: StimulusId,
        selection: Option<Answer>,
        response: Option<Answer>,
        score: Option<u8>,
    ) -> Result<Self, TrialError> {
        if response.is_some() != score.is_some() {
            return Err(TrialError::ScoreWithoutResponse { index });
        }
        if let Some(score) = score {
            if score > 1 {
                return Err(TrialError::InvalidScore { index, score });
            }
        }
        let selection = match (selection, &response) {
            (Some(selected), Some(recorded)) if selected != *recorded => {
                return Err(TrialError::SelectionMismatch { index });
            }
            (selection, response) => selection.or_else(|| response.clone()),
        };
        Ok(Self {
            index,
            stimulus_id,
            selection,
            response,
            score,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn stimulus_id(&self) -> &StimulusId {
        &self.stimulus_id
    }

    #[must_use]
    pub fn presentation_id(&self) -> PresentationId {
        PresentationId::new(self.index, self.stimulus_id.clone())
    }

    #[must_use]
    pub fn selection(&self) -> Option<&Answer> {
        self.selection.as_ref()
    }

    #[must_use]
    pub fn response(&self) -> Option<&Answer> {
        self.response.as_ref()
    }

    #[must_use]
    pub fn score(&self) -> Option<u8> {
        self.score
    }

    #[must_use]
    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    /// True once the participant has picked an answer, scored or not.
    #[must_use]
    pub fn has_answer(&self) -> bool {
        self.selection.is_some() || self.response.is_some()
    }

    /// Record the participant's current choice.
    ///
    /// # Errors
    ///
    /// Returns `TrialError::Locked` once the trial has been scored.
    pub fn select(&mut self, answer: Answer) -> Result<(), TrialError> {
        if self.is_scored() {
            return Err(TrialError::Locked { index: self.index });
        }
        self.selection = Some(answer);
        Ok(())
    }

    pub(crate) fn record(&mut self, response: Answer, score: u8) {
        self.selection = Some(response.clone());
        self.response = Some(response);
        self.score = Some(score);
    }
}

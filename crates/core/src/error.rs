use thiserror::Error;

use crate::model::{ManifestError, SessionStateError, SettingsError, TrialError};
use crate::scorer::ScoreError;
use crate::sequencer::SequencerError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error(transparent)]
    Trial(#[from] TrialError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

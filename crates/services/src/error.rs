//! Shared error types for the services crate.

use thiserror::Error;

use headcheck_core::model::{ManifestError, PresentationId, SessionStateError};
use headcheck_core::scorer::ScoreError;
use headcheck_core::sequencer::GatingViolation;
use storage::repository::StorageError;

/// Errors emitted by manifest fetchers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("invalid manifest location {location}: {reason}")]
    InvalidLocation { location: String, reason: String },
    #[error("manifest request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("no manifest registered for {0}")]
    NotFound(String),
}

/// Errors emitted by the session controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("manifest could not be fetched: {0}")]
    ManifestFetchFailed(#[source] FetchError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    GatingViolation(#[from] GatingViolation),
    #[error("{0} must be played before it can be answered")]
    PlaybackRequired(PresentationId),
    #[error("{0} has already been played")]
    AlreadyPlayed(PresentationId),
    #[error("{0} is already scored")]
    TrialLocked(PresentationId),
    #[error("{0} is not on the current page")]
    NotOnPage(PresentationId),
    #[error("no trial matches {0}")]
    UnknownTrial(PresentationId),
    #[error("calibration sound has not been played")]
    CalibrationNotPlayed,
    #[error("operation not allowed while {phase}")]
    InvalidPhase { phase: &'static str },
    #[error("session already completed")]
    Completed,
}

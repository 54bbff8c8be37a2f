use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use headcheck_core::Clock;
use headcheck_core::model::{
    Answer, EngineSettings, Manifest, PresentationId, SessionState, TrialState, Verdict,
};
use headcheck_core::scorer::Scorer;
use storage::repository::KeyValueBackend;
use storage::{ProgressStore, SaveOutcome};

use super::events::{EngineEvent, EventSink};
use super::plan::Sampler;
use super::playback::{PlaybackLatch, PlaybackTarget, PlaybackToken};
use super::progress::SessionProgress;
use super::view::{PageView, TrialView};
use crate::error::SessionError;
use crate::fetch::ManifestFetcher;

//
// ─── PHASES AND OUTCOMES ───────────────────────────────────────────────────────
//

/// Where the controller is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    Calibrating,
    Presenting { page: usize },
    Completed,
}

impl Phase {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Calibrating => "calibrating",
            Self::Presenting { .. } => "presenting",
            Self::Completed => "completed",
        }
    }
}

/// Result of a continue action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinueOutcome {
    /// The page was scored and the next one is now shown.
    Advanced { page: usize },
    /// The last page was scored and the verdict issued.
    Completed(Verdict),
    /// Nothing changed; these trials still need an answer.
    Incomplete { missing: Vec<PresentationId> },
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Drives one headphone check from manifest to verdict.
///
/// Every operation runs to completion on `&mut self`. State changes that should
/// survive a reload are saved right away; save failures are reported as events
/// and never abort the operation.
pub struct SessionController {
    settings: EngineSettings,
    clock: Clock,
    fetcher: Arc<dyn ManifestFetcher>,
    backend: Arc<dyn KeyValueBackend>,
    sink: Arc<dyn EventSink>,
    sampler: Sampler,
    latch: PlaybackLatch,
    store: Option<ProgressStore>,
    phase: Phase,
    state: Option<SessionState>,
    /// Trials whose sound played to the end.
    played: HashSet<usize>,
    calibration_played: bool,
    verdict: Option<Verdict>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        settings: EngineSettings,
        fetcher: Arc<dyn ManifestFetcher>,
        backend: Arc<dyn KeyValueBackend>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            settings,
            clock: Clock::default(),
            fetcher,
            backend,
            sink,
            sampler: Sampler::from_entropy(),
            latch: PlaybackLatch::new(),
            store: None,
            phase: Phase::Uninitialized,
            state: None,
            played: HashSet::new(),
            calibration_played: false,
            verdict: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    //
    // ─── ACCESSORS ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    #[must_use]
    pub fn latch(&self) -> &PlaybackLatch {
        &self.latch
    }

    /// False when persistence is off or the backend failed its probe.
    #[must_use]
    pub fn is_persisting(&self) -> bool {
        self.store.as_ref().is_some_and(ProgressStore::is_available)
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        let state = self.state.as_ref()?;
        Some(SessionProgress {
            total: state.trials().len(),
            answered: state.trials().iter().filter(|t| t.has_answer()).count(),
            scored: state.trials().iter().filter(|t| t.is_scored()).count(),
            page: state.page(),
            last_page: state.last_page(),
            is_complete: state.is_complete(),
        })
    }

    /// Render request for the current page.
    #[must_use]
    pub fn page_view(&self) -> Option<PageView> {
        let state = self.state.as_ref()?;
        let sequencer = state.sequencer();
        let trials = sequencer
            .trials_on_page(state.page())
            .filter_map(|index| {
                let trial = state.trial(index)?;
                let stimulus = state.stimulus_for(index)?;
                Some(TrialView {
                    id: trial.presentation_id(),
                    src: stimulus.src.clone(),
                    selection: trial.selection().cloned(),
                    locked: trial.is_scored(),
                })
            })
            .collect();
        Some(PageView {
            page: state.page(),
            last_page: state.last_page(),
            is_last_page: sequencer.is_last_page(state.page()),
            trials,
        })
    }

    //
    // ─── LOADING ──────────────────────────────────────────────────────────────
    //

    /// Begin the session: restore saved progress or fetch and sample a manifest.
    ///
    /// With `use_cache` off the progress store is neither read nor written for the
    /// whole session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ManifestFetchFailed` or `SessionError::Manifest` when no
    /// trials can be built; the controller then returns to `Uninitialized`.
    /// Returns `SessionError::InvalidPhase` if the session was already started.
    pub async fn start(&mut self, location: &str, use_cache: bool) -> Result<Phase, SessionError> {
        if self.phase != Phase::Uninitialized {
            return Err(self.invalid_phase());
        }
        self.phase = Phase::Loading;
        debug!(location, use_cache, "session loading");

        self.store = if use_cache {
            let store =
                ProgressStore::open(Arc::clone(&self.backend), self.settings.storage_key()).await;
            if !store.is_available() {
                self.sink.emit(EngineEvent::StorageUnavailable);
            }
            Some(store)
        } else {
            None
        };

        if let Some(state) = self.restore().await {
            self.state = Some(state);
            self.enter_current_phase();
            return Ok(self.phase);
        }

        match self.load_fresh(location).await {
            Ok(state) => {
                self.state = Some(state);
                self.persist().await;
                self.enter_current_phase();
                Ok(self.phase)
            }
            Err(err) => {
                self.phase = Phase::Uninitialized;
                Err(err)
            }
        }
    }

    async fn restore(&self) -> Option<SessionState> {
        let store = self.store.as_ref()?;
        match store.load().await {
            Ok(Some(state)) => {
                self.sink.emit(EngineEvent::RestoreSucceeded);
                Some(state)
            }
            Ok(None) => {
                self.sink.emit(EngineEvent::RestoreFailed {
                    reason: "no saved session".into(),
                });
                None
            }
            Err(err) => {
                warn!(error = %err, "saved session could not be restored");
                self.sink.emit(EngineEvent::RestoreFailed {
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    async fn load_fresh(&mut self, location: &str) -> Result<SessionState, SessionError> {
        let fetched = self.fetcher.fetch(location).await;
        let parsed = fetched
            .map_err(SessionError::ManifestFetchFailed)
            .and_then(|raw| Ok((Manifest::parse(&raw)?, raw)));

        let (manifest, raw) = match parsed {
            Ok(pair) => {
                self.sink.emit(EngineEvent::LoadSucceeded);
                self.sink.emit(EngineEvent::LoadDone);
                pair
            }
            Err(err) => {
                warn!(location, error = %err, "manifest load failed");
                self.sink.emit(EngineEvent::LoadFailed {
                    reason: err.to_string(),
                });
                self.sink.emit(EngineEvent::LoadDone);
                return Err(err);
            }
        };

        let count = usize::try_from(self.settings.total_trials()).unwrap_or(usize::MAX);
        let plan = self.sampler.select(
            manifest.stimuli(),
            count,
            self.settings.sample_with_replacement(),
            self.settings.shuffle_trials(),
        );

        let calibrate = self.settings.do_calibration();
        if calibrate && manifest.calibration().is_none() {
            warn!(location, "calibration enabled but manifest has no calibration sound");
        }
        let per_page = usize::try_from(self.settings.trials_per_page()).unwrap_or(usize::MAX);

        let state = SessionState::new(
            raw,
            manifest,
            &plan.stimuli,
            per_page,
            calibrate,
            self.clock.now(),
        )?;
        debug!(
            session_id = %state.session_id(),
            trials = state.trials().len(),
            last_page = state.last_page(),
            "session sampled"
        );
        Ok(state)
    }

    fn enter_current_phase(&mut self) {
        let Some(state) = self.state.as_ref() else {
            self.phase = Phase::Uninitialized;
            return;
        };

        if let Some(completed_at) = state.completed_at() {
            let verdict =
                Verdict::from_trials(state.trials(), self.settings.correct_threshold(), completed_at);
            self.phase = Phase::Completed;
            self.verdict = Some(verdict.clone());
            self.sink.emit(EngineEvent::Verdict(verdict));
        } else if let Some(calibration) = state.calibration().filter(|_| state.needs_calibration()) {
            self.phase = Phase::Calibrating;
            self.sink.emit(EngineEvent::RenderCalibration {
                src: calibration.src.clone(),
            });
        } else {
            self.phase = Phase::Presenting { page: state.page() };
            self.render_page();
        }
        debug!(phase = self.phase.name(), "session phase entered");
    }

    //
    // ─── CALIBRATION ──────────────────────────────────────────────────────────
    //

    /// Start the calibration sound. It may be replayed any number of times.
    ///
    /// Returns `Ok(None)` while another sound is still playing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPhase` outside of calibration.
    pub fn play_calibration(&mut self) -> Result<Option<PlaybackToken>, SessionError> {
        if self.phase != Phase::Calibrating {
            return Err(self.invalid_phase());
        }
        let src = self
            .state
            .as_ref()
            .and_then(SessionState::calibration)
            .map(|c| c.src.clone())
            .ok_or_else(|| self.invalid_phase())?;
        Ok(self.latch.try_acquire(PlaybackTarget::Calibration, src))
    }

    /// Confirm calibration and show the first page.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::CalibrationNotPlayed` until the calibration sound has
    /// finished at least once, and `SessionError::InvalidPhase` outside of calibration.
    pub async fn finish_calibration(&mut self) -> Result<Phase, SessionError> {
        if self.phase != Phase::Calibrating {
            return Err(self.invalid_phase());
        }
        if !self.calibration_played {
            return Err(SessionError::CalibrationNotPlayed);
        }
        self.session_mut()?.acknowledge_calibration();
        self.persist().await;
        self.enter_current_phase();
        Ok(self.phase)
    }

    //
    // ─── PLAYBACK ─────────────────────────────────────────────────────────────
    //

    /// Start playing a trial's sound.
    ///
    /// Returns `Ok(None)` while another sound is still playing; nothing changes.
    /// A trial only counts as played once [`Self::playback_ended`] reports it, so
    /// an abandoned token leaves the trial playable.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::GatingViolation` when sequential play requires the
    /// previous trial to be answered first, `SessionError::AlreadyPlayed` once the
    /// trial has played to the end, and `NotOnPage`/`UnknownTrial` for a bad id.
    pub fn start_playback(
        &mut self,
        id: &PresentationId,
    ) -> Result<Option<PlaybackToken>, SessionError> {
        let index = self.trial_on_page(id)?;
        if self.played.contains(&index) {
            return Err(SessionError::AlreadyPlayed(id.clone()));
        }

        let state = self.session()?;
        if let Err(violation) =
            state
                .sequencer()
                .check_playback(state.trials(), index, self.settings.use_sequential())
        {
            debug!(%violation, "playback gated");
            self.sink.emit(EngineEvent::GatingViolation {
                blocked: violation.blocked.clone(),
                waiting_on: violation.waiting_on.clone(),
            });
            return Err(violation.into());
        }
        let src = state
            .stimulus_for(index)
            .map(|s| s.src.clone())
            .ok_or_else(|| SessionError::UnknownTrial(id.clone()))?;

        let Some(token) = self.latch.try_acquire(PlaybackTarget::Trial(index), src) else {
            debug!(trial = %id, "playback already in progress");
            return Ok(None);
        };
        Ok(Some(token))
    }

    /// Report that the audio behind `token` finished playing.
    ///
    /// Tokens handed out before the last [`Self::reset`] are released and ignored.
    pub fn playback_ended(&mut self, token: PlaybackToken) {
        if !self.latch.issued(&token) {
            debug!(playback = ?token.target(), "stale playback token ignored");
            return;
        }
        match token.target() {
            PlaybackTarget::Calibration => {
                self.calibration_played = true;
                self.sink.emit(EngineEvent::CalibrationPlayed);
            }
            PlaybackTarget::Trial(index) => {
                self.played.insert(index);
                if let Some(trial) = self.state.as_ref().and_then(|s| s.trial(index)) {
                    self.sink
                        .emit(EngineEvent::ResponseUnlocked(trial.presentation_id()));
                }
            }
        }
        drop(token);
    }

    //
    // ─── RESPONSES ────────────────────────────────────────────────────────────
    //

    /// Record the participant's current choice for a trial on this page.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PlaybackRequired` if playback must finish first,
    /// `SessionError::TrialLocked` if the trial is already scored, and
    /// `NotOnPage`/`UnknownTrial` for a bad id.
    pub async fn select_response(
        &mut self,
        id: &PresentationId,
        answer: Answer,
    ) -> Result<(), SessionError> {
        let index = self.trial_on_page(id)?;
        if self.session()?.trial(index).is_some_and(TrialState::is_scored) {
            return Err(SessionError::TrialLocked(id.clone()));
        }
        if self.settings.require_playback() && !self.played.contains(&index) {
            self.sink.emit(EngineEvent::PlaybackRequired(id.clone()));
            return Err(SessionError::PlaybackRequired(id.clone()));
        }
        self.session_mut()?.select(index, answer)?;
        self.persist().await;
        Ok(())
    }

    /// Score the current page and move on, or report what is still missing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after the verdict, `InvalidPhase` before the
    /// first page, and `SessionError::Score` if a trial cannot be scored.
    pub async fn continue_page(&mut self) -> Result<ContinueOutcome, SessionError> {
        let page = self.require_presenting()?;

        let missing = self.session()?.unanswered_on_page();
        if !missing.is_empty() {
            debug!(page, missing = missing.len(), "page incomplete");
            for id in &missing {
                self.sink.emit(EngineEvent::IncompleteTrial(id.clone()));
            }
            return Ok(ContinueOutcome::Incomplete { missing });
        }

        let threshold = self.settings.correct_threshold();
        let now = self.clock.now();
        let state = self.session_mut()?;
        let sequencer = state.sequencer();
        for index in sequencer.trials_on_page(page) {
            if let Some((trial, stimulus)) = state.trial_with_stimulus_mut(index) {
                let response = trial.selection().cloned();
                Scorer::score(trial, stimulus, response.as_ref())?;
            }
        }

        if sequencer.is_last_page(page) {
            state.mark_completed(now);
            let verdict = Verdict::from_trials(state.trials(), threshold, now);
            debug!(
                passed = verdict.passed,
                total_correct = verdict.total_correct,
                "session completed"
            );
            self.phase = Phase::Completed;
            self.verdict = Some(verdict.clone());
            self.persist().await;
            self.sink.emit(EngineEvent::Verdict(verdict.clone()));
            return Ok(ContinueOutcome::Completed(verdict));
        }

        let next = state.advance_page()?;
        self.phase = Phase::Presenting { page: next };
        self.persist().await;
        debug!(page = next, "page advanced");
        self.render_page();
        Ok(ContinueOutcome::Advanced { page: next })
    }

    /// Drop the in-memory session. Saved progress is left untouched.
    ///
    /// The playback latch moves to a new generation, so tokens still out from the
    /// dropped session neither hold playback nor unlock responses.
    pub fn reset(&mut self) {
        debug!(phase = self.phase.name(), "session reset");
        self.phase = Phase::Uninitialized;
        self.state = None;
        self.store = None;
        self.latch = self.latch.next_generation();
        self.played.clear();
        self.calibration_played = false;
        self.verdict = None;
    }

    //
    // ─── HELPERS ──────────────────────────────────────────────────────────────
    //

    fn invalid_phase(&self) -> SessionError {
        match self.phase {
            Phase::Completed => SessionError::Completed,
            phase => SessionError::InvalidPhase {
                phase: phase.name(),
            },
        }
    }

    fn require_presenting(&self) -> Result<usize, SessionError> {
        match self.phase {
            Phase::Presenting { page } => Ok(page),
            _ => Err(self.invalid_phase()),
        }
    }

    fn session(&self) -> Result<&SessionState, SessionError> {
        self.state.as_ref().ok_or_else(|| self.invalid_phase())
    }

    fn session_mut(&mut self) -> Result<&mut SessionState, SessionError> {
        let phase = self.phase.name();
        self.state
            .as_mut()
            .ok_or(SessionError::InvalidPhase { phase })
    }

    fn trial_on_page(&self, id: &PresentationId) -> Result<usize, SessionError> {
        let page = self.require_presenting()?;
        let state = self.session()?;
        let trial = state
            .resolve(id)
            .ok_or_else(|| SessionError::UnknownTrial(id.clone()))?;
        if !state.sequencer().trials_on_page(page).contains(&trial.index()) {
            return Err(SessionError::NotOnPage(id.clone()));
        }
        Ok(trial.index())
    }

    fn render_page(&self) {
        if let Some(view) = self.page_view() {
            self.sink.emit(EngineEvent::RenderPage(view));
        }
    }

    async fn persist(&self) {
        let (Some(store), Some(state)) = (&self.store, &self.state) else {
            return;
        };
        match store.save(state).await {
            Ok(SaveOutcome::Stored) => self.sink.emit(EngineEvent::StoreSucceeded),
            Ok(SaveOutcome::Skipped) => {}
            Err(err) => {
                warn!(session_id = %state.session_id(), error = %err, "progress save failed");
                self.sink.emit(EngineEvent::StoreFailed {
                    reason: err.to_string(),
                });
            }
        }
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("phase", &self.phase)
            .field("session_id", &self.state.as_ref().map(SessionState::session_id))
            .field("store", &self.store)
            .field("latch", &self.latch)
            .finish_non_exhaustive()
    }
}

use std::ops::Range;
use thiserror::Error;

use crate::model::{PresentationId, TrialState};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequencerError {
    #[error("trials per page must be > 0")]
    InvalidTrialsPerPage,
}

/// Refused playback: the previous trial has not been answered yet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{blocked} cannot play before {waiting_on} is answered")]
pub struct GatingViolation {
    pub blocked: PresentationId,
    pub waiting_on: PresentationId,
}

/// Splits the trial list into pages and applies the sequential-unlock rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialSequencer {
    total: usize,
    per_page: usize,
}

impl TrialSequencer {
    /// # Errors
    ///
    /// Returns `SequencerError::InvalidTrialsPerPage` if `per_page` is zero.
    pub fn new(total: usize, per_page: usize) -> Result<Self, SequencerError> {
        if per_page == 0 {
            return Err(SequencerError::InvalidTrialsPerPage);
        }
        Ok(Self { total, per_page })
    }

    // `SessionState` already rejects a zero page size.
    pub(crate) fn for_session(total: usize, per_page: usize) -> Self {
        Self {
            total,
            per_page: per_page.max(1),
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Number of pages.
    #[must_use]
    pub fn last_page(&self) -> usize {
        self.total.div_ceil(self.per_page)
    }

    /// Trial indices shown on page `page`, clipped to the trial count.
    #[must_use]
    pub fn trials_on_page(&self, page: usize) -> Range<usize> {
        let start = page.saturating_mul(self.per_page).min(self.total);
        let end = start.saturating_add(self.per_page).min(self.total);
        start..end
    }

    #[must_use]
    pub fn is_last_page(&self, page: usize) -> bool {
        page + 1 == self.last_page()
    }

    #[must_use]
    pub fn page_of(&self, index: usize) -> Option<usize> {
        (index < self.total).then(|| index / self.per_page)
    }

    /// Check whether trial `index` may start playing.
    ///
    /// With `sequential` set, trial `i > 0` waits until trial `i - 1` has an
    /// answer or a score restored from a previous visit. Trial 0 never waits.
    ///
    /// # Errors
    ///
    /// Returns `GatingViolation` naming both trials when playback must be refused.
    pub fn check_playback(
        &self,
        trials: &[TrialState],
        index: usize,
        sequential: bool,
    ) -> Result<(), GatingViolation> {
        if !sequential || index == 0 {
            return Ok(());
        }
        let (Some(previous), Some(current)) = (trials.get(index - 1), trials.get(index)) else {
            return Ok(());
        };
        if previous.has_answer() || previous.is_scored() {
            return Ok(());
        }
        Err(GatingViolation {
            blocked: current.presentation_id(),
            waiting_on: previous.presentation_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, StimulusId};

    fn trials(n: usize) -> Vec<TrialState> {
        (0..n)
            .map(|i| TrialState::new(i, StimulusId::new(format!("{}", i + 1))))
            .collect()
    }

    #[test]
    fn pages_are_clipped_to_trial_count() {
        let seq = TrialSequencer::new(5, 2).unwrap();
        assert_eq!(seq.last_page(), 3);
        assert_eq!(seq.trials_on_page(0), 0..2);
        assert_eq!(seq.trials_on_page(2), 4..5);
        assert!(seq.trials_on_page(3).is_empty());
        assert!(seq.is_last_page(2));
        assert!(!seq.is_last_page(1));
        assert_eq!(seq.page_of(3), Some(1));
        assert_eq!(seq.page_of(5), None);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert_eq!(
            TrialSequencer::new(3, 0).unwrap_err(),
            SequencerError::InvalidTrialsPerPage
        );
    }

    #[test]
    fn first_trial_is_never_gated() {
        let seq = TrialSequencer::new(3, 1).unwrap();
        assert!(seq.check_playback(&trials(3), 0, true).is_ok());
    }

    #[test]
    fn later_trial_waits_for_previous_answer() {
        let seq = TrialSequencer::new(3, 1).unwrap();
        let mut list = trials(3);

        let err = seq.check_playback(&list, 2, true).unwrap_err();
        assert_eq!(err.blocked.to_string(), "trial2-src3");
        assert_eq!(err.waiting_on.to_string(), "trial1-src2");

        assert!(seq.check_playback(&list, 2, false).is_ok());

        list[1].select(Answer::new("1")).unwrap();
        assert!(seq.check_playback(&list, 2, true).is_ok());
    }

    #[test]
    fn restored_score_unlocks_next_trial() {
        let seq = TrialSequencer::new(2, 1).unwrap();
        let list = vec![
            TrialState::from_persisted(0, StimulusId::new("1"), None, Some(Answer::new("3")), Some(0))
                .unwrap(),
            TrialState::new(1, StimulusId::new("2")),
        ];
        assert!(seq.check_playback(&list, 1, true).is_ok());
    }
}

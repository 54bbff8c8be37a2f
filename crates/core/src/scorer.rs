use thiserror::Error;

use crate::model::{Answer, StimulusId, StimulusSpec, TrialState};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("trial {index} presents stimulus {expected}, not {provided}")]
    StimulusMismatch {
        index: usize,
        expected: StimulusId,
        provided: StimulusId,
    },

    #[error("trial {index} was already scored with response {recorded}")]
    AlreadyScored { index: usize, recorded: Answer },
}

//
// ─── SCORER ────────────────────────────────────────────────────────────────────
//

/// Scores responses against the expected answer and totals a session.
///
/// Scores are binary: `1` when the response equals the stimulus' `correct`
/// value, `0` otherwise. There is no weighting or partial credit.
///
/// ```
/// # use headcheck_core::model::{Answer, StimulusId, StimulusSpec, TrialState};
/// # use headcheck_core::scorer::Scorer;
/// let stimulus = StimulusSpec::new(StimulusId::new("1"), "a.wav", Answer::new("2"));
/// let mut trial = TrialState::new(0, stimulus.id.clone());
///
/// let score = Scorer::score(&mut trial, &stimulus, Some(&Answer::new("2")))?;
/// assert_eq!(score, Some(1));
/// assert_eq!(Scorer::aggregate(&[trial]), 1);
/// # Ok::<(), headcheck_core::scorer::ScoreError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    /// Score a trial and record its response.
    ///
    /// Returns `Ok(None)` without touching the trial when `response` is `None`.
    /// Scoring an already-scored trial with the same response returns the
    /// recorded score.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::StimulusMismatch` if `stimulus` is not the trial's stimulus,
    /// and `ScoreError::AlreadyScored` if the trial holds a different response.
    pub fn score(
        trial: &mut TrialState,
        stimulus: &StimulusSpec,
        response: Option<&Answer>,
    ) -> Result<Option<u8>, ScoreError> {
        if trial.stimulus_id() != &stimulus.id {
            return Err(ScoreError::StimulusMismatch {
                index: trial.index(),
                expected: trial.stimulus_id().clone(),
                provided: stimulus.id.clone(),
            });
        }
        let Some(response) = response else {
            return Ok(None);
        };

        if let (Some(recorded), Some(score)) = (trial.response(), trial.score()) {
            if recorded == response {
                return Ok(Some(score));
            }
            return Err(ScoreError::AlreadyScored {
                index: trial.index(),
                recorded: recorded.clone(),
            });
        }

        let score = u8::from(*response == stimulus.correct);
        trial.record(response.clone(), score);
        Ok(Some(score))
    }

    /// Sum of recorded scores; unscored trials count as 0.
    #[must_use]
    pub fn aggregate(trials: &[TrialState]) -> u32 {
        trials
            .iter()
            .filter_map(TrialState::score)
            .map(u32::from)
            .sum()
    }

    #[must_use]
    pub fn passed(trials: &[TrialState], threshold: u32) -> bool {
        Self::aggregate(trials) >= threshold
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn stimuli() -> Vec<StimulusSpec> {
        (1..=3)
            .map(|i| {
                StimulusSpec::new(
                    StimulusId::new(i.to_string()),
                    format!("{i}.wav"),
                    Answer::new(i.to_string()),
                )
            })
            .collect()
    }

    fn trials_for(stimuli: &[StimulusSpec]) -> Vec<TrialState> {
        stimuli
            .iter()
            .enumerate()
            .map(|(i, s)| TrialState::new(i, s.id.clone()))
            .collect()
    }

    #[test]
    fn missing_response_is_not_a_scoring_event() {
        let stimuli = stimuli();
        let mut trial = TrialState::new(0, stimuli[0].id.clone());
        assert_eq!(Scorer::score(&mut trial, &stimuli[0], None).unwrap(), None);
        assert!(trial.response().is_none());
        assert!(trial.score().is_none());
    }

    #[test]
    fn all_correct_sums_to_trial_count() {
        let stimuli = stimuli();
        let mut trials = trials_for(&stimuli);
        for (trial, stimulus) in trials.iter_mut().zip(&stimuli) {
            let correct = stimulus.correct.clone();
            assert_eq!(Scorer::score(trial, stimulus, Some(&correct)).unwrap(), Some(1));
        }
        assert_eq!(Scorer::aggregate(&trials), 3);
    }

    #[test]
    fn all_wrong_sums_to_zero() {
        let stimuli = stimuli();
        let mut trials = trials_for(&stimuli);
        for (trial, stimulus) in trials.iter_mut().zip(&stimuli) {
            let wrong = Answer::new("0");
            assert_eq!(Scorer::score(trial, stimulus, Some(&wrong)).unwrap(), Some(0));
        }
        assert_eq!(Scorer::aggregate(&trials), 0);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let stimuli = stimuli();
        let mut trials = trials_for(&stimuli);
        let answers = ["1", "2", "1"];
        for ((trial, stimulus), answer) in trials.iter_mut().zip(&stimuli).zip(answers) {
            Scorer::score(trial, stimulus, Some(&Answer::new(answer))).unwrap();
        }
        assert_eq!(Scorer::aggregate(&trials), 2);
        assert!(Scorer::passed(&trials, 2));
        assert!(!Scorer::passed(&trials, 3));
    }

    #[test]
    fn rescoring_is_idempotent_or_rejected() {
        let stimuli = stimuli();
        let mut trial = TrialState::new(0, stimuli[0].id.clone());
        let first = Answer::new("1");
        assert_eq!(Scorer::score(&mut trial, &stimuli[0], Some(&first)).unwrap(), Some(1));
        assert_eq!(Scorer::score(&mut trial, &stimuli[0], Some(&first)).unwrap(), Some(1));

        let err = Scorer::score(&mut trial, &stimuli[0], Some(&Answer::new("2"))).unwrap_err();
        assert_eq!(
            err,
            ScoreError::AlreadyScored {
                index: 0,
                recorded: first.clone()
            }
        );
        assert_eq!(trial.response(), Some(&first));
        assert_eq!(trial.score(), Some(1));
    }

    #[test]
    fn wrong_stimulus_is_rejected() {
        let stimuli = stimuli();
        let mut trial = TrialState::new(0, stimuli[0].id.clone());
        let err = Scorer::score(&mut trial, &stimuli[1], Some(&Answer::new("2"))).unwrap_err();
        assert!(matches!(err, ScoreError::StimulusMismatch { index: 0, .. }));
        assert!(trial.score().is_none());
    }
}

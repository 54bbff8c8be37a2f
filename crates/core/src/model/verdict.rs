use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::trial::TrialState;
use crate::scorer::Scorer;

/// Final pass/fail outcome of a headphone check, with score detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub passed: bool,
    pub total_correct: u32,
    pub threshold: u32,
    /// Per-trial scores in presentation order; `None` for unscored trials.
    pub scores: Vec<Option<u8>>,
    pub completed_at: DateTime<Utc>,
}

impl Verdict {
    #[must_use]
    pub fn from_trials(trials: &[TrialState], threshold: u32, completed_at: DateTime<Utc>) -> Self {
        Self {
            passed: Scorer::passed(trials, threshold),
            total_correct: Scorer::aggregate(trials),
            threshold,
            scores: trials.iter().map(TrialState::score).collect(),
            completed_at,
        }
    }

    #[must_use]
    pub fn total_trials(&self) -> usize {
        self.scores.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, StimulusId};
    use crate::time::fixed_now;

    #[test]
    fn verdict_reports_scores_in_order() {
        let trials = vec![
            TrialState::from_persisted(0, StimulusId::new("1"), None, Some(Answer::new("1")), Some(1))
                .unwrap(),
            TrialState::new(1, StimulusId::new("2")),
            TrialState::from_persisted(2, StimulusId::new("3"), None, Some(Answer::new("2")), Some(0))
                .unwrap(),
        ];

        let verdict = Verdict::from_trials(&trials, 1, fixed_now());
        assert!(verdict.passed);
        assert_eq!(verdict.total_correct, 1);
        assert_eq!(verdict.scores, vec![Some(1), None, Some(0)]);
        assert_eq!(verdict.total_trials(), 3);
    }
}

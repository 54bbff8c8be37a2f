use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::warn;

use headcheck_core::model::{PresentationId, StimulusSpec};

/// Stimuli chosen for a session, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePlan {
    pub stimuli: Vec<StimulusSpec>,
    /// Count asked for after the full-set fallback was applied.
    pub requested: usize,
    /// True when sampling without replacement had to stop at the manifest size.
    pub clamped: bool,
}

impl SamplePlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    /// `trial<index>-src<id>` handle of every selected stimulus.
    #[must_use]
    pub fn presentation_ids(&self) -> Vec<PresentationId> {
        self.stimuli
            .iter()
            .enumerate()
            .map(|(index, s)| PresentationId::new(index, s.id.clone()))
            .collect()
    }
}

/// Picks the stimuli a session will present.
///
/// The random source is owned so tests can seed it.
#[derive(Debug, Clone)]
pub struct Sampler<R = StdRng> {
    rng: R,
}

impl Sampler<StdRng> {
    /// Sampler seeded from the thread-local generator.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_rng(&mut rand::rng()))
    }

    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Sampler<R> {
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Select `count` stimuli from `stimuli`.
    ///
    /// - `count == 0` selects the full set.
    /// - With replacement, every draw is an independent uniform pick; duplicates are allowed.
    /// - Without replacement, a shuffled copy (or manifest order when `shuffle` is off)
    ///   is cut to `count`, clamping to the manifest size.
    pub fn select(
        &mut self,
        stimuli: &[StimulusSpec],
        count: usize,
        with_replacement: bool,
        shuffle: bool,
    ) -> SamplePlan {
        let requested = if count == 0 {
            warn!(available = stimuli.len(), "no trial count configured; using full stimulus set");
            stimuli.len()
        } else {
            count
        };

        if stimuli.is_empty() {
            return SamplePlan {
                stimuli: Vec::new(),
                requested,
                clamped: requested > 0,
            };
        }

        if with_replacement {
            let picked = (0..requested)
                .map(|_| stimuli[self.rng.random_range(0..stimuli.len())].clone())
                .collect();
            return SamplePlan {
                stimuli: picked,
                requested,
                clamped: false,
            };
        }

        let mut pool = stimuli.to_vec();
        if shuffle {
            pool.shuffle(&mut self.rng);
        }
        let clamped = requested > pool.len();
        if clamped {
            warn!(
                requested,
                available = pool.len(),
                "more trials requested than stimuli available; clamping"
            );
        }
        pool.truncate(requested);
        SamplePlan {
            stimuli: pool,
            requested,
            clamped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headcheck_core::model::{Answer, StimulusId};
    use std::collections::HashSet;

    fn manifest(n: usize) -> Vec<StimulusSpec> {
        (1..=n)
            .map(|i| {
                StimulusSpec::new(
                    StimulusId::new(i.to_string()),
                    format!("{i}.wav"),
                    Answer::new("1"),
                )
            })
            .collect()
    }

    fn ids(plan: &SamplePlan) -> Vec<String> {
        plan.stimuli.iter().map(|s| s.id.as_str().to_owned()).collect()
    }

    #[test]
    fn without_replacement_draws_distinct_members() {
        let stimuli = manifest(6);
        for seed in 0..32 {
            let plan = Sampler::seeded(seed).select(&stimuli, 4, false, true);
            assert_eq!(plan.len(), 4);
            let unique: HashSet<_> = ids(&plan).into_iter().collect();
            assert_eq!(unique.len(), 4);
            assert!(plan.stimuli.iter().all(|s| stimuli.contains(s)));
            assert!(!plan.clamped);
        }
    }

    #[test]
    fn shuffle_reaches_more_than_one_order() {
        let stimuli = manifest(5);
        let orders: HashSet<_> = (0..16)
            .map(|seed| ids(&Sampler::seeded(seed).select(&stimuli, 5, false, true)))
            .collect();
        assert!(orders.len() > 1);
    }

    #[test]
    fn with_replacement_returns_exact_count() {
        let stimuli = manifest(2);
        let plan = Sampler::seeded(7).select(&stimuli, 9, true, true);
        assert_eq!(plan.len(), 9);
        assert!(!plan.clamped);
        assert!(plan.stimuli.iter().all(|s| stimuli.contains(s)));
    }

    #[test]
    fn oversized_request_is_clamped() {
        let stimuli = manifest(3);
        let plan = Sampler::seeded(1).select(&stimuli, 10, false, true);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.requested, 10);
        assert!(plan.clamped);
    }

    #[test]
    fn zero_count_uses_full_set() {
        let stimuli = manifest(4);
        let plan = Sampler::seeded(3).select(&stimuli, 0, false, true);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.requested, 4);

        let drawn = Sampler::seeded(3).select(&stimuli, 0, true, true);
        assert_eq!(drawn.len(), 4);
    }

    #[test]
    fn unshuffled_selection_keeps_manifest_order() {
        let stimuli = manifest(4);
        let plan = Sampler::seeded(9).select(&stimuli, 3, false, false);
        assert_eq!(ids(&plan), ["1", "2", "3"]);
    }

    #[test]
    fn presentation_ids_follow_output_positions() {
        let stimuli = manifest(3);
        let plan = Sampler::seeded(0).select(&stimuli, 3, false, false);
        let handles: Vec<String> = plan
            .presentation_ids()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(handles, ["trial0-src1", "trial1-src2", "trial2-src3"]);
    }

    #[test]
    fn same_seed_same_plan() {
        let stimuli = manifest(8);
        let a = Sampler::seeded(42).select(&stimuli, 5, false, true);
        let b = Sampler::seeded(42).select(&stimuli, 5, false, true);
        assert_eq!(a, b);
    }
}

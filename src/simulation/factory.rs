use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{BELL_WEIGHTS, INCLUSION_PROBABILITY, MAX_STATES};
use crate::error::{AutomataError, Result};
use crate::simulation::rule::{CountSet, RuleSet, StateId, BASE_STATE, MAX_COUNT};

/// Shape of the per-count inclusion probability.
///
/// The probability that count `c` joins a generated set is
/// `weight(c) * inclusion_probability`, clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InclusionCurve {
    /// Every count equally likely.
    #[default]
    Uniform,
    /// Legacy curve peaking at 4 neighbors.
    Bell,
    /// Arbitrary weights for counts 0..=8.
    Custom([f64; 9]),
}

impl InclusionCurve {
    pub fn weight(&self, count: u8) -> f64 {
        match self {
            Self::Uniform => 1.0,
            Self::Bell => BELL_WEIGHTS[count as usize],
            Self::Custom(weights) => weights[count as usize],
        }
    }

    fn validate(&self) -> Result<()> {
        if let Self::Custom(weights) = self {
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(AutomataError::InvalidConfig(format!(
                    "custom inclusion weights must be finite and non-negative, got {:?}",
                    weights
                )));
            }
        }
        Ok(())
    }
}

/// Generates random rule sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleFactory {
    inclusion_probability: f64,
    curve: InclusionCurve,
}

impl Default for RuleFactory {
    fn default() -> Self {
        Self {
            inclusion_probability: INCLUSION_PROBABILITY,
            curve: InclusionCurve::Uniform,
        }
    }
}

impl RuleFactory {
    pub fn new(inclusion_probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&inclusion_probability) {
            return Err(AutomataError::InvalidConfig(format!(
                "inclusion probability must lie in [0, 1], got {}",
                inclusion_probability
            )));
        }
        Ok(Self {
            inclusion_probability,
            curve: InclusionCurve::Uniform,
        })
    }

    pub fn with_curve(mut self, curve: InclusionCurve) -> Result<Self> {
        curve.validate()?;
        self.curve = curve;
        Ok(self)
    }

    pub fn inclusion_probability(&self) -> f64 {
        self.inclusion_probability
    }

    pub fn curve(&self) -> InclusionCurve {
        self.curve
    }

    /// Create one random rule set for state `id`.
    ///
    /// The base automaton ignores its own count and never triggers on a count
    /// of zero, so empty space cannot ignite by itself. Draws happen in a
    /// fixed order (targets, then neighbor ids, then counts, all ascending)
    /// followed by a Fisher-Yates shuffle of the preference, so a seeded `rng`
    /// always yields the same rule set.
    pub fn random_rule_set<R: Rng + ?Sized>(
        &self,
        id: StateId,
        state_count: usize,
        is_base: bool,
        rng: &mut R,
    ) -> Result<RuleSet> {
        check_state_count(state_count)?;
        let probabilities: Vec<f64> = (0..=MAX_COUNT)
            .map(|c| (self.curve.weight(c) * self.inclusion_probability).clamp(0.0, 1.0))
            .collect();
        let first_count = if is_base { 1 } else { 0 };

        let mut table = vec![CountSet::EMPTY; state_count * state_count];
        let mut preference: Vec<StateId> = (0..state_count)
            .map(|other| other as StateId)
            .filter(|&other| other != id)
            .collect();

        for &target in &preference {
            for neighbor in 0..state_count {
                if is_base && neighbor == id as usize {
                    continue;
                }
                let mut set = CountSet::EMPTY;
                for count in first_count..=MAX_COUNT {
                    if rng.gen::<f64>() < probabilities[count as usize] {
                        set.insert(count);
                    }
                }
                table[target as usize * state_count + neighbor] = set;
            }
        }

        preference.shuffle(rng);
        RuleSet::new(id, state_count, table, preference)
    }

    /// One rule set per state. State 0 is the base automaton, the rest are
    /// fully referential.
    pub fn random_rule_sets<R: Rng + ?Sized>(
        &self,
        state_count: usize,
        rng: &mut R,
    ) -> Result<Vec<RuleSet>> {
        check_state_count(state_count)?;
        (0..state_count)
            .map(|id| {
                let id = id as StateId;
                self.random_rule_set(id, state_count, id == BASE_STATE, rng)
            })
            .collect()
    }
}

fn check_state_count(state_count: usize) -> Result<()> {
    if state_count == 0 || state_count > MAX_STATES {
        return Err(AutomataError::InvalidConfig(format!(
            "state count must lie in 1..={}, got {}",
            MAX_STATES, state_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let factory = RuleFactory::new(0.3).unwrap();
        let a = factory
            .random_rule_sets(4, &mut ChaCha8Rng::seed_from_u64(7))
            .unwrap();
        let b = factory
            .random_rule_sets(4, &mut ChaCha8Rng::seed_from_u64(7))
            .unwrap();
        assert_eq!(a, b);

        let c = factory
            .random_rule_sets(4, &mut ChaCha8Rng::seed_from_u64(8))
            .unwrap();
        assert_ne!(a, c, "different seeds should give different rules");
    }

    #[test]
    fn test_base_rule_ignores_itself_and_zero() {
        let factory = RuleFactory::new(1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let base = factory.random_rule_set(0, 3, true, &mut rng).unwrap();
        for target in base.other_ids() {
            assert!(base.rule(target, 0).is_empty());
            for neighbor in 1..3 {
                let set = base.rule(target, neighbor);
                assert!(!set.contains(0));
                assert_eq!(set.len(), 8, "probability 1 includes counts 1..=8");
            }
        }
    }

    #[test]
    fn test_referential_rule_is_full_at_probability_one() {
        let factory = RuleFactory::new(1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let rules = factory.random_rule_set(2, 3, false, &mut rng).unwrap();
        for target in rules.other_ids() {
            for neighbor in 0..3 {
                assert_eq!(rules.rule(target, neighbor), CountSet::FULL);
            }
        }
    }

    #[test]
    fn test_preference_is_permutation_of_other_ids() {
        let factory = RuleFactory::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for id in 0..6 {
            let rules = factory.random_rule_set(id, 6, id == 0, &mut rng).unwrap();
            let mut pref = rules.preference().to_vec();
            pref.sort_unstable();
            assert_eq!(pref, rules.other_ids().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_zero_probability_gives_stable_rules() {
        let factory = RuleFactory::new(0.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let rule_sets = factory.random_rule_sets(3, &mut rng).unwrap();
        for rules in &rule_sets {
            assert_eq!(rules.decide(&[3, 3, 2]), rules.id());
        }
    }

    #[test]
    fn test_custom_curve_selects_counts() {
        let mut weights = [0.0; 9];
        weights[3] = 1.0;
        let factory = RuleFactory::new(1.0)
            .unwrap()
            .with_curve(InclusionCurve::Custom(weights))
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let rules = factory.random_rule_set(1, 2, false, &mut rng).unwrap();
        assert_eq!(rules.rule(0, 0), CountSet::from_counts([3]));
        assert_eq!(rules.rule(0, 1), CountSet::from_counts([3]));
    }

    #[test]
    fn test_bell_curve_never_exceeds_weights() {
        let factory = RuleFactory::new(0.5)
            .unwrap()
            .with_curve(InclusionCurve::Bell)
            .unwrap();
        assert!((factory.curve().weight(4) * factory.inclusion_probability() - 0.5).abs() < 1e-12);
        assert!((factory.curve().weight(0) * factory.inclusion_probability() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_bell_curve_favors_middle_counts() {
        let factory = RuleFactory::new(1.0)
            .unwrap()
            .with_curve(InclusionCurve::Bell)
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut hits = [0usize; 9];
        let draws = 200;
        for _ in 0..draws {
            let rules = factory.random_rule_set(1, 2, false, &mut rng).unwrap();
            for neighbor in 0..2 {
                for count in rules.rule(0, neighbor).iter() {
                    hits[count as usize] += 1;
                }
            }
        }
        assert_eq!(hits[4], 2 * draws, "weight 1 always includes the peak");
        assert!(hits[0] > 0);
        assert!(hits[0] < hits[2] && hits[2] < hits[4], "{:?}", hits);
        assert!(hits[8] < hits[6], "{:?}", hits);
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(RuleFactory::new(1.5).is_err());
        assert!(RuleFactory::new(f64::NAN).is_err());
        assert!(RuleFactory::default()
            .with_curve(InclusionCurve::Custom([-1.0; 9]))
            .is_err());
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        assert!(RuleFactory::default().random_rule_sets(0, &mut rng).is_err());
    }
}

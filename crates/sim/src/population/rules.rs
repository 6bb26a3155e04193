//! Update rules.
//!
//! A rule maps the fitness of the focal individual and of its reference group
//! to a [`Decision`]. Rules only see fitness values and group positions; the
//! population translates positions back to slots and copies traits.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Closed set of update rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// Adopt the model's best reply to the group.
    BestResponse,
    /// Adopt the trait of the fittest candidate; the focal trait wins ties.
    Best,
    /// Like [`UpdateRule::Best`] but ties, the focal individual included, are
    /// broken uniformly at random.
    BestRandom,
    /// Choose among focal and group proportional to `fitness - min`.
    Proportional,
    /// Imitate fitter candidates only.
    ImitateBetter,
    /// Imitate with a probability that increases with the fitness difference.
    #[default]
    Imitate,
    /// Fermi rule: logistic function of the fitness difference.
    Thermal,
}

impl UpdateRule {
    /// Rule needs the model's best response instead of fitness values.
    pub fn is_best_response(&self) -> bool {
        matches!(self, UpdateRule::BestResponse)
    }
}

/// Parameters shared by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParams {
    /// Fitness difference over which imitation probabilities saturate (or
    /// the temperature of the Fermi rule). Zero means hard comparisons.
    pub noise: f64,
    /// Imitation probabilities are clamped to `[error, 1 - error]`.
    pub error: f64,
    /// Probability to imitate an equally fit candidate at zero noise.
    pub tie_probability: f64,
    /// Weight of the focal individual relative to one group member when the
    /// choice is uniform under neutral selection.
    pub neutral_self_weight: f64,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            noise: 1.0,
            error: 0.0,
            tie_probability: 0.5,
            neutral_self_weight: 1.0,
        }
    }
}

/// Outcome of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    /// Adopt the trait of the group member at this position.
    Adopt(usize),
}

impl UpdateRule {
    /// Decide whether the focal individual (fitness `focal`) adopts the trait
    /// of one of the group members (fitness `group[j]`).
    ///
    /// `tie_break(best, challenger)` resolves ties between two equally fit
    /// candidates under [`UpdateRule::Best`]; returning `true` switches to the
    /// challenger. [`UpdateRule::BestResponse`] is resolved by the model and
    /// always yields [`Decision::Keep`] here.
    pub fn decide<R, F>(
        self,
        focal: f64,
        group: &[f64],
        params: &RuleParams,
        neutral: bool,
        rng: &mut R,
        mut tie_break: F,
    ) -> Decision
    where
        R: Rng + ?Sized,
        F: FnMut(usize, usize) -> bool,
    {
        if group.is_empty() {
            return Decision::Keep;
        }
        if neutral {
            return match self {
                UpdateRule::ImitateBetter | UpdateRule::BestResponse => Decision::Keep,
                _ => neutral_choice(group.len(), params.neutral_self_weight, rng),
            };
        }
        match self {
            UpdateRule::BestResponse => Decision::Keep,
            UpdateRule::Best => {
                let mut best = 0;
                for (j, &f) in group.iter().enumerate().skip(1) {
                    if f > group[best] || (f == group[best] && tie_break(best, j)) {
                        best = j;
                    }
                }
                if group[best] > focal {
                    Decision::Adopt(best)
                } else {
                    Decision::Keep
                }
            }
            UpdateRule::BestRandom => {
                // reservoir sampling among tied maxima, focal included
                let mut best = None;
                let mut top = focal;
                let mut ties = 1u32;
                for (j, &f) in group.iter().enumerate() {
                    if f > top {
                        top = f;
                        best = Some(j);
                        ties = 1;
                    } else if f == top {
                        ties += 1;
                        if rng.random_range(0..ties) == 0 {
                            best = Some(j);
                        }
                    }
                }
                best.map_or(Decision::Keep, Decision::Adopt)
            }
            UpdateRule::Proportional => {
                let min = group.iter().copied().fold(focal, f64::min);
                let total = group.iter().map(|f| f - min).sum::<f64>() + (focal - min);
                if total <= 0.0 {
                    return neutral_choice(group.len(), 1.0, rng);
                }
                let hit = rng.random::<f64>() * total;
                let mut acc = focal - min;
                if hit < acc {
                    return Decision::Keep;
                }
                for (j, &f) in group.iter().enumerate() {
                    acc += f - min;
                    if hit < acc {
                        return Decision::Adopt(j);
                    }
                }
                Decision::Keep
            }
            UpdateRule::ImitateBetter | UpdateRule::Imitate | UpdateRule::Thermal => {
                // each candidate is considered with probability 1/m
                let m = group.len() as f64;
                let hit = rng.random::<f64>() * m;
                let mut acc = 0.0;
                for (j, &f) in group.iter().enumerate() {
                    acc += self.imitation_probability(f - focal, params);
                    if hit < acc {
                        return Decision::Adopt(j);
                    }
                }
                Decision::Keep
            }
        }
    }

    /// Probability to imitate a candidate that is `diff` fitter than the
    /// focal individual.
    pub fn imitation_probability(&self, diff: f64, params: &RuleParams) -> f64 {
        let error = params.error;
        if matches!(self, UpdateRule::ImitateBetter) && diff <= 0.0 {
            return 0.0;
        }
        if params.noise <= 0.0 {
            return if diff > 0.0 {
                1.0 - error
            } else if diff < 0.0 {
                error
            } else {
                params.tie_probability
            };
        }
        let x = diff / params.noise;
        let p = match self {
            UpdateRule::Thermal => 1.0 / (1.0 + (-x).exp()),
            UpdateRule::ImitateBetter => x.min(1.0),
            _ => (0.5 + 0.5 * x).clamp(0.0, 1.0),
        };
        p.clamp(error, 1.0 - error)
    }
}

/// Uniform choice among focal (weighted by `self_weight`) and `m` members.
fn neutral_choice<R: Rng + ?Sized>(m: usize, self_weight: f64, rng: &mut R) -> Decision {
    let self_weight = self_weight.max(0.0);
    let hit = rng.random::<f64>() * (m as f64 + self_weight);
    if hit < self_weight {
        return Decision::Keep;
    }
    let j = ((hit - self_weight) as usize).min(m - 1);
    Decision::Adopt(j)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(21)
    }

    fn adopt_rate(rule: UpdateRule, focal: f64, group: &[f64], params: &RuleParams) -> f64 {
        let mut rng = rng();
        let draws = 50_000;
        let adopted = (0..draws)
            .filter(|_| {
                matches!(
                    rule.decide(focal, group, params, false, &mut rng, |_, _| false),
                    Decision::Adopt(_)
                )
            })
            .count();
        adopted as f64 / draws as f64
    }

    #[test]
    fn test_best_keeps_focal_on_tie() {
        let params = RuleParams::default();
        let mut rng = rng();
        let d = UpdateRule::Best.decide(2.0, &[1.0, 2.0], &params, false, &mut rng, |_, _| false);
        assert_eq!(d, Decision::Keep);
        let d = UpdateRule::Best.decide(2.0, &[1.0, 3.0], &params, false, &mut rng, |_, _| false);
        assert_eq!(d, Decision::Adopt(1));
    }

    #[test]
    fn test_best_uses_tie_break_between_candidates() {
        let params = RuleParams::default();
        let mut rng = rng();
        let first = UpdateRule::Best.decide(0.0, &[3.0, 3.0], &params, false, &mut rng, |_, _| false);
        assert_eq!(first, Decision::Adopt(0));
        let second = UpdateRule::Best.decide(0.0, &[3.0, 3.0], &params, false, &mut rng, |_, _| true);
        assert_eq!(second, Decision::Adopt(1));
    }

    #[test]
    fn test_best_random_splits_ties_evenly() {
        let params = RuleParams::default();
        let rate = adopt_rate(UpdateRule::BestRandom, 2.0, &[2.0, 1.0], &params);
        assert!((rate - 0.5).abs() < 0.01, "rate {rate}");
    }

    #[test]
    fn test_proportional_weights_excess_fitness() {
        let params = RuleParams::default();
        // weights relative to min 1.0: focal 1, candidates 0 and 3
        let rate = adopt_rate(UpdateRule::Proportional, 2.0, &[1.0, 4.0], &params);
        assert!((rate - 0.75).abs() < 0.01, "rate {rate}");
    }

    #[test]
    fn test_proportional_uniform_when_all_minimal() {
        let params = RuleParams::default();
        let rate = adopt_rate(UpdateRule::Proportional, 1.0, &[1.0, 1.0, 1.0], &params);
        assert!((rate - 0.75).abs() < 0.01, "rate {rate}");
    }

    #[test]
    fn test_imitate_better_rejects_worse() {
        let params = RuleParams {
            error: 0.1,
            ..Default::default()
        };
        assert_eq!(adopt_rate(UpdateRule::ImitateBetter, 2.0, &[1.0, 2.0], &params), 0.0);
        let p = UpdateRule::ImitateBetter.imitation_probability(10.0, &params);
        assert!((p - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_imitate_is_symmetric() {
        let params = RuleParams {
            noise: 2.0,
            ..Default::default()
        };
        for diff in [0.0, 0.3, 1.0, 5.0] {
            let up = UpdateRule::Imitate.imitation_probability(diff, &params);
            let down = UpdateRule::Imitate.imitation_probability(-diff, &params);
            assert!((up + down - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_noise_is_hard_comparison() {
        let params = RuleParams {
            noise: 0.0,
            error: 0.01,
            tie_probability: 0.25,
            ..Default::default()
        };
        for rule in [UpdateRule::Imitate, UpdateRule::Thermal] {
            assert_eq!(rule.imitation_probability(1.0, &params), 0.99);
            assert_eq!(rule.imitation_probability(-1.0, &params), 0.01);
            assert_eq!(rule.imitation_probability(0.0, &params), 0.25);
        }
    }

    #[test]
    fn test_thermal_is_logistic() {
        let params = RuleParams::default();
        let p = UpdateRule::Thermal.imitation_probability(1.0, &params);
        assert!((p - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-12);
        let rate = adopt_rate(UpdateRule::Thermal, 0.0, &[0.0], &params);
        assert!((rate - 0.5).abs() < 0.01, "rate {rate}");
    }

    #[test]
    fn test_imitation_normalized_over_group() {
        let params = RuleParams {
            noise: 0.0,
            ..Default::default()
        };
        // only one of four candidates is fitter
        let rate = adopt_rate(UpdateRule::ImitateBetter, 1.0, &[0.0, 0.0, 0.0, 5.0], &params);
        assert!((rate - 0.25).abs() < 0.01, "rate {rate}");
    }

    #[test]
    fn test_neutral_choice_is_uniform() {
        let params = RuleParams::default();
        let mut rng = rng();
        let mut counts = [0usize; 4];
        for _ in 0..40_000 {
            match UpdateRule::Best.decide(1.0, &[1.0, 1.0, 1.0], &params, true, &mut rng, |_, _| false) {
                Decision::Keep => counts[0] += 1,
                Decision::Adopt(j) => counts[j + 1] += 1,
            }
        }
        for c in counts {
            assert!((c as f64 / 40_000.0 - 0.25).abs() < 0.015);
        }
        let d = UpdateRule::ImitateBetter.decide(1.0, &[1.0], &params, true, &mut rng, |_, _| false);
        assert_eq!(d, Decision::Keep);
    }

    #[test]
    fn test_empty_group_keeps() {
        let params = RuleParams::default();
        let mut rng = rng();
        for rule in [UpdateRule::Best, UpdateRule::Proportional, UpdateRule::Imitate] {
            assert_eq!(rule.decide(0.0, &[], &params, false, &mut rng, |_, _| false), Decision::Keep);
        }
    }
}

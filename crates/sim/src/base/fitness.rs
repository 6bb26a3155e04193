//! Mapping of payoffs (scores) to fitness.
//!
//! Scores accumulate from interactions and can take any sign. Selection acts
//! on fitness, which is the score passed through a monotone map. Most update
//! rules and the real-time clock require fitness to be non-negative, which the
//! configuration check verifies against the payoff range of the model.

use serde::{Deserialize, Serialize};

/// Fitness values closer than this are considered identical (neutral selection).
pub const NEUTRAL_TOLERANCE: f64 = 1e-8;

/// Relative tolerance of the running fitness total against the per-slot sum.
pub const ACCOUNTING_TOLERANCE: f64 = 1e-6;

/// Monotone map from score to fitness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayoffMap {
    /// Fitness equals the score.
    Identity,
    /// `baseline + selection * score`
    Linear { baseline: f64, selection: f64 },
    /// `baseline * exp(selection * score)`
    Exponential { baseline: f64, selection: f64 },
}

impl Default for PayoffMap {
    fn default() -> Self {
        Self::Linear {
            baseline: 1.0,
            selection: 1.0,
        }
    }
}

impl PayoffMap {
    /// Map a score to fitness.
    #[inline]
    pub fn fitness(&self, score: f64) -> f64 {
        match *self {
            Self::Identity => score,
            Self::Linear {
                baseline,
                selection,
            } => baseline + selection * score,
            Self::Exponential {
                baseline,
                selection,
            } => baseline * (selection * score).exp(),
        }
    }

    /// Map a payoff interval to the corresponding fitness interval.
    ///
    /// The map is monotone but may be decreasing for negative selection
    /// strengths, hence the reordering.
    pub fn fitness_range(&self, payoffs: (f64, f64)) -> (f64, f64) {
        let a = self.fitness(payoffs.0);
        let b = self.fitness(payoffs.1);
        (a.min(b), a.max(b))
    }

    /// Whether the map preserves the order of scores.
    pub fn is_increasing(&self) -> bool {
        match *self {
            Self::Identity => true,
            Self::Linear { selection, .. } => selection >= 0.0,
            Self::Exponential {
                baseline,
                selection,
            } => baseline * selection >= 0.0,
        }
    }
}

/// Check whether two fitness values are indistinguishable.
#[inline]
pub fn is_neutral(min: f64, max: f64) -> bool {
    max - min < NEUTRAL_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_identity_map() {
        assert!(approx_eq(PayoffMap::Identity.fitness(-2.5), -2.5, 1e-12));
    }

    #[test]
    fn test_linear_map() {
        let map = PayoffMap::Linear {
            baseline: 1.0,
            selection: 0.5,
        };
        assert!(approx_eq(map.fitness(2.0), 2.0, 1e-12));
        assert!(approx_eq(map.fitness(0.0), 1.0, 1e-12));
    }

    #[test]
    fn test_exponential_map_is_positive() {
        let map = PayoffMap::Exponential {
            baseline: 1.0,
            selection: 2.0,
        };
        assert!(map.fitness(-100.0) > 0.0);
        assert!(approx_eq(map.fitness(1.0), 2.0f64.exp(), 1e-12));
    }

    #[test]
    fn test_fitness_range_reorders_decreasing_maps() {
        let map = PayoffMap::Linear {
            baseline: 0.0,
            selection: -1.0,
        };
        assert!(!map.is_increasing());
        assert_eq!(map.fitness_range((0.0, 2.0)), (-2.0, 0.0));
    }

    #[test]
    fn test_neutral_detection() {
        assert!(is_neutral(1.0, 1.0 + 1e-9));
        assert!(!is_neutral(1.0, 1.0 + 1e-6));
    }
}

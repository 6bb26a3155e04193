use super::TraitModel;
use crate::errors::ConfigError;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Grid resolution used to bound payoffs over `[0, 1] × [0, 1]`.
const RANGE_GRID: usize = 100;

/// Continuous snowdrift game.
///
/// Individuals invest `x ∈ [0, 1]`. Both partners receive the benefit
/// `B(x + y)`, the investor pays `C(x)`, with quadratic
/// `B(z) = b1 z + b2 z²` and `C(x) = c1 x + c2 x²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuousSnowdrift {
    pub b1: f64,
    pub b2: f64,
    pub c1: f64,
    pub c2: f64,
    /// Standard deviation of mutational steps.
    pub mutation_sd: f64,
}

impl Default for ContinuousSnowdrift {
    /// Parameters that produce evolutionary branching.
    fn default() -> Self {
        Self {
            b1: 6.0,
            b2: -1.4,
            c1: 4.56,
            c2: -1.6,
            mutation_sd: 0.01,
        }
    }
}

impl ContinuousSnowdrift {
    pub fn new(b1: f64, b2: f64, c1: f64, c2: f64, mutation_sd: f64) -> Result<Self, ConfigError> {
        if !(mutation_sd >= 0.0) {
            return Err(ConfigError::invalid(
                "mutation_sd",
                mutation_sd,
                "must be non-negative",
            ));
        }
        Ok(Self {
            b1,
            b2,
            c1,
            c2,
            mutation_sd,
        })
    }

    fn benefit(&self, z: f64) -> f64 {
        self.b1 * z + self.b2 * z * z
    }

    fn cost(&self, x: f64) -> f64 {
        self.c1 * x + self.c2 * x * x
    }
}

impl TraitModel for ContinuousSnowdrift {
    type Trait = f64;

    fn number_of_traits(&self) -> usize {
        0
    }

    fn payoff_range(&self) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for i in 0..=RANGE_GRID {
            let x = i as f64 / RANGE_GRID as f64;
            for j in 0..=RANGE_GRID {
                let y = j as f64 / RANGE_GRID as f64;
                let p = self.pair_payoff(&x, &y);
                lo = lo.min(p);
                hi = hi.max(p);
            }
        }
        (lo, hi)
    }

    fn pair_payoff(&self, me: &f64, other: &f64) -> f64 {
        self.benefit(me + other) - self.cost(*me)
    }

    fn trait_index(&self, _t: &f64) -> Option<usize> {
        None
    }

    fn trait_from_index(&self, _k: usize) -> Option<f64> {
        None
    }

    fn write_trait(&self, t: &f64, out: &mut [f64]) {
        out[0] += t;
    }

    fn random_trait<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.random::<f64>()
    }

    fn mutate<R: Rng + ?Sized>(&self, t: &f64, rng: &mut R) -> f64 {
        match Normal::new(*t, self.mutation_sd) {
            Ok(step) => step.sample(rng).clamp(0.0, 1.0),
            Err(_) => *t,
        }
    }
}

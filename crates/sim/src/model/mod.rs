//! Trait representations.
//!
//! A [`TraitModel`] defines what an individual carries (its trait), how traits
//! interact to produce payoffs and how traits mutate. The engine treats traits
//! as opaque values and only calls back into the model.
//!
//! Shipped models:
//! - [`MatrixGame`]: discrete traits, pairwise `n × n` payoff matrix
//! - [`PublicGoods`]: cooperators and defectors in group interactions
//! - [`ConstantSelection`]: fixed fitness per trait, no interactions
//! - [`ContinuousSnowdrift`]: continuous investment in `[0, 1]`

mod continuous;
mod discrete;

pub use continuous::ContinuousSnowdrift;
pub use discrete::{ConstantSelection, MatrixGame, PublicGoods};

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How payoffs are generated from an interaction group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    /// Independent two-player games with every group member.
    Pairwise,
    /// A single game among the focal individual and its whole group.
    Group,
}

/// Parameters of the ecological (variable population size) update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ecology {
    /// Per-capita death rate; births happen at rate equal to fitness.
    pub death_rate: f64,
}

/// A trait representation consumed by the population engine.
pub trait TraitModel: fmt::Debug + Send + Sync {
    /// The value an individual carries.
    type Trait: Copy + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync;

    /// Number of discrete traits, or `0` for continuous traits.
    fn number_of_traits(&self) -> usize;

    /// Lower and upper bound of any score an individual can obtain.
    fn payoff_range(&self) -> (f64, f64);

    /// Scores depend only on an individual's own trait.
    fn is_static(&self) -> bool {
        false
    }

    /// Score of a trait under static (constant) selection.
    fn static_score(&self, _t: &Self::Trait) -> f64 {
        0.0
    }

    /// Trait whose frequency is implied by the others (normalized models).
    fn dependent_trait_index(&self) -> Option<usize> {
        None
    }

    fn interaction(&self) -> Interaction {
        Interaction::Pairwise
    }

    /// Payoff to `me` from a single pairwise interaction with `other`.
    fn pair_payoff(&self, me: &Self::Trait, other: &Self::Trait) -> f64;

    /// Payoff to `me` from one group interaction with `others`.
    ///
    /// Defaults to the mean pairwise payoff.
    fn group_payoff(&self, me: &Self::Trait, others: &[Self::Trait]) -> f64 {
        if others.is_empty() {
            return 0.0;
        }
        others.iter().map(|o| self.pair_payoff(me, o)).sum::<f64>() / others.len() as f64
    }

    /// Index of a discrete trait; `None` for continuous traits.
    fn trait_index(&self, t: &Self::Trait) -> Option<usize>;

    /// Discrete trait with index `k`.
    fn trait_from_index(&self, k: usize) -> Option<Self::Trait>;

    /// Length of the buffer filled by [`TraitModel::write_trait`].
    fn trait_dimensions(&self) -> usize {
        self.number_of_traits().max(1)
    }

    /// Add the embedding of `t` to `out` (one-hot for discrete traits).
    fn write_trait(&self, t: &Self::Trait, out: &mut [f64]) {
        if let Some(k) = self.trait_index(t) {
            out[k] += 1.0;
        }
    }

    fn random_trait<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Trait;

    /// Mutant offspring of `t`.
    fn mutate<R: Rng + ?Sized>(&self, t: &Self::Trait, rng: &mut R) -> Self::Trait;

    /// Best reply of `focal` against the traits of its group.
    ///
    /// `None` means the model has no best response; requesting the
    /// best-response update rule then fails at first use.
    fn best_response(&self, _focal: &Self::Trait, _group: &[Self::Trait]) -> Option<Self::Trait> {
        None
    }

    /// Ecological parameters; `None` if the model does not support
    /// variable population sizes.
    fn ecology(&self) -> Option<Ecology> {
        None
    }
}

/// Uniformly pick a discrete trait different from `current`.
pub(crate) fn mutate_discrete<R: Rng + ?Sized>(current: usize, n: usize, rng: &mut R) -> usize {
    if n < 2 {
        return current;
    }
    let k = rng.random_range(0..n - 1);
    if k >= current {
        k + 1
    } else {
        k
    }
}

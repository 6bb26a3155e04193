use super::{mutate_discrete, Ecology, Interaction, TraitModel};
use crate::errors::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Index of the cooperative trait in the two-trait games.
pub const COOPERATE: usize = 0;
/// Index of the defecting trait in the two-trait games.
pub const DEFECT: usize = 1;

/// Symmetric two-player game with `n` discrete traits.
///
/// `payoffs[i][j]` is the payoff of trait `i` against trait `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixGame {
    payoffs: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ecology: Option<Ecology>,
}

impl MatrixGame {
    pub fn new(payoffs: Vec<Vec<f64>>) -> Result<Self, ConfigError> {
        let n = payoffs.len();
        if n == 0 || payoffs.iter().any(|row| row.len() != n) {
            return Err(ConfigError::Incompatible(
                "payoff matrix must be square and non-empty".into(),
            ));
        }
        if payoffs.iter().flatten().any(|a| !a.is_finite()) {
            return Err(ConfigError::Incompatible(
                "payoff matrix entries must be finite".into(),
            ));
        }
        Ok(Self {
            payoffs,
            ecology: None,
        })
    }

    /// Donation game: cooperators pay `cost` to give `benefit` to the partner.
    pub fn prisoners_dilemma(benefit: f64, cost: f64) -> Self {
        Self {
            payoffs: vec![vec![benefit - cost, -cost], vec![benefit, 0.0]],
            ecology: None,
        }
    }

    /// Snowdrift game: the cost of cooperation is shared between cooperators.
    pub fn snowdrift(benefit: f64, cost: f64) -> Self {
        Self {
            payoffs: vec![
                vec![benefit - cost / 2.0, benefit - cost],
                vec![benefit, 0.0],
            ],
            ecology: None,
        }
    }

    /// Enable the ecological update with the given per-capita death rate.
    pub fn with_ecology(mut self, death_rate: f64) -> Self {
        self.ecology = Some(Ecology { death_rate });
        self
    }

    pub fn payoffs(&self) -> &[Vec<f64>] {
        &self.payoffs
    }
}

impl TraitModel for MatrixGame {
    type Trait = usize;

    fn number_of_traits(&self) -> usize {
        self.payoffs.len()
    }

    fn payoff_range(&self) -> (f64, f64) {
        self.payoffs
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &a| {
                (lo.min(a), hi.max(a))
            })
    }

    fn pair_payoff(&self, me: &usize, other: &usize) -> f64 {
        self.payoffs[*me][*other]
    }

    fn trait_index(&self, t: &usize) -> Option<usize> {
        Some(*t)
    }

    fn trait_from_index(&self, k: usize) -> Option<usize> {
        (k < self.payoffs.len()).then_some(k)
    }

    fn random_trait<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(0..self.payoffs.len())
    }

    fn mutate<R: Rng + ?Sized>(&self, t: &usize, rng: &mut R) -> usize {
        mutate_discrete(*t, self.payoffs.len(), rng)
    }

    /// Trait with the highest total payoff against the group; the current
    /// trait wins ties, otherwise the lowest index does.
    fn best_response(&self, focal: &usize, group: &[usize]) -> Option<usize> {
        let total = |k: usize| group.iter().map(|&j| self.payoffs[k][j]).sum::<f64>();
        let mut best = *focal;
        let mut best_payoff = total(best);
        for k in 0..self.payoffs.len() {
            let payoff = total(k);
            if payoff > best_payoff {
                best = k;
                best_payoff = payoff;
            }
        }
        Some(best)
    }

    fn ecology(&self) -> Option<Ecology> {
        self.ecology
    }
}

/// Linear public goods game in groups.
///
/// Cooperators contribute `cost`; the pot is multiplied by `r` and shared
/// equally among all participants, defectors included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PublicGoods {
    pub r: f64,
    pub cost: f64,
}

impl PublicGoods {
    pub fn new(r: f64, cost: f64) -> Result<Self, ConfigError> {
        if r < 0.0 {
            return Err(ConfigError::invalid("r", r, "must be non-negative"));
        }
        if cost < 0.0 {
            return Err(ConfigError::invalid("cost", cost, "must be non-negative"));
        }
        Ok(Self { r, cost })
    }
}

impl TraitModel for PublicGoods {
    type Trait = usize;

    fn number_of_traits(&self) -> usize {
        2
    }

    fn payoff_range(&self) -> (f64, f64) {
        (-self.cost, self.r * self.cost)
    }

    fn interaction(&self) -> Interaction {
        Interaction::Group
    }

    fn pair_payoff(&self, me: &usize, other: &usize) -> f64 {
        self.group_payoff(me, std::slice::from_ref(other))
    }

    fn group_payoff(&self, me: &usize, others: &[usize]) -> f64 {
        let cooperators = others.iter().filter(|&&t| t == COOPERATE).count()
            + usize::from(*me == COOPERATE);
        let share = self.r * self.cost * cooperators as f64 / (others.len() + 1) as f64;
        if *me == COOPERATE {
            share - self.cost
        } else {
            share
        }
    }

    fn trait_index(&self, t: &usize) -> Option<usize> {
        Some(*t)
    }

    fn trait_from_index(&self, k: usize) -> Option<usize> {
        (k < 2).then_some(k)
    }

    fn random_trait<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(0..2)
    }

    fn mutate<R: Rng + ?Sized>(&self, t: &usize, _rng: &mut R) -> usize {
        1 - *t
    }

    fn best_response(&self, _focal: &usize, group: &[usize]) -> Option<usize> {
        // own contribution returns r/(n+1) of its cost
        if self.r > (group.len() + 1) as f64 {
            Some(COOPERATE)
        } else {
            Some(DEFECT)
        }
    }
}

/// Constant selection: every trait has a fixed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantSelection {
    scores: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ecology: Option<Ecology>,
}

impl ConstantSelection {
    pub fn new(scores: Vec<f64>) -> Result<Self, ConfigError> {
        if scores.is_empty() {
            return Err(ConfigError::Incompatible(
                "constant selection requires at least one trait".into(),
            ));
        }
        Ok(Self {
            scores,
            ecology: None,
        })
    }

    /// Resident with score 1 and a mutant with relative score `r`.
    pub fn mutant(r: f64) -> Self {
        Self {
            scores: vec![1.0, r],
            ecology: None,
        }
    }

    pub fn with_ecology(mut self, death_rate: f64) -> Self {
        self.ecology = Some(Ecology { death_rate });
        self
    }
}

impl TraitModel for ConstantSelection {
    type Trait = usize;

    fn number_of_traits(&self) -> usize {
        self.scores.len()
    }

    fn payoff_range(&self) -> (f64, f64) {
        self.scores
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &a| {
                (lo.min(a), hi.max(a))
            })
    }

    fn is_static(&self) -> bool {
        true
    }

    fn static_score(&self, t: &usize) -> f64 {
        self.scores[*t]
    }

    fn pair_payoff(&self, me: &usize, _other: &usize) -> f64 {
        self.scores[*me]
    }

    fn trait_index(&self, t: &usize) -> Option<usize> {
        Some(*t)
    }

    fn trait_from_index(&self, k: usize) -> Option<usize> {
        (k < self.scores.len()).then_some(k)
    }

    fn random_trait<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(0..self.scores.len())
    }

    fn mutate<R: Rng + ?Sized>(&self, t: &usize, rng: &mut R) -> usize {
        mutate_discrete(*t, self.scores.len(), rng)
    }

    fn best_response(&self, _focal: &usize, _group: &[usize]) -> Option<usize> {
        let mut best = 0;
        for (k, &s) in self.scores.iter().enumerate() {
            if s > self.scores[best] {
                best = k;
            }
        }
        Some(best)
    }

    fn ecology(&self) -> Option<Ecology> {
        self.ecology
    }
}

//! Score and fitness bookkeeping.
//!
//! The ledger owns the per-slot score, fitness and interaction arrays together
//! with the aggregates derived from them: the running fitness total, the
//! population extremes and the index of the fittest slot. Every write goes
//! through the operations here so that the aggregates stay consistent within a
//! single event.
//!
//! For well-mixed populations with discrete traits the per-slot arrays are
//! replaced by a per-trait lookup table: all individuals sharing a trait share
//! their score, so an event only touches a handful of table entries.
//!
//! Vacant slots carry `score == fitness == 0` and an interaction count of `-1`.

use crate::base::fitness::{self, PayoffMap};
use crate::errors::SamplingError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Minimum number of candidates for rejection sampling; smaller populations
/// use a cumulative scan.
pub const REJECTION_THRESHOLD: usize = 100;

/// Interaction count marking a vacant slot.
pub const VACANT: i32 = -1;

/// Upper limit of rejection trials per slot before sampling is declared
/// exhausted.
const REJECTION_TRIALS_PER_SLOT: usize = 10_000;

/// How payoffs of several interactions are combined into a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Score is the mean payoff per interaction.
    #[default]
    Average,
    /// Score is the total payoff.
    Accumulate,
}

/// Per-trait score table for well-mixed populations.
#[derive(Debug, Clone)]
struct TraitTable {
    slot_trait: Vec<usize>,
    counts: Vec<usize>,
    scores: Vec<f64>,
    fitness: Vec<f64>,
}

impl TraitTable {
    /// Highest fitness among traits present, ignoring one member of `skip`.
    fn max_fitness(&self, skip: Option<usize>) -> f64 {
        self.counts
            .iter()
            .zip(&self.fitness)
            .enumerate()
            .filter(|&(k, (&n, _))| n > usize::from(skip == Some(k)))
            .map(|(_, (_, &f))| f)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn min_fitness(&self) -> f64 {
        self.counts
            .iter()
            .zip(&self.fitness)
            .filter(|&(&n, _)| n > 0)
            .map(|(_, &f)| f)
            .fold(f64::INFINITY, f64::min)
    }
}

/// Persistable ledger contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub scores: Vec<f64>,
    pub fitness: Vec<f64>,
    pub interactions: Vec<i32>,
    pub sum_fitness: f64,
    pub min_fitness: f64,
    pub max_fitness: f64,
    pub max_idx: Option<usize>,
    #[serde(default)]
    pub min_stale: bool,
}

/// Fitness ledger of one population.
#[derive(Debug, Clone)]
pub struct FitnessLedger {
    map: PayoffMap,
    scoring: ScoringMode,
    scores: Vec<f64>,
    fitness: Vec<f64>,
    interactions: Vec<i32>,
    table: Option<TraitTable>,
    occupied: usize,
    sum_fitness: f64,
    min_fitness: f64,
    max_fitness: f64,
    /// Fittest occupied slot; `None` when tracking is disabled.
    max_idx: Option<usize>,
    track_max: bool,
    /// The slot holding the minimum rose or left, so `min_fitness` is only a
    /// lower bound until the next [`Self::refresh_extrema`].
    min_stale: bool,
}

impl FitnessLedger {
    /// Ledger for `capacity` occupied slots with zero scores.
    ///
    /// `track_max` enables exact tracking of the fittest slot; without it the
    /// maximum is only an upper bound refreshed on structural changes.
    pub fn new(capacity: usize, map: PayoffMap, scoring: ScoringMode, track_max: bool) -> Self {
        Self {
            map,
            scoring,
            scores: vec![0.0; capacity],
            fitness: vec![0.0; capacity],
            interactions: vec![0; capacity],
            table: None,
            occupied: capacity,
            sum_fitness: 0.0,
            min_fitness: 0.0,
            max_fitness: 0.0,
            max_idx: if track_max && capacity > 0 { Some(0) } else { None },
            track_max,
            min_stale: false,
        }
    }

    /// Switch to per-trait bookkeeping; `slot_traits[i]` is the trait index of
    /// slot `i`. Vacant slots are not supported in this mode.
    pub fn enable_trait_table(&mut self, n_traits: usize, slot_traits: &[usize]) {
        let mut counts = vec![0; n_traits];
        for &k in slot_traits {
            counts[k] += 1;
        }
        self.table = Some(TraitTable {
            slot_trait: slot_traits.to_vec(),
            counts,
            scores: vec![0.0; n_traits],
            fitness: vec![0.0; n_traits],
        });
        self.max_idx = None;
        self.refresh_extrema();
    }

    pub fn uses_trait_table(&self) -> bool {
        self.table.is_some()
    }

    pub fn capacity(&self) -> usize {
        self.interactions.len()
    }

    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn payoff_map(&self) -> PayoffMap {
        self.map
    }

    pub fn scoring(&self) -> ScoringMode {
        self.scoring
    }

    #[inline]
    pub fn is_vacant(&self, i: usize) -> bool {
        self.interactions[i] == VACANT
    }

    #[inline]
    pub fn score_at(&self, i: usize) -> f64 {
        match &self.table {
            Some(t) if !self.is_vacant(i) => t.scores[t.slot_trait[i]],
            _ => self.scores[i],
        }
    }

    #[inline]
    pub fn fitness_at(&self, i: usize) -> f64 {
        match &self.table {
            Some(t) if !self.is_vacant(i) => t.fitness[t.slot_trait[i]],
            _ => self.fitness[i],
        }
    }

    #[inline]
    pub fn interactions_at(&self, i: usize) -> i32 {
        self.interactions[i]
    }

    pub fn sum_fitness(&self) -> f64 {
        self.sum_fitness
    }

    /// Lowest occupied fitness. Between a rescoring step and
    /// [`Self::settle_extrema`] this may lag below the true minimum.
    pub fn min_fitness(&self) -> f64 {
        self.min_fitness
    }

    pub fn max_fitness(&self) -> f64 {
        self.max_fitness
    }

    pub fn max_idx(&self) -> Option<usize> {
        self.max_idx
    }

    /// Fitness values are numerically indistinguishable.
    pub fn is_neutral(&self) -> bool {
        fitness::is_neutral(self.min_fitness, self.max_fitness)
    }

    /// Mean fitness of occupied slots.
    pub fn mean_fitness(&self) -> f64 {
        if self.occupied == 0 {
            0.0
        } else {
            self.sum_fitness / self.occupied as f64
        }
    }

    /// Fitness total recomputed from the per-slot values.
    pub fn recomputed_sum(&self) -> f64 {
        match &self.table {
            Some(t) => t
                .counts
                .iter()
                .zip(&t.fitness)
                .map(|(&n, &f)| n as f64 * f)
                .sum(),
            None => (0..self.capacity())
                .filter(|&i| !self.is_vacant(i))
                .map(|i| self.fitness[i])
                .sum(),
        }
    }

    /// Zero the score of slot `i` ahead of a new round of interactions.
    /// No-op for vacant slots and under per-trait bookkeeping.
    pub fn reset_score_at(&mut self, i: usize) {
        if self.is_vacant(i) || self.table.is_some() {
            return;
        }
        let old = self.fitness[i];
        self.scores[i] = 0.0;
        self.fitness[i] = 0.0;
        self.interactions[i] = 0;
        self.commit_fitness(i, old, 0.0);
    }

    /// Zero every occupied slot without updating the extremes; callers
    /// rescore the whole population and then call [`Self::refresh_extrema`].
    pub fn reset_all(&mut self) {
        for i in 0..self.capacity() {
            if !self.is_vacant(i) {
                self.scores[i] = 0.0;
                self.fitness[i] = 0.0;
                self.interactions[i] = 0;
            }
        }
        self.sum_fitness = 0.0;
    }

    /// Set slot `i` to the outcome of `count` interactions with total payoff
    /// `payoff`, replacing whatever it held before.
    pub fn set_score_at(&mut self, i: usize, payoff: f64, count: u32) {
        if self.is_vacant(i) {
            return;
        }
        let score = match self.scoring {
            ScoringMode::Average if count > 0 => payoff / count as f64,
            ScoringMode::Average => 0.0,
            ScoringMode::Accumulate => payoff,
        };
        self.scores[i] = score;
        self.interactions[i] = count as i32;
        self.write_fitness(i, self.map.fitness(score));
    }

    /// Add (or, with negative `count`, remove) the payoff of `count`
    /// interactions to slot `i`.
    pub fn update_score_at(&mut self, i: usize, delta: f64, count: i32) {
        if self.is_vacant(i) {
            return;
        }
        let n = self.interactions[i];
        let m = (n + count).max(0);
        self.scores[i] = if m == 0 {
            0.0
        } else {
            match self.scoring {
                ScoringMode::Average => (self.scores[i] * n as f64 + delta) / m as f64,
                ScoringMode::Accumulate => self.scores[i] + delta,
            }
        };
        self.interactions[i] = m;
        self.write_fitness(i, self.map.fitness(self.scores[i]));
    }

    /// Mark slot `i` as vacant, removing its fitness from the total.
    pub fn set_vacant_at(&mut self, i: usize) {
        if self.is_vacant(i) {
            return;
        }
        let old = self.fitness_at(i);
        if let Some(t) = &mut self.table {
            t.counts[t.slot_trait[i]] -= 1;
        }
        self.scores[i] = 0.0;
        self.fitness[i] = 0.0;
        self.interactions[i] = VACANT;
        self.occupied -= 1;
        self.adjust_sum(-old);
        if self.max_idx == Some(i) || self.occupied == 0 || self.table.is_some() {
            self.refresh_extrema();
        } else if old <= self.min_fitness {
            self.min_stale = true;
        }
    }

    /// Mark slot `i` as occupied with a zero score. The caller scores the new
    /// occupant right after.
    pub fn set_occupied_at(&mut self, i: usize) {
        if !self.is_vacant(i) {
            return;
        }
        self.scores[i] = 0.0;
        self.fitness[i] = 0.0;
        self.interactions[i] = 0;
        self.occupied += 1;
        if self.max_idx.is_none() && self.track_max {
            self.max_idx = Some(i);
            self.max_fitness = 0.0;
        }
        self.min_fitness = self.min_fitness.min(0.0);
    }

    /// Exchange the contents of two slots, vacancy included.
    pub fn swap(&mut self, i: usize, j: usize) {
        self.scores.swap(i, j);
        self.fitness.swap(i, j);
        self.interactions.swap(i, j);
        if let Some(t) = &mut self.table {
            t.slot_trait.swap(i, j);
        }
        self.max_idx = match self.max_idx {
            Some(m) if m == i => Some(j),
            Some(m) if m == j => Some(i),
            other => other,
        };
    }

    /// Move slot `i` in the per-trait table to trait `k`.
    pub fn assign_trait_at(&mut self, i: usize, k: usize) {
        let vacant = self.is_vacant(i);
        let Some(t) = &mut self.table else {
            return;
        };
        let old = t.slot_trait[i];
        if old == k {
            return;
        }
        let diff = t.fitness[k] - t.fitness[old];
        t.slot_trait[i] = k;
        if !vacant {
            t.counts[old] -= 1;
            t.counts[k] += 1;
            self.adjust_sum(diff);
            self.refresh_extrema();
        }
    }

    /// Number of occupied slots per trait in the per-trait table.
    pub fn trait_counts(&self) -> Option<&[usize]> {
        self.table.as_ref().map(|t| t.counts.as_slice())
    }

    /// Install per-trait payoffs: `payoffs[k]` is the total payoff an
    /// individual with trait `k` collects from `count` interactions.
    pub fn set_trait_scores(&mut self, payoffs: &[f64], count: u32) {
        let Some(t) = &mut self.table else {
            return;
        };
        for (k, &payoff) in payoffs.iter().enumerate() {
            let score = match self.scoring {
                ScoringMode::Average if count > 0 => payoff / count as f64,
                ScoringMode::Average => 0.0,
                ScoringMode::Accumulate => payoff,
            };
            t.scores[k] = score;
            t.fitness[k] = self.map.fitness(score);
        }
        for i in 0..self.interactions.len() {
            if self.interactions[i] != VACANT {
                self.interactions[i] = count as i32;
            }
        }
        self.sum_fitness = self.recomputed_sum();
        self.refresh_extrema();
    }

    /// Recompute the fitness total from scratch.
    pub fn recompute_sum(&mut self) {
        self.sum_fitness = self.recomputed_sum();
    }

    /// Recompute extremes and the fittest slot with a full scan.
    pub fn refresh_extrema(&mut self) {
        self.min_stale = false;
        if let Some(t) = &self.table {
            self.max_fitness = t.max_fitness(None);
            self.min_fitness = t.min_fitness();
            if self.occupied == 0 {
                self.max_fitness = 0.0;
                self.min_fitness = 0.0;
            }
            return;
        }
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        let mut idx = None;
        for i in 0..self.capacity() {
            if self.is_vacant(i) {
                continue;
            }
            let f = self.fitness[i];
            lo = lo.min(f);
            if f > hi {
                hi = f;
                idx = Some(i);
            }
        }
        if idx.is_none() {
            lo = 0.0;
            hi = 0.0;
        }
        self.min_fitness = lo;
        self.max_fitness = hi;
        self.max_idx = if self.track_max { idx } else { None };
    }

    /// Rescan if the minimum may have risen since the last scan.
    pub fn settle_extrema(&mut self) {
        if self.min_stale {
            self.refresh_extrema();
        }
    }

    /// Pick an occupied slot with probability proportional to its fitness,
    /// optionally excluding one slot.
    ///
    /// Neutral populations, and populations where every fitness is zero, are
    /// sampled uniformly.
    pub fn pick_fit_focal<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        exclude: Option<usize>,
    ) -> Result<usize, SamplingError> {
        let exclude = exclude.filter(|&e| e < self.capacity() && !self.is_vacant(e));
        let candidates = self.occupied - usize::from(exclude.is_some());
        if candidates == 0 {
            return Err(SamplingError::Empty);
        }
        if self.is_neutral() {
            return self.pick_uniform(rng, exclude);
        }
        if candidates >= REJECTION_THRESHOLD {
            let bound = self.fitness_bound(exclude);
            if bound > 0.0 {
                return self.pick_by_rejection(rng, exclude, bound);
            }
            return self.pick_uniform(rng, exclude);
        }
        self.pick_by_scan(rng, exclude)
    }

    /// Pick an occupied slot uniformly at random, optionally excluding one.
    pub fn pick_uniform<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        exclude: Option<usize>,
    ) -> Result<usize, SamplingError> {
        let n = self.capacity();
        let exclude = exclude.filter(|&e| e < n && !self.is_vacant(e));
        let candidates = self.occupied - usize::from(exclude.is_some());
        if candidates == 0 {
            return Err(SamplingError::Empty);
        }
        if self.occupied == n {
            let k = rng.random_range(0..candidates);
            return Ok(match exclude {
                Some(e) if k >= e => k + 1,
                _ => k,
            });
        }
        if 2 * self.occupied >= n {
            loop {
                let i = rng.random_range(0..n);
                if !self.is_vacant(i) && Some(i) != exclude {
                    return Ok(i);
                }
            }
        }
        let k = rng.random_range(0..candidates);
        (0..n)
            .filter(|&i| !self.is_vacant(i) && Some(i) != exclude)
            .nth(k)
            .ok_or(SamplingError::Empty)
    }

    /// Pick one of `candidates` with probability proportional to fitness and
    /// return its position; uniform if all fitness values are zero.
    pub fn pick_fit_among<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        candidates: &[usize],
    ) -> Result<Option<usize>, SamplingError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let total: f64 = candidates.iter().map(|&i| self.fitness_at(i)).sum();
        if total <= 0.0 {
            return Ok(Some(rng.random_range(0..candidates.len())));
        }
        let hit = rng.random::<f64>() * total;
        let mut acc = 0.0;
        for (pos, &i) in candidates.iter().enumerate() {
            acc += self.fitness_at(i);
            if hit < acc {
                return Ok(Some(pos));
            }
        }
        // hit can round up to the total
        if hit <= acc {
            return Ok(Some(candidates.len() - 1));
        }
        Err(SamplingError::Exhausted { hit, total })
    }

    /// Upper bound on the fitness of any candidate.
    fn fitness_bound(&self, exclude: Option<usize>) -> f64 {
        if let Some(t) = &self.table {
            return t.max_fitness(exclude.map(|e| t.slot_trait[e]));
        }
        match (self.max_idx, exclude) {
            (Some(m), Some(e)) if m == e => (0..self.capacity())
                .filter(|&i| i != e && !self.is_vacant(i))
                .map(|i| self.fitness[i])
                .fold(f64::NEG_INFINITY, f64::max),
            _ => self.max_fitness,
        }
    }

    fn pick_by_rejection<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        exclude: Option<usize>,
        bound: f64,
    ) -> Result<usize, SamplingError> {
        let n = self.capacity();
        let trials = n.saturating_mul(REJECTION_TRIALS_PER_SLOT);
        for _ in 0..trials {
            let i = rng.random_range(0..n);
            if self.is_vacant(i) || Some(i) == exclude {
                continue;
            }
            if rng.random::<f64>() * bound < self.fitness_at(i) {
                return Ok(i);
            }
        }
        Err(SamplingError::Exhausted {
            hit: bound,
            total: self.sum_fitness,
        })
    }

    fn pick_by_scan<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        exclude: Option<usize>,
    ) -> Result<usize, SamplingError> {
        let n = self.capacity();
        let eligible = |i: &usize| !self.is_vacant(*i) && Some(*i) != exclude;
        let total: f64 = (0..n).filter(eligible).map(|i| self.fitness_at(i)).sum();
        if total <= 0.0 {
            return self.pick_uniform(rng, exclude);
        }
        let hit = rng.random::<f64>() * total;
        let mut acc = 0.0;
        let mut last = None;
        for i in (0..n).filter(eligible) {
            let f = self.fitness_at(i);
            acc += f;
            if hit < acc {
                return Ok(i);
            }
            if f > 0.0 {
                last = Some(i);
            }
        }
        match last {
            Some(i) if hit <= acc => Ok(i),
            _ => Err(SamplingError::Exhausted { hit, total }),
        }
    }

    fn write_fitness(&mut self, i: usize, new: f64) {
        let old = self.fitness[i];
        self.fitness[i] = new;
        self.commit_fitness(i, old, new);
    }

    /// Update aggregates after the fitness of slot `i` changed.
    fn commit_fitness(&mut self, i: usize, old: f64, new: f64) {
        self.adjust_sum(new - old);
        if new < self.min_fitness {
            self.min_fitness = new;
        } else if old <= self.min_fitness && new > old {
            self.min_stale = true;
        }
        if !self.track_max {
            self.max_fitness = self.max_fitness.max(new);
            return;
        }
        match self.max_idx {
            Some(m) if m == i => {
                if new >= old {
                    self.max_fitness = new;
                } else {
                    self.refresh_extrema();
                }
            }
            Some(_) if new <= self.max_fitness => {}
            _ => {
                self.max_idx = Some(i);
                self.max_fitness = new;
            }
        }
    }

    /// Apply a fitness delta to the running total. A delta that would remove
    /// more than the entire total signals accumulated rounding errors, and the
    /// total is recomputed instead.
    fn adjust_sum(&mut self, diff: f64) {
        if self.sum_fitness > 0.0 && -diff > self.sum_fitness {
            tracing::trace!(
                sum = self.sum_fitness,
                diff,
                "fitness total drifted, recomputing"
            );
            self.recompute_sum();
        } else {
            self.sum_fitness += diff;
        }
    }

    /// Export arrays and aggregates for persistence.
    pub fn state(&self) -> LedgerState {
        let n = self.capacity();
        LedgerState {
            scores: (0..n).map(|i| self.score_at(i)).collect(),
            fitness: (0..n).map(|i| self.fitness_at(i)).collect(),
            interactions: self.interactions.clone(),
            sum_fitness: self.sum_fitness,
            min_fitness: self.min_fitness,
            max_fitness: self.max_fitness,
            max_idx: self.max_idx,
            min_stale: self.min_stale,
        }
    }

    /// Restore arrays and aggregates exported by [`Self::state`]. A per-trait
    /// table, if enabled, must be re-installed by the caller beforehand.
    pub fn restore_state(&mut self, state: LedgerState) {
        self.occupied = state.interactions.iter().filter(|&&c| c != VACANT).count();
        if let Some(t) = &mut self.table {
            for (i, &k) in t.slot_trait.iter().enumerate() {
                if state.interactions[i] != VACANT {
                    t.scores[k] = state.scores[i];
                    t.fitness[k] = state.fitness[i];
                }
            }
        }
        self.scores = state.scores;
        self.fitness = state.fitness;
        self.interactions = state.interactions;
        self.sum_fitness = state.sum_fitness;
        self.min_fitness = state.min_fitness;
        self.max_fitness = state.max_fitness;
        self.max_idx = if self.track_max { state.max_idx } else { None };
        self.min_stale = state.min_stale;
    }
}

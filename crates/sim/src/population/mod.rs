//! Populations of individuals on a network.
//!
//! A [`Population`] is one species: `N` slots holding a trait each, a
//! [`FitnessLedger`] with their scores, and the interaction and competition
//! networks. It performs the elementary events (one update, one Moran event,
//! one ecological event, one migration) and synchronous sweeps; the scheduler
//! in [`crate::simulation`] decides when to call which.
//!
//! Scores are maintained with one of four [`ScoringStrategy`] variants picked
//! when the population is built.

pub mod group;
pub mod ledger;
pub mod rules;

pub use group::{Group, SamplingType};
pub use ledger::{FitnessLedger, LedgerState, ScoringMode, REJECTION_THRESHOLD, VACANT};
pub use rules::{Decision, RuleParams, UpdateRule};

use crate::errors::{ConfigError, SamplingError, SimError};
use crate::model::{Interaction, TraitModel};
use crate::network::{Geometry, Network};
use crate::simulation::parameters::{
    Initialization, MigrationConfig, MigrationType, MutationConfig, MutationKind,
    PopulationUpdate, SpeciesConfig,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How scores are kept up to date after a trait changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Scores depend on the own trait only.
    Static,
    /// Well-mixed with discrete traits: one score per trait.
    TraitTable,
    /// Pairwise games with all neighbors: adjust neighbor scores in place.
    Adjust,
    /// Reset and re-score the focal individual and its neighbors.
    Recompute,
}

impl ScoringStrategy {
    pub fn select<M: TraitModel>(
        model: &M,
        interaction: &Geometry,
        competition: &Geometry,
        sampling: SamplingType,
        vacancies: bool,
    ) -> Self {
        if model.is_static() {
            return Self::Static;
        }
        let pairwise_all =
            model.interaction() == Interaction::Pairwise && sampling == SamplingType::All;
        if pairwise_all
            && model.number_of_traits() > 0
            && !vacancies
            && interaction.is_well_mixed()
            && competition.is_well_mixed()
        {
            Self::TraitTable
        } else if pairwise_all {
            Self::Adjust
        } else {
            Self::Recompute
        }
    }
}

/// What an elementary event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Update,
    Mutation,
    Migration,
    Birth,
    Death,
    /// Nothing happened (e.g. empty reference group).
    Idle,
}

/// Outcome of one elementary event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    pub kind: EventKind,
    /// Slot the event was centered on.
    pub focal: usize,
    /// Trait written to `focal`, if it changed.
    pub adopted: Option<T>,
}

impl<T> Event<T> {
    fn idle(focal: usize) -> Self {
        Self {
            kind: EventKind::Idle,
            focal,
            adopted: None,
        }
    }
}

/// Persistable per-species state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationState<T> {
    pub traits: Vec<T>,
    pub tags: Vec<usize>,
    pub ledger: LedgerState,
    pub interaction: Geometry,
    pub competition: Geometry,
    pub remaining: Vec<usize>,
    pub migrations: u64,
}

/// One species.
#[derive(Debug, Clone)]
pub struct Population<M: TraitModel> {
    name: String,
    model: M,
    traits: Vec<M::Trait>,
    next_traits: Vec<M::Trait>,
    /// Index of the initial ancestor of each slot.
    tags: Vec<usize>,
    next_tags: Vec<usize>,
    ledger: FitnessLedger,
    interaction: Arc<Geometry>,
    competition: Arc<Geometry>,
    strategy: ScoringStrategy,
    update: PopulationUpdate,
    rule: UpdateRule,
    params: RuleParams,
    mutation: MutationConfig,
    migration: MigrationConfig,
    rate: f64,
    sync_fraction: f64,
    vacancy: f64,
    init: Initialization<M::Trait>,
    /// Discrete traits by index, for per-trait scoring.
    trait_values: Vec<M::Trait>,
    reference: Group,
    partners: Group,
    /// Slots not yet updated in the current once-each round.
    remaining: Vec<usize>,
    migrations: u64,
    scratch_fitness: Vec<f64>,
    scratch_traits: Vec<M::Trait>,
    scratch_payoffs: Vec<f64>,
}

impl<M: TraitModel + Clone> Population<M> {
    /// Build an uninitialized population; call [`Population::init`] before
    /// running events.
    pub fn from_config(cfg: &SpeciesConfig<M>) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let interaction = Arc::new(cfg.interaction.build(cfg.size)?);
        let competition = match &cfg.competition {
            Some(c) => Arc::new(c.build(cfg.size)?),
            None => Arc::clone(&interaction),
        };
        for net in [&interaction, &competition] {
            if net.size() != cfg.size {
                return Err(ConfigError::SizeMismatch {
                    network: net.size(),
                    population: cfg.size,
                });
            }
        }
        let vacancies = cfg.vacancy > 0.0 || cfg.update == PopulationUpdate::Ecology;
        let strategy = ScoringStrategy::select(
            &cfg.model,
            &interaction,
            &competition,
            cfg.interactions,
            vacancies,
        );
        let trait_values = if strategy == ScoringStrategy::TraitTable {
            (0..cfg.model.number_of_traits())
                .map(|k| cfg.model.trait_from_index(k))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    ConfigError::Incompatible("discrete model without trait lookup".into())
                })?
        } else {
            Vec::new()
        };
        Ok(Self {
            name: cfg.name.clone(),
            model: cfg.model.clone(),
            traits: Vec::new(),
            next_traits: Vec::new(),
            tags: Vec::new(),
            next_tags: Vec::new(),
            ledger: FitnessLedger::new(
                cfg.size,
                cfg.payoff_map,
                cfg.scoring,
                strategy != ScoringStrategy::Static,
            ),
            interaction,
            competition,
            strategy,
            update: cfg.update,
            rule: cfg.rule,
            params: cfg.rule_params,
            mutation: cfg.mutation,
            migration: cfg.migration,
            rate: cfg.rate,
            sync_fraction: cfg.sync_fraction,
            vacancy: cfg.vacancy,
            init: cfg.init.clone(),
            trait_values,
            reference: Group::new(cfg.reference),
            partners: Group::new(cfg.interactions),
            remaining: Vec::new(),
            migrations: 0,
            scratch_fitness: Vec::new(),
            scratch_traits: Vec::new(),
            scratch_payoffs: Vec::new(),
        })
    }
}

impl<M: TraitModel> Population<M> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Number of slots, vacant ones included.
    pub fn size(&self) -> usize {
        self.ledger.capacity()
    }

    pub fn occupied(&self) -> usize {
        self.ledger.occupied()
    }

    pub fn traits(&self) -> &[M::Trait] {
        &self.traits
    }

    pub fn tags(&self) -> &[usize] {
        &self.tags
    }

    pub fn ledger(&self) -> &FitnessLedger {
        &self.ledger
    }

    pub fn interaction(&self) -> &Geometry {
        &self.interaction
    }

    pub fn competition(&self) -> &Geometry {
        &self.competition
    }

    pub fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    pub fn update(&self) -> PopulationUpdate {
        self.update
    }

    pub(crate) fn force_update(&mut self, update: PopulationUpdate) {
        self.update = update;
    }

    pub fn rule(&self) -> UpdateRule {
        self.rule
    }

    pub fn mutation(&self) -> &MutationConfig {
        &self.mutation
    }

    pub fn migration(&self) -> &MigrationConfig {
        &self.migration
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Number of migration events so far.
    pub fn migrations(&self) -> u64 {
        self.migrations
    }

    pub fn is_extinct(&self) -> bool {
        self.ledger.occupied() == 0
    }

    /// All occupied slots carry the same trait.
    pub fn is_monomorphic(&self) -> bool {
        let mut occupied = (0..self.size()).filter(|&i| !self.ledger.is_vacant(i));
        match occupied.next() {
            Some(first) => occupied.all(|i| self.traits[i] == self.traits[first]),
            None => true,
        }
    }

    /// No further trait change is possible: extinct, or monomorphic without
    /// mutations.
    pub fn is_absorbed(&self) -> bool {
        self.is_extinct() || (self.is_monomorphic() && !self.mutation.is_active())
    }

    /// Scores can become negative after mapping to fitness.
    pub fn has_negative_fitness(&self) -> bool {
        self.min_possible_fitness() < 0.0
    }

    /// Lower bound of the fitness any individual can reach.
    pub fn min_possible_fitness(&self) -> f64 {
        let map = self.ledger.payoff_map();
        map.fitness_range(self.model.payoff_range()).0
    }

    /// Fill the population according to its initialization and score
    /// everyone from scratch.
    pub fn init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), SimError> {
        let n = self.size();
        self.traits = match self.init.clone() {
            Initialization::Uniform => (0..n).map(|_| self.model.random_trait(rng)).collect(),
            Initialization::Monomorphic { value } => vec![value; n],
            Initialization::Mutant { resident, mutant } => {
                let mut traits = vec![resident; n];
                traits[rng.random_range(0..n)] = mutant;
                traits
            }
            Initialization::Frequencies { weights } => {
                let total: f64 = weights.iter().sum();
                let mut traits = Vec::with_capacity(n);
                for _ in 0..n {
                    let hit = rng.random::<f64>() * total;
                    let mut acc = 0.0;
                    let mut k = weights.len() - 1;
                    for (idx, w) in weights.iter().enumerate() {
                        acc += w;
                        if hit < acc {
                            k = idx;
                            break;
                        }
                    }
                    traits.push(self.model.trait_from_index(k).ok_or(SimError::Unsupported(
                        "frequency initialization requires discrete traits",
                    ))?);
                }
                traits
            }
            Initialization::Explicit { traits } => traits,
        };
        self.next_traits = self.traits.clone();
        self.tags = (0..n).collect();
        self.next_tags = self.tags.clone();
        self.remaining.clear();
        self.migrations = 0;

        self.ledger = FitnessLedger::new(
            n,
            self.ledger.payoff_map(),
            self.ledger.scoring(),
            self.strategy != ScoringStrategy::Static,
        );
        if self.vacancy > 0.0 {
            for i in 0..n {
                if rng.random_bool(self.vacancy) {
                    self.ledger.set_vacant_at(i);
                }
            }
        }
        if self.strategy == ScoringStrategy::TraitTable {
            self.install_trait_table()?;
        }
        self.rescore_all(rng);
        Ok(())
    }

    fn install_trait_table(&mut self) -> Result<(), SimError> {
        let indices = self
            .traits
            .iter()
            .map(|t| self.model.trait_index(t))
            .collect::<Option<Vec<_>>>()
            .ok_or(SimError::Unsupported(
                "per-trait scoring requires discrete traits",
            ))?;
        self.ledger
            .enable_trait_table(self.model.number_of_traits(), &indices);
        Ok(())
    }

    /// Reset and recompute every score.
    pub fn rescore_all<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self.strategy {
            ScoringStrategy::TraitTable => self.refresh_trait_table(),
            ScoringStrategy::Static => {
                for i in 0..self.size() {
                    self.rescore_slot(i, rng);
                }
            }
            ScoringStrategy::Adjust | ScoringStrategy::Recompute => {
                self.ledger.reset_all();
                for i in 0..self.size() {
                    self.rescore_slot(i, rng);
                }
            }
        }
        self.ledger.recompute_sum();
        self.ledger.refresh_extrema();
    }

    /// Per-trait payoffs against everyone else in a well-mixed population.
    fn refresh_trait_table(&mut self) {
        let Some(counts) = self.ledger.trait_counts() else {
            return;
        };
        let partners = self.ledger.occupied().saturating_sub(1);
        self.scratch_payoffs.clear();
        for (k, me) in self.trait_values.iter().enumerate() {
            let mut payoff: f64 = counts
                .iter()
                .zip(&self.trait_values)
                .map(|(&c, other)| c as f64 * self.model.pair_payoff(me, other))
                .sum();
            if counts[k] > 0 {
                payoff -= self.model.pair_payoff(me, me);
            }
            self.scratch_payoffs.push(payoff);
        }
        self.ledger
            .set_trait_scores(&self.scratch_payoffs, partners as u32);
    }

    /// Score slot `i` against its interaction partners.
    fn rescore_slot<R: Rng + ?Sized>(&mut self, i: usize, rng: &mut R) {
        if self.ledger.is_vacant(i) {
            return;
        }
        let me = self.traits[i];
        if self.strategy == ScoringStrategy::Static {
            self.ledger.set_score_at(i, self.model.static_score(&me), 1);
            return;
        }
        let net = Arc::clone(&self.interaction);
        self.partners.sample_at(i, net.as_ref(), false, rng);
        let ledger = &self.ledger;
        self.partners.retain(|&j| !ledger.is_vacant(j));
        match self.model.interaction() {
            Interaction::Pairwise => {
                let payoff: f64 = self
                    .partners
                    .members()
                    .iter()
                    .map(|&j| self.model.pair_payoff(&me, &self.traits[j]))
                    .sum();
                self.ledger
                    .set_score_at(i, payoff, self.partners.size() as u32);
            }
            Interaction::Group if self.partners.is_empty() => {
                self.ledger.set_score_at(i, 0.0, 0);
            }
            Interaction::Group => {
                self.scratch_traits.clear();
                self.scratch_traits
                    .extend(self.partners.members().iter().map(|&j| self.traits[j]));
                let payoff = self.model.group_payoff(&me, &self.scratch_traits);
                self.ledger.set_score_at(i, payoff, 1);
            }
        }
    }

    /// Bring scores up to date after slot `i` changed from `old` (`None`
    /// if it was vacant) to its current content.
    fn update_scores_after<R: Rng + ?Sized>(
        &mut self,
        i: usize,
        old: Option<M::Trait>,
        rng: &mut R,
    ) {
        let now = (!self.ledger.is_vacant(i)).then(|| self.traits[i]);
        match self.strategy {
            ScoringStrategy::Static => self.rescore_slot(i, rng),
            ScoringStrategy::TraitTable => {
                if let Some(k) = now.and_then(|t| self.model.trait_index(&t)) {
                    self.ledger.assign_trait_at(i, k);
                }
                self.refresh_trait_table();
            }
            ScoringStrategy::Adjust => {
                self.rescore_slot(i, rng);
                let gained = i32::from(now.is_some()) - i32::from(old.is_some());
                let net = Arc::clone(&self.interaction);
                for_each_in_neighbor(&net, i, |j| {
                    if self.ledger.is_vacant(j) {
                        return;
                    }
                    let other = self.traits[j];
                    let before = old.map_or(0.0, |o| self.model.pair_payoff(&other, &o));
                    let after = now.map_or(0.0, |t| self.model.pair_payoff(&other, &t));
                    self.ledger.update_score_at(j, after - before, gained);
                });
            }
            ScoringStrategy::Recompute => {
                self.rescore_slot(i, rng);
                let net = Arc::clone(&self.interaction);
                if !net.is_well_mixed() {
                    for &j in net.neighbors_in(i) {
                        self.rescore_slot(j, rng);
                    }
                } else if self.partners.sampling() == SamplingType::All {
                    // everyone interacts with `i`
                    for j in (0..self.size()).filter(|&j| j != i) {
                        self.rescore_slot(j, rng);
                    }
                }
                // with random partner samples the other scores stay estimates
                // until those slots are rescored themselves
            }
        }
        self.ledger.settle_extrema();
    }

    /// Write trait `t` with ancestor `tag` to occupied slot `i`. Returns
    /// whether the trait changed.
    fn set_trait<R: Rng + ?Sized>(
        &mut self,
        i: usize,
        t: M::Trait,
        tag: usize,
        rng: &mut R,
    ) -> bool {
        self.tags[i] = tag;
        let old = self.traits[i];
        if old == t {
            return false;
        }
        self.traits[i] = t;
        self.update_scores_after(i, Some(old), rng);
        true
    }

    /// Write trait `t` to slot `i`, occupying it if vacant.
    fn place<R: Rng + ?Sized>(&mut self, i: usize, t: M::Trait, tag: usize, rng: &mut R) -> bool {
        if !self.ledger.is_vacant(i) {
            return self.set_trait(i, t, tag, rng);
        }
        self.ledger.set_occupied_at(i);
        self.traits[i] = t;
        self.tags[i] = tag;
        self.update_scores_after(i, None, rng);
        true
    }

    fn mutation_fires<R: Rng + ?Sized>(&self, kind: MutationKind, rng: &mut R) -> bool {
        self.mutation.kind == kind
            && self.mutation.is_active()
            && rng.random_bool(self.mutation.probability)
    }

    /// Offspring trait of `parent`, mutated with the mutation probability.
    fn offspring<R: Rng + ?Sized>(&self, parent: usize, rng: &mut R) -> (M::Trait, EventKind) {
        let t = self.traits[parent];
        if self.mutation.is_active() && rng.random_bool(self.mutation.probability) {
            (self.model.mutate(&t, rng), EventKind::Mutation)
        } else {
            (t, EventKind::Birth)
        }
    }

    /// Trait and ancestor slot `i` would adopt, or `None` if its reference
    /// group is empty.
    fn propose<R: Rng + ?Sized>(
        &mut self,
        i: usize,
        rng: &mut R,
    ) -> Result<Option<(EventKind, M::Trait, usize)>, SimError> {
        let current = self.traits[i];
        if self.mutation_fires(MutationKind::Temperature, rng) {
            let mutant = self.model.mutate(&current, rng);
            return Ok(Some((EventKind::Mutation, mutant, self.tags[i])));
        }
        let net = Arc::clone(&self.competition);
        self.reference.sample_at(i, net.as_ref(), false, rng);
        let ledger = &self.ledger;
        self.reference.retain(|&j| !ledger.is_vacant(j));
        if self.reference.is_empty() {
            return Ok(None);
        }
        if self.rule.is_best_response() {
            self.scratch_traits.clear();
            self.scratch_traits
                .extend(self.reference.members().iter().map(|&j| self.traits[j]));
            let reply = self
                .model
                .best_response(&current, &self.scratch_traits)
                .ok_or(SimError::Unsupported(
                    "best response is not defined for this trait model",
                ))?;
            return Ok(Some((EventKind::Update, reply, self.tags[i])));
        }
        self.scratch_fitness.clear();
        self.scratch_fitness
            .extend(self.reference.members().iter().map(|&j| self.ledger.fitness_at(j)));
        let decision = self.rule.decide(
            self.ledger.fitness_at(i),
            &self.scratch_fitness,
            &self.params,
            self.ledger.is_neutral(),
            rng,
            |_, _| false,
        );
        Ok(Some(match decision {
            Decision::Keep => (EventKind::Update, current, self.tags[i]),
            Decision::Adopt(pos) => {
                let j = self.reference.members()[pos];
                (EventKind::Update, self.traits[j], self.tags[j])
            }
        }))
    }

    /// Update the occupied slot `i` according to the update rule.
    pub fn update_at<R: Rng + ?Sized>(
        &mut self,
        i: usize,
        rng: &mut R,
    ) -> Result<Event<M::Trait>, SimError> {
        let Some((mut kind, t, tag)) = self.propose(i, rng)? else {
            return Ok(Event::idle(i));
        };
        let mut changed = self.set_trait(i, t, tag, rng);
        if self.mutation_fires(MutationKind::Random, rng) {
            let mutant = self.model.mutate(&self.traits[i], rng);
            changed |= self.set_trait(i, mutant, self.tags[i], rng);
            kind = EventKind::Mutation;
        }
        Ok(Event {
            kind,
            focal: i,
            adopted: changed.then(|| self.traits[i]),
        })
    }

    /// One elementary event of an asynchronous population. Migration, if
    /// enabled, preempts the update.
    pub fn event<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Event<M::Trait>, SimError> {
        if self.migration.is_active() && rng.random_bool(self.migration.probability) {
            return self.migrate(rng);
        }
        match self.update {
            PopulationUpdate::Async => {
                let i = self.ledger.pick_uniform(rng, None)?;
                self.update_at(i, rng)
            }
            PopulationUpdate::OnceEach => match self.next_once_each(rng) {
                Some(i) => self.update_at(i, rng),
                None => Err(SamplingError::Empty.into()),
            },
            PopulationUpdate::MoranBirthDeath => self.moran_birth_death(rng),
            PopulationUpdate::MoranDeathBirth => self.moran_death_birth(rng),
            PopulationUpdate::MoranImitate => self.moran_imitate(rng),
            PopulationUpdate::Ecology => self.ecology_event(rng),
            PopulationUpdate::Synchronous => Err(SimError::Unsupported(
                "synchronous populations advance by sweeps",
            )),
        }
    }

    /// Next slot of the current once-each round; a new round starts with
    /// all occupied slots once the previous one is used up.
    fn next_once_each<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
        if self.remaining.is_empty() {
            let ledger = &self.ledger;
            self.remaining
                .extend((0..ledger.capacity()).filter(|&i| !ledger.is_vacant(i)));
        }
        while !self.remaining.is_empty() {
            let k = rng.random_range(0..self.remaining.len());
            let i = self.remaining.swap_remove(k);
            if !self.ledger.is_vacant(i) {
                return Some(i);
            }
        }
        None
    }

    /// Uniformly random slot among the out-neighbors of `i`, vacant slots
    /// included; any other slot on well-mixed networks.
    fn random_neighbor<R: Rng + ?Sized>(&self, i: usize, rng: &mut R) -> Option<usize> {
        let net = &self.competition;
        if net.is_well_mixed() {
            let n = net.size();
            if n < 2 {
                return None;
            }
            let k = rng.random_range(0..n - 1);
            return Some(if k >= i { k + 1 } else { k });
        }
        let links = net.neighbors_out(i);
        if links.is_empty() {
            return None;
        }
        Some(links[rng.random_range(0..links.len())])
    }

    /// Fitness-proportional pick among the occupied in-neighbors of `i`
    /// drawn with the reference sampling (plus `i` itself if
    /// `include_self`); the whole population on well-mixed networks.
    fn fit_neighbor<R: Rng + ?Sized>(
        &mut self,
        i: usize,
        include_self: bool,
        rng: &mut R,
    ) -> Result<Option<usize>, SimError> {
        if self.competition.is_well_mixed() {
            let exclude = (!include_self).then_some(i);
            if self.ledger.occupied() - usize::from(exclude.is_some()) == 0 {
                return Ok(None);
            }
            return Ok(Some(self.ledger.pick_fit_focal(rng, exclude)?));
        }
        let net = Arc::clone(&self.competition);
        self.reference.sample_in_at(i, net.as_ref(), include_self, rng);
        let ledger = &self.ledger;
        self.reference.retain(|&j| !ledger.is_vacant(j));
        let picked = self.ledger.pick_fit_among(rng, self.reference.members())?;
        Ok(picked.map(|p| self.reference.members()[p]))
    }

    fn moran_birth_death<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Event<M::Trait>, SimError> {
        let source = self.ledger.pick_fit_focal(rng, None)?;
        let Some(target) = self.random_neighbor(source, rng) else {
            return Ok(Event::idle(source));
        };
        let (t, kind) = self.offspring(source, rng);
        let changed = self.place(target, t, self.tags[source], rng);
        Ok(Event {
            kind,
            focal: target,
            adopted: changed.then_some(t),
        })
    }

    fn moran_death_birth<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Event<M::Trait>, SimError> {
        let target = self.ledger.pick_uniform(rng, None)?;
        let Some(source) = self.fit_neighbor(target, false, rng)? else {
            return Ok(Event::idle(target));
        };
        let (t, kind) = self.offspring(source, rng);
        let changed = self.place(target, t, self.tags[source], rng);
        Ok(Event {
            kind,
            focal: target,
            adopted: changed.then_some(t),
        })
    }

    fn moran_imitate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Event<M::Trait>, SimError> {
        let target = self.ledger.pick_uniform(rng, None)?;
        let Some(source) = self.fit_neighbor(target, true, rng)? else {
            return Ok(Event::idle(target));
        };
        let (t, kind) = self.offspring(source, rng);
        let kind = if kind == EventKind::Birth {
            EventKind::Update
        } else {
            kind
        };
        let changed = self.place(target, t, self.tags[source], rng);
        Ok(Event {
            kind,
            focal: target,
            adopted: changed.then_some(t),
        })
    }

    /// Random individual dies with the death rate or reproduces into a
    /// vacant neighboring slot with rate equal to its fitness.
    fn ecology_event<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Event<M::Trait>, SimError> {
        let eco = self.model.ecology().ok_or(SimError::Unsupported(
            "ecological updates are not defined for this trait model",
        ))?;
        let i = self.ledger.pick_uniform(rng, None)?;
        let birth = self.ledger.fitness_at(i).max(0.0);
        let max_rate = self.ledger.max_fitness().max(birth) + eco.death_rate;
        if max_rate <= 0.0 {
            return Ok(Event::idle(i));
        }
        let hit = rng.random::<f64>() * max_rate;
        if hit < eco.death_rate {
            let old = self.traits[i];
            self.ledger.set_vacant_at(i);
            self.update_scores_after(i, Some(old), rng);
            return Ok(Event {
                kind: EventKind::Death,
                focal: i,
                adopted: None,
            });
        }
        if hit >= eco.death_rate + birth {
            return Ok(Event::idle(i));
        }
        match self.random_neighbor(i, rng) {
            Some(target) if self.ledger.is_vacant(target) => {
                let (t, kind) = self.offspring(i, rng);
                self.place(target, t, self.tags[i], rng);
                Ok(Event {
                    kind,
                    focal: target,
                    adopted: Some(t),
                })
            }
            _ => Ok(Event::idle(i)),
        }
    }

    /// One migration event.
    pub fn migrate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Event<M::Trait>, SimError> {
        self.migrations += 1;
        match self.migration.kind {
            MigrationType::None => Ok(Event::idle(0)),
            MigrationType::Diffusion => {
                let i = self.ledger.pick_uniform(rng, None)?;
                let Some(j) = self.random_neighbor(i, rng) else {
                    return Ok(Event::idle(i));
                };
                self.swap_slots(i, j, rng);
                Ok(Event {
                    kind: EventKind::Migration,
                    focal: i,
                    adopted: None,
                })
            }
            MigrationType::BirthDeath => {
                let source = self.ledger.pick_fit_focal(rng, None)?;
                let n = self.size();
                if n < 2 {
                    return Ok(Event::idle(source));
                }
                let k = rng.random_range(0..n - 1);
                let target = if k >= source { k + 1 } else { k };
                let t = self.traits[source];
                let changed = self.place(target, t, self.tags[source], rng);
                Ok(Event {
                    kind: EventKind::Migration,
                    focal: target,
                    adopted: changed.then_some(t),
                })
            }
            MigrationType::DeathBirth => {
                let target = self.ledger.pick_uniform(rng, None)?;
                let Some(source) = self.fit_neighbor(target, false, rng)? else {
                    return Ok(Event::idle(target));
                };
                let t = self.traits[source];
                let changed = self.place(target, t, self.tags[source], rng);
                Ok(Event {
                    kind: EventKind::Migration,
                    focal: target,
                    adopted: changed.then_some(t),
                })
            }
        }
    }

    /// Exchange two slots; scores travel along unless they depend on the
    /// neighborhood.
    fn swap_slots<R: Rng + ?Sized>(&mut self, i: usize, j: usize, rng: &mut R) {
        self.traits.swap(i, j);
        self.tags.swap(i, j);
        self.ledger.swap(i, j);
        let net = Arc::clone(&self.interaction);
        match self.strategy {
            ScoringStrategy::Static | ScoringStrategy::TraitTable => {}
            _ if net.is_well_mixed() => {}
            ScoringStrategy::Adjust | ScoringStrategy::Recompute => {
                for k in [i, j] {
                    self.rescore_slot(k, rng);
                    for &l in net.neighbors_in(k) {
                        self.rescore_slot(l, rng);
                    }
                }
            }
        }
        self.ledger.settle_extrema();
    }

    /// Mutate a uniformly chosen individual; used when waiting times in
    /// homogeneous states are skipped.
    pub fn mutate_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Event<M::Trait>, SimError> {
        let i = self.ledger.pick_uniform(rng, None)?;
        let mutant = self.model.mutate(&self.traits[i], rng);
        let changed = self.set_trait(i, mutant, self.tags[i], rng);
        Ok(Event {
            kind: EventKind::Mutation,
            focal: i,
            adopted: changed.then_some(mutant),
        })
    }

    /// Decide the next trait of every (or a `sync_fraction` of every)
    /// occupied slot against the current state.
    pub fn prepare_sweep<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), SimError> {
        self.next_traits.clone_from(&self.traits);
        self.next_tags.clone_from(&self.tags);
        for i in 0..self.size() {
            if self.ledger.is_vacant(i) {
                continue;
            }
            if self.sync_fraction < 1.0 && !rng.random_bool(self.sync_fraction) {
                continue;
            }
            if let Some((_, mut t, tag)) = self.propose(i, rng)? {
                if self.mutation_fires(MutationKind::Random, rng) {
                    t = self.model.mutate(&t, rng);
                }
                self.next_traits[i] = t;
                self.next_tags[i] = tag;
            }
        }
        Ok(())
    }

    /// Commit the decisions of [`Population::prepare_sweep`] and rescore the
    /// population. Returns the number of slots whose trait changed.
    pub fn commit_sweep<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let mut changed = 0;
        for i in 0..self.size() {
            if self.traits[i] != self.next_traits[i] {
                changed += 1;
                if let Some(k) = self.model.trait_index(&self.next_traits[i]) {
                    self.ledger.assign_trait_at(i, k);
                }
            }
        }
        std::mem::swap(&mut self.traits, &mut self.next_traits);
        std::mem::swap(&mut self.tags, &mut self.next_tags);
        self.rescore_all(rng);
        changed
    }

    /// Number of values written by [`Population::mean_trait`].
    pub fn trait_dimensions(&self) -> usize {
        self.model.trait_dimensions()
    }

    /// Mean trait embedding of the occupied slots (trait frequencies for
    /// discrete traits).
    pub fn mean_trait(&self, out: &mut [f64]) {
        out.iter_mut().for_each(|x| *x = 0.0);
        for i in 0..self.size() {
            if !self.ledger.is_vacant(i) {
                self.model.write_trait(&self.traits[i], out);
            }
        }
        let n = self.ledger.occupied();
        if n > 0 {
            out.iter_mut().for_each(|x| *x /= n as f64);
        }
    }

    /// Number of values written by [`Population::mean_fitness`].
    pub fn fitness_dimensions(&self) -> usize {
        match self.model.number_of_traits() {
            0 => 1,
            n => n + 1,
        }
    }

    /// Mean fitness per discrete trait followed by the population mean;
    /// only the population mean for continuous traits.
    pub fn mean_fitness(&self, out: &mut [f64]) {
        out.iter_mut().for_each(|x| *x = 0.0);
        let n_traits = self.model.number_of_traits();
        if n_traits > 0 {
            let mut counts = vec![0usize; n_traits];
            for i in 0..self.size() {
                if self.ledger.is_vacant(i) {
                    continue;
                }
                if let Some(k) = self.model.trait_index(&self.traits[i]) {
                    counts[k] += 1;
                    out[k] += self.ledger.fitness_at(i);
                }
            }
            for (x, &c) in out.iter_mut().zip(&counts) {
                if c > 0 {
                    *x /= c as f64;
                }
            }
        }
        out[n_traits] = self.ledger.mean_fitness();
    }

    /// Export everything needed to resume.
    pub fn state(&self) -> PopulationState<M::Trait> {
        PopulationState {
            traits: self.traits.clone(),
            tags: self.tags.clone(),
            ledger: self.ledger.state(),
            interaction: (*self.interaction).clone(),
            competition: (*self.competition).clone(),
            remaining: self.remaining.clone(),
            migrations: self.migrations,
        }
    }

    /// Resume from a state exported by [`Population::state`].
    pub fn restore(&mut self, state: PopulationState<M::Trait>) -> Result<(), SimError> {
        let n = self.size();
        if state.traits.len() != n || state.tags.len() != n || state.ledger.fitness.len() != n {
            return Err(SimError::Snapshot(format!(
                "species '{}' expects {n} slots, snapshot holds {}",
                self.name,
                state.traits.len()
            )));
        }
        if state.interaction.size() != n || state.competition.size() != n {
            return Err(ConfigError::SizeMismatch {
                network: state.interaction.size(),
                population: n,
            }
            .into());
        }
        self.interaction = Arc::new(state.interaction);
        self.competition = if state.competition == *self.interaction {
            Arc::clone(&self.interaction)
        } else {
            Arc::new(state.competition)
        };
        self.traits = state.traits;
        self.tags = state.tags;
        self.next_traits = self.traits.clone();
        self.next_tags = self.tags.clone();
        self.ledger = FitnessLedger::new(
            n,
            self.ledger.payoff_map(),
            self.ledger.scoring(),
            self.strategy != ScoringStrategy::Static,
        );
        if self.strategy == ScoringStrategy::TraitTable {
            self.install_trait_table()?;
        }
        self.ledger.restore_state(state.ledger);
        self.remaining = state.remaining;
        self.migrations = state.migrations;
        Ok(())
    }
}

/// Call `f` for every slot that has `i` among its interaction partners.
fn for_each_in_neighbor(net: &Geometry, i: usize, mut f: impl FnMut(usize)) {
    if net.is_well_mixed() {
        (0..net.size()).filter(|&j| j != i).for_each(f);
    } else {
        net.neighbors_in(i).iter().for_each(|&j| f(j));
    }
}

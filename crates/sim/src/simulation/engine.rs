//! Simulation engine for evolutionary processes.
//!
//! [`Simulation::step`] advances all species by a requested number of
//! generations, one elementary event (or one synchronous sweep) at a time.
//! Two clocks advance together: generations, where `N` events make one
//! generation, and real time, where every event takes an exponentially
//! distributed waiting time with rate equal to the total fitness.

use crate::errors::{SamplingError, SimError};
use crate::model::TraitModel;
use crate::population::{Event, EventKind, Population};
use crate::simulation::parameters::{ExecutionConfig, PopulationUpdate};
use crate::simulation::species::SpeciesCoordinator;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp, Gamma, Geometric};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Fraction of an event (or sweep) by which a step may fall short of the
/// requested time.
const STEP_SLACK: f64 = 0.5;

/// An elementary event tagged with its species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord<T> {
    pub species: usize,
    pub event: Event<T>,
}

/// Main simulation engine.
#[derive(Debug)]
pub struct Simulation<M: TraitModel> {
    pub(crate) species: Vec<Population<M>>,
    pub(crate) coordinator: SpeciesCoordinator,
    execution: ExecutionConfig,
    seed: u64,
    /// Random number generator shared by every species
    pub(crate) rng: Xoshiro256PlusPlus,
    pub(crate) generation: f64,
    pub(crate) real_time: f64,
    pub(crate) updates: u64,
    pub(crate) converged: bool,
    synchronous: bool,
    optimize_homo: bool,
    /// Real time is meaningless when fitness can be negative.
    track_real_time: bool,
    trace: Option<Vec<EventRecord<M::Trait>>>,
}

impl<M: TraitModel> Simulation<M> {
    /// Assemble an engine from checked, uninitialized populations.
    pub(crate) fn new(
        species: Vec<Population<M>>,
        coordinator: SpeciesCoordinator,
        execution: ExecutionConfig,
        seed: u64,
    ) -> Self {
        let synchronous = species.iter().all(|p| p.update().is_synchronous());
        let track_real_time = species.iter().all(|p| !p.has_negative_fitness());
        let optimize_homo = execution.optimize_homo;
        Self {
            species,
            coordinator,
            execution,
            seed,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            generation: 0.0,
            real_time: 0.0,
            updates: 0,
            converged: false,
            synchronous,
            optimize_homo,
            track_real_time,
            trace: None,
        }
    }

    /// Draw new initial configurations for every species and reset the
    /// clocks. The random stream continues from its current state.
    pub fn init(&mut self) -> Result<(), SimError> {
        for pop in &mut self.species {
            pop.init(&mut self.rng)?;
        }
        self.generation = 0.0;
        self.real_time = if self.track_real_time { 0.0 } else { f64::INFINITY };
        self.updates = 0;
        self.converged = false;
        self.coordinator.set_cursor(0);
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
        Ok(())
    }

    /// Restart from the seed: re-initialize with a fresh random stream so the
    /// same trajectory is produced again.
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        self.init()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn execution(&self) -> &ExecutionConfig {
        &self.execution
    }

    pub fn species(&self) -> &[Population<M>] {
        &self.species
    }

    /// Elapsed generations.
    pub fn generation(&self) -> f64 {
        self.generation
    }

    /// Elapsed real time; infinite when disabled.
    pub fn real_time(&self) -> f64 {
        self.real_time
    }

    /// Number of elementary events (or sweeps) so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    /// Start or stop recording elementary events. Synchronous sweeps are
    /// not recorded.
    pub fn record_events(&mut self, on: bool) {
        self.trace = on.then(Vec::new);
    }

    /// Events recorded since [`Simulation::record_events`] was enabled.
    pub fn events(&self) -> &[EventRecord<M::Trait>] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Total number of migration events over all species.
    pub fn migrations(&self) -> u64 {
        self.species.iter().map(Population::migrations).sum()
    }

    /// Mean trait of every species.
    pub fn mean_trait(&self) -> Vec<Vec<f64>> {
        self.species
            .iter()
            .map(|p| {
                let mut out = vec![0.0; p.trait_dimensions()];
                p.mean_trait(&mut out);
                out
            })
            .collect()
    }

    /// Mean fitness of every species, per trait for discrete traits.
    pub fn mean_fitness(&self) -> Vec<Vec<f64>> {
        self.species
            .iter()
            .map(|p| {
                let mut out = vec![0.0; p.fitness_dimensions()];
                p.mean_fitness(&mut out);
                out
            })
            .collect()
    }

    /// One-line summary of the current state.
    pub fn status(&self) -> String {
        let mut status = format!("generation {:.2}", self.generation);
        if self.real_time.is_finite() {
            let _ = write!(status, ", time {:.3}", self.real_time);
        }
        for (pop, traits) in self.species.iter().zip(self.mean_trait()) {
            let traits = traits
                .iter()
                .map(|x| format!("{x:.3}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(
                status,
                "; {}: {}/{} occupied, mean fitness {:.4}, traits [{}]",
                pop.name(),
                pop.occupied(),
                pop.size(),
                pop.ledger().mean_fitness(),
                traits
            );
        }
        if self.converged {
            status.push_str(" (converged)");
        }
        status
    }

    fn total_occupied(&self) -> usize {
        self.species.iter().map(Population::occupied).sum()
    }

    fn check_converged(&self) -> bool {
        self.species.iter().all(Population::is_absorbed)
    }

    /// Advance by `requested` generations.
    ///
    /// Returns the elapsed generations, which may fall short of `requested`
    /// by at most half an event. A negative value `-elapsed` reports that the
    /// population converged; `-f64::MIN_POSITIVE` if it was converged from
    /// the start.
    pub fn step(&mut self, requested: f64) -> Result<f64, SimError> {
        if self.converged || self.check_converged() {
            self.mark_converged();
            return Ok(-f64::MIN_POSITIVE);
        }
        if !(requested > 0.0) {
            return Ok(0.0);
        }
        let mut elapsed = 0.0;
        if self.synchronous {
            while elapsed + STEP_SLACK < requested {
                self.sweep()?;
                elapsed += 1.0;
                if self.check_converged() {
                    self.mark_converged();
                    return Ok(-elapsed);
                }
            }
            return Ok(elapsed);
        }
        loop {
            let n = self.total_occupied();
            if n == 0 {
                self.mark_converged();
                return Ok(converged_increment(elapsed));
            }
            let unit = 1.0 / n as f64;
            if elapsed + STEP_SLACK * unit >= requested {
                return Ok(elapsed);
            }
            if self.homogeneous_skip_applies() {
                let budget = ((requested - elapsed) / unit - STEP_SLACK).ceil().max(1.0) as u64;
                let events = self.skip_homogeneous(budget)?;
                elapsed += events as f64 * unit;
                continue;
            }
            let s = self
                .coordinator
                .pick(&self.species, &mut self.rng)
                .ok_or(SamplingError::Empty)?;
            let event = self.species[s].event(&mut self.rng)?;
            self.advance(1, unit);
            elapsed += unit;
            if let Some(trace) = &mut self.trace {
                trace.push(EventRecord { species: s, event });
            }
            let changed = event.adopted.is_some()
                || matches!(event.kind, EventKind::Death | EventKind::Migration);
            if changed && self.check_converged() {
                self.mark_converged();
                return Ok(converged_increment(elapsed));
            }
        }
    }

    /// Step until `generations` have elapsed or the run converged. Returns
    /// the elapsed generations.
    pub fn run_for(&mut self, generations: f64) -> Result<f64, SimError> {
        let mut elapsed = 0.0;
        while elapsed < generations && !self.converged {
            let dt = self.step(generations - elapsed)?;
            elapsed += dt.abs();
            if dt <= 0.0 {
                break;
            }
        }
        Ok(elapsed)
    }

    /// Run for the configured number of generations.
    pub fn run(&mut self) -> Result<f64, SimError> {
        self.run_for(self.execution.generations)
    }

    fn mark_converged(&mut self) {
        if !self.converged {
            tracing::debug!(generation = self.generation, "population converged");
        }
        self.converged = true;
    }

    /// One synchronous sweep over every species.
    fn sweep(&mut self) -> Result<(), SimError> {
        for pop in &mut self.species {
            pop.prepare_sweep(&mut self.rng)?;
        }
        let mut changed = 0;
        for pop in &mut self.species {
            changed += pop.commit_sweep(&mut self.rng);
        }
        tracing::trace!(generation = self.generation, changed, "synchronous sweep");
        self.updates += 1;
        self.generation += 1.0;
        if self.real_time.is_finite() {
            let total: f64 = self.species.iter().map(|p| p.ledger().sum_fitness()).sum();
            self.real_time = if total > 0.0 {
                self.real_time + self.total_occupied() as f64 / total
            } else {
                f64::INFINITY
            };
        }
        Ok(())
    }

    /// Advance both clocks by `events` elementary events of `unit`
    /// generations each.
    fn advance(&mut self, events: u64, unit: f64) {
        self.updates += events;
        self.generation += events as f64 * unit;
        if events == 0 || !self.real_time.is_finite() {
            return;
        }
        let rate: f64 = self.species.iter().map(|p| p.ledger().sum_fitness()).sum();
        let dt = if rate <= 0.0 {
            None
        } else if events == 1 {
            Exp::new(rate).ok().map(|d| d.sample(&mut self.rng))
        } else {
            Gamma::new(events as f64, 1.0 / rate)
                .ok()
                .map(|d| d.sample(&mut self.rng))
        };
        self.real_time = match dt {
            Some(dt) => self.real_time + dt,
            None => f64::INFINITY,
        };
    }

    /// A single monomorphic species whose only possible change is a mutation.
    fn homogeneous_skip_applies(&self) -> bool {
        self.optimize_homo
            && self.species.len() == 1
            && self.species[0].update() != PopulationUpdate::Ecology
            && !self.species[0].migration().is_active()
            && self.species[0].mutation().is_active()
            && self.species[0].is_monomorphic()
    }

    /// Jump over the events preceding the next mutation, at most `budget`
    /// events. Returns the number of events accounted for.
    fn skip_homogeneous(&mut self, budget: u64) -> Result<u64, SimError> {
        let pop = &self.species[0];
        let p = pop.mutation().probability;
        let unit = 1.0 / pop.occupied() as f64;
        let waiting = Geometric::new(p)
            .map_err(|_| SimError::Unsupported("mutation probability outside (0, 1]"))?
            .sample(&mut self.rng);
        if waiting >= budget {
            self.advance(budget, unit);
            return Ok(budget);
        }
        self.advance(waiting + 1, unit);
        let event = self.species[0].mutate_random(&mut self.rng)?;
        if let Some(trace) = &mut self.trace {
            trace.push(EventRecord { species: 0, event });
        }
        Ok(waiting + 1)
    }
}

fn converged_increment(elapsed: f64) -> f64 {
    if elapsed > 0.0 {
        -elapsed
    } else {
        -f64::MIN_POSITIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::fitness::PayoffMap;
    use crate::model::{ConstantSelection, MatrixGame};
    use crate::network::GeometryConfig;
    use crate::simulation::parameters::{Initialization, MutationConfig, SpeciesConfig};
    use crate::simulation::SimulationBuilder;

    fn pd_species(size: usize) -> SpeciesConfig<MatrixGame> {
        SpeciesConfig::new("pd", size, MatrixGame::prisoners_dilemma(3.0, 1.0))
    }

    #[test]
    fn test_converged_population_reports_negative_step() {
        let mut cfg = pd_species(100);
        cfg.init = Initialization::Monomorphic { value: 0 };
        let mut sim = SimulationBuilder::new().species(cfg).seed(1).build().unwrap();
        let dt = sim.step(1.0).unwrap();
        assert!(dt < 0.0);
        assert!(sim.is_converged());
        assert_eq!(sim.generation(), 0.0);
    }

    #[test]
    fn test_step_advances_one_generation() {
        let mut cfg = pd_species(50);
        cfg.mutation = MutationConfig::temperature(0.01);
        let mut sim = SimulationBuilder::new().species(cfg).seed(2).build().unwrap();
        let dt = sim.step(1.0).unwrap();
        assert!((dt - 1.0).abs() < 1e-9, "dt {dt}");
        assert_eq!(sim.updates(), 50);
        assert!(sim.real_time() > 0.0);
    }

    #[test]
    fn test_step_slack_is_half_an_event() {
        let mut cfg = pd_species(10);
        cfg.mutation = MutationConfig::temperature(0.5);
        let mut sim = SimulationBuilder::new().species(cfg).seed(3).build().unwrap();
        // 0.26 generations is 2.6 events: the third event would overshoot by
        // less than half an event
        let dt = sim.step(0.26).unwrap();
        assert!((dt - 0.3).abs() < 1e-9, "dt {dt}");
        let dt = sim.step(0.24).unwrap();
        assert!((dt - 0.2).abs() < 1e-9, "dt {dt}");
    }

    #[test]
    fn test_synchronous_steps_whole_generations() {
        let mut cfg = pd_species(16);
        cfg.interaction = GeometryConfig::Ring;
        cfg.update = PopulationUpdate::Synchronous;
        cfg.mutation = MutationConfig::temperature(0.1);
        let mut sim = SimulationBuilder::new().species(cfg).seed(4).build().unwrap();
        assert!(sim.is_synchronous());
        assert_eq!(sim.step(3.0).unwrap(), 3.0);
        assert_eq!(sim.generation(), 3.0);
    }

    #[test]
    fn test_negative_payoffs_disable_real_time() {
        let mut cfg = pd_species(10);
        cfg.payoff_map = PayoffMap::Identity;
        cfg.mutation = MutationConfig::temperature(0.1);
        let mut sim = SimulationBuilder::new().species(cfg).seed(5).build().unwrap();
        sim.step(1.0).unwrap();
        assert!(sim.real_time().is_infinite());
    }

    #[test]
    fn test_fixation_of_advantageous_mutant() {
        let mut cfg = SpeciesConfig::new("moran", 20, ConstantSelection::mutant(10.0));
        cfg.update = PopulationUpdate::MoranBirthDeath;
        cfg.payoff_map = PayoffMap::Identity;
        cfg.init = Initialization::Frequencies {
            weights: vec![1.0, 1.0],
        };
        let mut sim = SimulationBuilder::new().species(cfg).seed(6).build().unwrap();
        let elapsed = sim.run_for(10_000.0).unwrap();
        assert!(sim.is_converged());
        assert!(elapsed < 10_000.0);
        let freq = &sim.mean_trait()[0];
        assert!(freq[0] == 1.0 || freq[1] == 1.0);
    }

    #[test]
    fn test_reset_replays_trajectory() {
        let mut cfg = pd_species(30);
        cfg.interaction = GeometryConfig::Ring;
        cfg.mutation = MutationConfig::temperature(0.05);
        let mut sim = SimulationBuilder::new().species(cfg).seed(7).build().unwrap();
        sim.record_events(true);
        sim.reset().unwrap();
        sim.step(5.0).unwrap();
        let first = sim.events().to_vec();
        sim.reset().unwrap();
        sim.step(5.0).unwrap();
        assert_eq!(sim.events(), &first[..]);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_homogeneous_skip_counts_events() {
        let mut cfg = pd_species(100);
        cfg.init = Initialization::Monomorphic { value: 0 };
        cfg.mutation = MutationConfig::temperature(1e-4);
        let mut sim = SimulationBuilder::new()
            .species(cfg)
            .seed(8)
            .optimize_homo(true)
            .build()
            .unwrap();
        let dt = sim.step(2.0).unwrap();
        assert!(dt > 0.0);
        assert!(dt <= 2.0 + 1e-9);
        assert!(sim.generation() > 0.0);
    }

    #[test]
    fn test_status_mentions_species() {
        let mut sim = SimulationBuilder::new()
            .species(pd_species(10))
            .seed(9)
            .build()
            .unwrap();
        sim.step(1.0).unwrap();
        let status = sim.status();
        assert!(status.starts_with("generation"));
        assert!(status.contains("pd: 10/10 occupied"));
    }
}

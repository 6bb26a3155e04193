//! Builder pattern for creating simulations.
//!
//! Provides a fluent API for configuring simulations and runs the check phase:
//! every species is validated, inconsistent combinations with a safe default
//! are corrected with a warning, and the remaining ones are rejected.

use crate::base::fitness::PayoffMap;
pub use crate::errors::BuilderError;
use crate::errors::ConfigError;
use crate::model::TraitModel;
use crate::network::GeometryConfig;
use crate::population::{Population, UpdateRule};
use crate::simulation::parameters::{
    Configuration, ExecutionConfig, Initialization, MigrationConfig, MutationConfig,
    PopulationUpdate, SpeciesConfig, SpeciesUpdate,
};
use crate::simulation::species::SpeciesCoordinator;
use crate::simulation::Simulation;

/// Builder for constructing [`Simulation`] instances with a fluent API.
///
/// A single species can be described directly on the builder; additional
/// species are added with [`SimulationBuilder::species`].
///
/// # Examples
///
/// ```
/// use evodyn_sim::model::MatrixGame;
/// use evodyn_sim::network::GeometryConfig;
/// use evodyn_sim::simulation::{MutationConfig, SimulationBuilder};
///
/// let mut sim = SimulationBuilder::new()
///     .model(MatrixGame::prisoners_dilemma(3.0, 1.0))
///     .population_size(100)
///     .geometry(GeometryConfig::Square { periodic: true })
///     .mutation(MutationConfig::temperature(0.01))
///     .seed(42)
///     .build()
///     .unwrap();
/// sim.step(10.0).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SimulationBuilder<M: TraitModel> {
    // Single-species shortcut
    model: Option<M>,
    population_size: Option<usize>,
    geometry: GeometryConfig,
    update: PopulationUpdate,
    rule: UpdateRule,
    mutation: MutationConfig,
    migration: MigrationConfig,
    payoff_map: PayoffMap,
    init: Option<Initialization<M::Trait>>,

    species: Vec<SpeciesConfig<M>>,
    execution: ExecutionConfig,
}

impl<M: TraitModel + Clone> Default for SimulationBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: TraitModel + Clone> SimulationBuilder<M> {
    /// Create a new simulation builder with default values.
    pub fn new() -> Self {
        Self {
            model: None,
            population_size: None,
            geometry: GeometryConfig::default(),
            update: PopulationUpdate::default(),
            rule: UpdateRule::default(),
            mutation: MutationConfig::default(),
            migration: MigrationConfig::default(),
            payoff_map: PayoffMap::default(),
            init: None,
            species: Vec::new(),
            execution: ExecutionConfig::default(),
        }
    }

    /// Start from a complete configuration.
    pub fn from_config(config: Configuration<M>) -> Self {
        Self {
            species: config.species,
            execution: config.execution,
            ..Self::new()
        }
    }

    /// Trait model of the single-species shortcut.
    pub fn model(mut self, model: M) -> Self {
        self.model = Some(model);
        self
    }

    /// Population size of the single-species shortcut.
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size);
        self
    }

    /// Interaction and competition network (default: well-mixed).
    pub fn geometry(mut self, geometry: GeometryConfig) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn update(mut self, update: PopulationUpdate) -> Self {
        self.update = update;
        self
    }

    pub fn rule(mut self, rule: UpdateRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn mutation(mut self, mutation: MutationConfig) -> Self {
        self.mutation = mutation;
        self
    }

    pub fn migration(mut self, migration: MigrationConfig) -> Self {
        self.migration = migration;
        self
    }

    pub fn payoff_map(mut self, map: PayoffMap) -> Self {
        self.payoff_map = map;
        self
    }

    /// Initial configuration (default: uniformly random traits).
    pub fn init(mut self, init: Initialization<M::Trait>) -> Self {
        self.init = Some(init);
        self
    }

    /// Add a fully configured species.
    pub fn species(mut self, species: SpeciesConfig<M>) -> Self {
        self.species.push(species);
        self
    }

    /// Set the random seed for reproducibility (default: drawn at random).
    pub fn seed(mut self, seed: u64) -> Self {
        self.execution.seed = Some(seed);
        self
    }

    /// Run length used by [`Simulation::run`].
    pub fn generations(mut self, generations: f64) -> Self {
        self.execution.generations = generations;
        self
    }

    pub fn species_update(mut self, scheme: SpeciesUpdate) -> Self {
        self.execution.species_update = scheme;
        self
    }

    /// Skip waiting times in homogeneous states.
    pub fn optimize_homo(mut self, on: bool) -> Self {
        self.execution.optimize_homo = on;
        self
    }

    /// Collect the species of this builder, the shortcut species first.
    fn configuration(self) -> Result<Configuration<M>, BuilderError> {
        let mut species = Vec::with_capacity(self.species.len() + 1);
        if self.model.is_some() || self.population_size.is_some() || self.species.is_empty() {
            let size = self
                .population_size
                .ok_or(BuilderError::MissingRequired("population_size"))?;
            let model = self.model.ok_or(BuilderError::MissingRequired("model"))?;
            let mut cfg = SpeciesConfig::new("species", size, model);
            cfg.interaction = self.geometry;
            cfg.update = self.update;
            cfg.rule = self.rule;
            cfg.mutation = self.mutation;
            cfg.migration = self.migration;
            cfg.payoff_map = self.payoff_map;
            if let Some(init) = self.init {
                cfg.init = init;
            }
            species.push(cfg);
        }
        species.extend(self.species);
        Ok(Configuration {
            execution: self.execution,
            species,
        })
    }

    /// Build, check and initialize the simulation.
    pub fn build(self) -> Result<Simulation<M>, BuilderError> {
        let Configuration {
            mut execution,
            species,
        } = self.configuration()?;
        execution.validate()?;

        let mut pops = species
            .iter()
            .map(Population::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        let synchronous = pops.iter().filter(|p| p.update().is_synchronous()).count();
        if synchronous > 0 && synchronous < pops.len() {
            if pops.iter().any(|p| p.update() == PopulationUpdate::Ecology) {
                return Err(ConfigError::Incompatible(
                    "ecological updates cannot be combined with synchronous species".into(),
                )
                .into());
            }
            tracing::warn!("mixing synchronous and asynchronous species: all species update synchronously");
            for pop in &mut pops {
                pop.force_update(PopulationUpdate::Synchronous);
            }
        }

        for pop in &pops {
            let update = pop.update();
            if update == PopulationUpdate::Ecology && pop.model().ecology().is_none() {
                return Err(ConfigError::Incompatible(format!(
                    "species '{}': trait model does not support ecological updates",
                    pop.name()
                ))
                .into());
            }
            if (update == PopulationUpdate::Ecology || update.is_moran())
                && pop.has_negative_fitness()
            {
                return Err(ConfigError::Incompatible(format!(
                    "species '{}': {update:?} updates require non-negative fitness",
                    pop.name()
                ))
                .into());
            }
        }

        if pops.len() > 1
            && execution.species_update == SpeciesUpdate::Fitness
            && pops.iter().any(|p| !(p.min_possible_fitness() > 0.0))
        {
            tracing::warn!("fitness-based species selection requires positive fitness: using rates");
            execution.species_update = SpeciesUpdate::Rate;
        }

        if execution.optimize_homo {
            let reason = if pops.len() > 1 {
                Some("multiple species")
            } else if pops[0].update() == PopulationUpdate::Ecology {
                Some("ecological updates")
            } else if pops[0].update().is_synchronous() {
                Some("synchronous updates")
            } else {
                None
            };
            if let Some(reason) = reason {
                tracing::warn!("skipping homogeneous states is incompatible with {reason}: disabled");
                execution.optimize_homo = false;
            }
        }

        if pops.iter().any(Population::has_negative_fitness) {
            tracing::warn!("fitness can become negative: real time is not tracked");
        }

        let seed = execution.seed.unwrap_or_else(rand::random);
        tracing::info!(seed, species = pops.len(), "building simulation");
        let coordinator = SpeciesCoordinator::new(execution.species_update);
        let mut sim = Simulation::new(pops, coordinator, execution, seed);
        sim.init()?;
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstantSelection, MatrixGame, PublicGoods};

    fn pd() -> MatrixGame {
        MatrixGame::prisoners_dilemma(3.0, 1.0)
    }

    #[test]
    fn test_builder_minimal() {
        let sim = SimulationBuilder::new()
            .model(pd())
            .population_size(10)
            .build();

        assert!(sim.is_ok());
        let sim = sim.unwrap();
        assert_eq!(sim.species().len(), 1);
        assert_eq!(sim.species()[0].size(), 10);
        assert_eq!(sim.generation(), 0.0);
    }

    #[test]
    fn test_builder_with_seed() {
        let a = SimulationBuilder::new()
            .model(pd())
            .population_size(20)
            .seed(42)
            .build()
            .unwrap();
        let b = SimulationBuilder::new()
            .model(pd())
            .population_size(20)
            .seed(42)
            .build()
            .unwrap();
        assert_eq!(a.seed(), 42);
        assert_eq!(a.species()[0].traits(), b.species()[0].traits());
    }

    #[test]
    fn test_builder_missing_population_size() {
        let sim = SimulationBuilder::new().model(pd()).build();

        match sim.unwrap_err() {
            BuilderError::MissingRequired(param) => {
                assert_eq!(param, "population_size");
            }
            _ => panic!("Expected MissingRequired error"),
        }
    }

    #[test]
    fn test_builder_missing_model() {
        let sim = SimulationBuilder::<MatrixGame>::new()
            .population_size(10)
            .build();

        match sim.unwrap_err() {
            BuilderError::MissingRequired(param) => {
                assert_eq!(param, "model");
            }
            _ => panic!("Expected MissingRequired error"),
        }
    }

    #[test]
    fn test_builder_invalid_mutation_probability() {
        let sim = SimulationBuilder::new()
            .model(pd())
            .population_size(10)
            .mutation(MutationConfig::temperature(1.5))
            .build();

        assert!(matches!(
            sim.unwrap_err(),
            BuilderError::Config(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_builder_mixed_updates_become_synchronous() {
        let mut sync = SpeciesConfig::new("sync", 10, pd());
        sync.update = PopulationUpdate::Synchronous;
        let sim = SimulationBuilder::new()
            .species(sync)
            .species(SpeciesConfig::new("async", 10, pd()))
            .seed(1)
            .build()
            .unwrap();
        assert!(sim.is_synchronous());
        assert!(sim
            .species()
            .iter()
            .all(|p| p.update() == PopulationUpdate::Synchronous));
    }

    #[test]
    fn test_builder_rejects_ecology_without_support() {
        let sim = SimulationBuilder::new()
            .model(PublicGoods::new(3.0, 1.0).unwrap())
            .population_size(16)
            .update(PopulationUpdate::Ecology)
            .build();
        assert!(matches!(
            sim.unwrap_err(),
            BuilderError::Config(ConfigError::Incompatible(_))
        ));
    }

    #[test]
    fn test_builder_rejects_moran_with_negative_fitness() {
        let sim = SimulationBuilder::new()
            .model(pd())
            .population_size(16)
            .update(PopulationUpdate::MoranBirthDeath)
            .payoff_map(PayoffMap::Identity)
            .build();
        assert!(matches!(
            sim.unwrap_err(),
            BuilderError::Config(ConfigError::Incompatible(_))
        ));
    }

    #[test]
    fn test_builder_fitness_selection_falls_back_to_rate() {
        let model = ConstantSelection::new(vec![0.0, 1.0]).unwrap();
        let mut a = SpeciesConfig::new("a", 10, model.clone());
        a.payoff_map = PayoffMap::Identity;
        let sim = SimulationBuilder::new()
            .species(a)
            .species(SpeciesConfig::new("b", 10, model))
            .species_update(SpeciesUpdate::Fitness)
            .build()
            .unwrap();
        assert_eq!(sim.execution().species_update, SpeciesUpdate::Rate);
    }

    #[test]
    fn test_builder_disables_homo_optimization_for_sync() {
        let sim = SimulationBuilder::new()
            .model(pd())
            .population_size(10)
            .update(PopulationUpdate::Synchronous)
            .optimize_homo(true)
            .build()
            .unwrap();
        assert!(!sim.execution().optimize_homo);
    }

    #[test]
    fn test_builder_from_config() {
        let mut cfg = Configuration::single(SpeciesConfig::new("pd", 25, pd()));
        cfg.execution.seed = Some(7);
        cfg.execution.generations = 12.0;
        let sim = SimulationBuilder::from_config(cfg).build().unwrap();
        assert_eq!(sim.seed(), 7);
        assert_eq!(sim.execution().generations, 12.0);
        assert_eq!(sim.species()[0].name(), "pd");
    }

    #[test]
    fn test_builder_empty_configuration() {
        let cfg: Configuration<MatrixGame> = Configuration {
            execution: ExecutionConfig::default(),
            species: Vec::new(),
        };
        let sim = SimulationBuilder::from_config(cfg).build();
        assert!(matches!(
            sim.unwrap_err(),
            BuilderError::MissingRequired("population_size")
        ));
    }
}

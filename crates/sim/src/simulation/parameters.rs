//! Simulation parameters and configuration.
//!
//! Every struct here is serde-serializable so that a [`Configuration`] read
//! from a file fully reproduces a simulation setup.

use crate::base::fitness::PayoffMap;
use crate::errors::ConfigError;
use crate::model::TraitModel;
use crate::network::GeometryConfig;
use crate::population::{RuleParams, SamplingType, ScoringMode, UpdateRule};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The master configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "M: Serialize", deserialize = "M: DeserializeOwned"))]
pub struct Configuration<M: TraitModel> {
    pub execution: ExecutionConfig,
    pub species: Vec<SpeciesConfig<M>>,
}

impl<M: TraitModel> Configuration<M> {
    /// Single-species configuration with default execution settings.
    pub fn single(species: SpeciesConfig<M>) -> Self {
        Self {
            execution: ExecutionConfig::default(),
            species: vec![species],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.species.is_empty() {
            return Err(ConfigError::NoSpecies);
        }
        self.execution.validate()?;
        self.species.iter().try_for_each(SpeciesConfig::validate)
    }
}

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Optional RNG seed for reproducibility
    pub seed: Option<u64>,
    /// Run length in generations
    pub generations: f64,
    /// Generations between progress reports
    pub report_interval: f64,
    /// How the next species to update is chosen
    pub species_update: SpeciesUpdate,
    /// Skip waiting times in homogeneous states
    pub optimize_homo: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            seed: None,
            generations: 100.0,
            report_interval: 1.0,
            species_update: SpeciesUpdate::default(),
            optimize_homo: false,
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.generations >= 0.0) {
            return Err(ConfigError::invalid(
                "generations",
                self.generations,
                "must be non-negative",
            ));
        }
        if !(self.report_interval > 0.0) {
            return Err(ConfigError::invalid(
                "report_interval",
                self.report_interval,
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Scheduling discipline of a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationUpdate {
    /// Decide against the current state, then commit all at once.
    Synchronous,
    /// Every individual once per generation, in random order.
    OnceEach,
    /// One uniformly chosen individual per event.
    #[default]
    Async,
    /// Fit parent replaces a random neighbor.
    MoranBirthDeath,
    /// Random individual dies and is replaced by a fit neighbor's offspring.
    MoranDeathBirth,
    /// Random individual imitates a fit neighbor, itself included.
    MoranImitate,
    /// Births and deaths with variable population size.
    Ecology,
}

impl PopulationUpdate {
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::Synchronous)
    }

    pub fn is_moran(&self) -> bool {
        matches!(
            self,
            Self::MoranBirthDeath | Self::MoranDeathBirth | Self::MoranImitate
        )
    }
}

/// Kind of migration event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    #[default]
    None,
    /// Two neighbors swap places.
    Diffusion,
    /// Fit migrant displaces a random individual anywhere.
    BirthDeath,
    /// Random individual is replaced by a fit neighbor.
    DeathBirth,
}

/// Migration settings; consulted once per event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub kind: MigrationType,
    pub probability: f64,
}

impl MigrationConfig {
    pub fn new(kind: MigrationType, probability: f64) -> Self {
        Self { kind, probability }
    }

    pub fn is_active(&self) -> bool {
        self.kind != MigrationType::None && self.probability > 0.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::invalid(
                "migration.probability",
                self.probability,
                "must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// When a mutation happens relative to the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Mutation replaces the update (or mutates the offspring).
    #[default]
    Temperature,
    /// Mutation happens independently after the update.
    Random,
}

/// Parameters for mutation processes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Probability per event
    pub probability: f64,
    pub kind: MutationKind,
}

impl MutationConfig {
    /// No mutations.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn temperature(probability: f64) -> Self {
        Self {
            probability,
            kind: MutationKind::Temperature,
        }
    }

    pub fn random(probability: f64) -> Self {
        Self {
            probability,
            kind: MutationKind::Random,
        }
    }

    pub fn is_active(&self) -> bool {
        self.probability > 0.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::invalid(
                "mutation.probability",
                self.probability,
                "must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// How the species to update next is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesUpdate {
    /// Proportional to the number of occupied slots.
    #[default]
    Size,
    /// Proportional to total fitness.
    Fitness,
    /// Proportional to size times the species' rate.
    Rate,
    /// Cycle through the species.
    Turns,
    /// Uniformly at random.
    Uniform,
}

/// Initial trait configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Initialization<T> {
    /// Independent random traits.
    Uniform,
    /// Everyone carries `value`.
    Monomorphic { value: T },
    /// A single `mutant` in a population of `resident`s.
    Mutant { resident: T, mutant: T },
    /// Discrete traits drawn with the given relative weights.
    Frequencies { weights: Vec<f64> },
    /// One trait per slot.
    Explicit { traits: Vec<T> },
}

impl<T> Default for Initialization<T> {
    fn default() -> Self {
        Self::Uniform
    }
}

/// Everything that defines one species.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "M: Serialize", deserialize = "M: DeserializeOwned"))]
pub struct SpeciesConfig<M: TraitModel> {
    pub name: String,
    /// Number of slots
    pub size: usize,
    pub model: M,
    /// Who plays whom
    #[serde(default)]
    pub interaction: GeometryConfig,
    /// Who replaces or imitates whom; defaults to the interaction network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competition: Option<GeometryConfig>,
    #[serde(default)]
    pub update: PopulationUpdate,
    #[serde(default)]
    pub rule: UpdateRule,
    #[serde(default)]
    pub rule_params: RuleParams,
    /// Sampling of the reference group
    #[serde(default)]
    pub reference: SamplingType,
    /// Sampling of interaction partners
    #[serde(default)]
    pub interactions: SamplingType,
    #[serde(default)]
    pub payoff_map: PayoffMap,
    #[serde(default)]
    pub scoring: ScoringMode,
    #[serde(default)]
    pub mutation: MutationConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    /// Relative update rate, used by [`SpeciesUpdate::Rate`]
    #[serde(default = "default_one")]
    pub rate: f64,
    /// Fraction of individuals updated per synchronous sweep
    #[serde(default = "default_one")]
    pub sync_fraction: f64,
    /// Fraction of slots initially vacant
    #[serde(default)]
    pub vacancy: f64,
    #[serde(default)]
    pub init: Initialization<M::Trait>,
}

fn default_one() -> f64 {
    1.0
}

impl<M: TraitModel> SpeciesConfig<M> {
    /// Species with default settings: well-mixed, asynchronous imitation,
    /// random initial traits and no mutation.
    pub fn new(name: impl Into<String>, size: usize, model: M) -> Self {
        Self {
            name: name.into(),
            size,
            model,
            interaction: GeometryConfig::default(),
            competition: None,
            update: PopulationUpdate::default(),
            rule: UpdateRule::default(),
            rule_params: RuleParams::default(),
            reference: SamplingType::default(),
            interactions: SamplingType::default(),
            payoff_map: PayoffMap::default(),
            scoring: ScoringMode::default(),
            mutation: MutationConfig::default(),
            migration: MigrationConfig::default(),
            rate: 1.0,
            sync_fraction: 1.0,
            vacancy: 0.0,
            init: Initialization::default(),
        }
    }

    /// Range checks that need no knowledge of other species.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::invalid("size", 0.0, "must be positive"));
        }
        if !(self.rate > 0.0 && self.rate.is_finite()) {
            return Err(ConfigError::invalid("rate", self.rate, "must be positive"));
        }
        if !(self.sync_fraction > 0.0 && self.sync_fraction <= 1.0) {
            return Err(ConfigError::invalid(
                "sync_fraction",
                self.sync_fraction,
                "must be in (0, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.vacancy) {
            return Err(ConfigError::invalid(
                "vacancy",
                self.vacancy,
                "must be in [0, 1)",
            ));
        }
        self.mutation.validate()?;
        self.migration.validate()?;

        let p = &self.rule_params;
        if !(p.noise >= 0.0) {
            return Err(ConfigError::invalid("noise", p.noise, "must be non-negative"));
        }
        if !(0.0..=0.5).contains(&p.error) {
            return Err(ConfigError::invalid("error", p.error, "must be in [0, 0.5]"));
        }
        if !(0.0..=1.0).contains(&p.tie_probability) {
            return Err(ConfigError::invalid(
                "tie_probability",
                p.tie_probability,
                "must be in [0, 1]",
            ));
        }
        if !(p.neutral_self_weight >= 0.0) {
            return Err(ConfigError::invalid(
                "neutral_self_weight",
                p.neutral_self_weight,
                "must be non-negative",
            ));
        }
        for sampling in [self.reference, self.interactions] {
            if sampling == SamplingType::Random(0) {
                return Err(ConfigError::Incompatible(
                    "random sampling needs a group size of at least one".into(),
                ));
            }
        }

        match &self.init {
            Initialization::Frequencies { weights } => {
                if weights.len() != self.model.number_of_traits() {
                    return Err(ConfigError::Incompatible(format!(
                        "{} initial frequencies for {} traits",
                        weights.len(),
                        self.model.number_of_traits()
                    )));
                }
                if weights.iter().any(|w| !(*w >= 0.0)) || weights.iter().sum::<f64>() <= 0.0 {
                    return Err(ConfigError::Incompatible(
                        "initial frequencies must be non-negative with a positive sum".into(),
                    ));
                }
            }
            Initialization::Explicit { traits } if traits.len() != self.size => {
                return Err(ConfigError::SizeMismatch {
                    network: traits.len(),
                    population: self.size,
                });
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatrixGame;

    #[test]
    fn test_species_defaults_validate() {
        let cfg = SpeciesConfig::new("pd", 10, MatrixGame::prisoners_dilemma(3.0, 1.0));
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.update, PopulationUpdate::Async);
        assert_eq!(cfg.init, Initialization::Uniform);
    }

    #[test]
    fn test_invalid_probabilities_rejected() {
        let mut cfg = SpeciesConfig::new("pd", 10, MatrixGame::prisoners_dilemma(3.0, 1.0));
        cfg.mutation = MutationConfig::temperature(1.5);
        assert!(cfg.validate().is_err());
        cfg.mutation = MutationConfig::none();
        cfg.migration = MigrationConfig::new(MigrationType::Diffusion, -0.1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_frequencies_must_match_traits() {
        let mut cfg = SpeciesConfig::new("pd", 10, MatrixGame::prisoners_dilemma(3.0, 1.0));
        cfg.init = Initialization::Frequencies {
            weights: vec![1.0, 1.0, 1.0],
        };
        assert!(cfg.validate().is_err());
        cfg.init = Initialization::Frequencies {
            weights: vec![0.0, 0.0],
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_configuration_requires_species() {
        let cfg: Configuration<MatrixGame> = Configuration {
            execution: ExecutionConfig::default(),
            species: Vec::new(),
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NoSpecies));
    }

    #[test]
    fn test_configuration_json_roundtrip() {
        let mut species = SpeciesConfig::new("pd", 16, MatrixGame::prisoners_dilemma(3.0, 1.0));
        species.interaction = GeometryConfig::Square { periodic: true };
        species.init = Initialization::Mutant {
            resident: 0,
            mutant: 1,
        };
        let cfg = Configuration::single(species);
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let back: Configuration<MatrixGame> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.species[0].init, cfg.species[0].init);
        assert_eq!(back.species[0].interaction, cfg.species[0].interaction);
        assert_eq!(back.execution, cfg.execution);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "execution": { "seed": 7 },
            "species": [{ "name": "a", "size": 5, "model": { "payoffs": [[1.0, 0.0], [0.0, 1.0]] } }]
        }"#;
        let cfg: Configuration<MatrixGame> = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.execution.seed, Some(7));
        assert_eq!(cfg.species[0].rate, 1.0);
        assert_eq!(cfg.species[0].reference, SamplingType::All);
        assert!(cfg.validate().is_ok());
    }
}

use crate::defaults;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Trait models available from the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    /// Donation game with cooperators and defectors
    PrisonersDilemma,
    /// Snowdrift game with shared costs
    Snowdrift,
    /// Linear public goods game in groups
    PublicGoods,
    /// Resident and mutant with constant fitness
    Constant,
    /// Continuous investment game
    ContinuousSnowdrift,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryKind {
    WellMixed,
    Ring,
    /// Periodic square lattice
    Square,
    /// Square lattice with fixed boundaries
    SquareBounded,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    Synchronous,
    OnceEach,
    Async,
    MoranBirthDeath,
    MoranDeathBirth,
    MoranImitate,
    Ecology,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    BestResponse,
    Best,
    BestRandom,
    Proportional,
    ImitateBetter,
    Imitate,
    Thermal,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationKind {
    None,
    Diffusion,
    BirthDeath,
    DeathBirth,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Output configuration file
    #[arg(short, long, default_value = defaults::CONFIG_FILE)]
    pub output: PathBuf,

    /// Trait model
    #[arg(short, long, value_enum, default_value_t = ModelKind::PrisonersDilemma)]
    pub model: ModelKind,

    /// Population size
    #[arg(short = 'n', long, default_value_t = defaults::POPULATION_SIZE)]
    pub population_size: usize,

    /// Number of generations
    #[arg(short = 'g', long, default_value_t = defaults::GENERATIONS)]
    pub generations: f64,

    /// Generations between reports
    #[arg(long, default_value_t = defaults::REPORT_INTERVAL)]
    pub report_every: f64,

    /// Interaction and competition network
    #[arg(long, value_enum, default_value_t = GeometryKind::WellMixed)]
    pub geometry: GeometryKind,

    /// Population update
    #[arg(long, value_enum, default_value_t = UpdateKind::Async)]
    pub update: UpdateKind,

    /// Update rule
    #[arg(long, value_enum, default_value_t = RuleKind::Imitate)]
    pub rule: RuleKind,

    /// Benefit of cooperation (prisoner's dilemma, snowdrift)
    #[arg(long, default_value_t = defaults::BENEFIT)]
    pub benefit: f64,

    /// Cost of cooperation
    #[arg(long, default_value_t = defaults::COST)]
    pub cost: f64,

    /// Multiplication factor of the public goods game
    #[arg(long, default_value_t = defaults::MULTIPLICATION_FACTOR)]
    pub factor: f64,

    /// Fitness of the mutant under constant selection
    #[arg(long, default_value_t = defaults::MUTANT_FITNESS)]
    pub mutant_fitness: f64,

    /// Mutation probability per update
    #[arg(long, default_value_t = defaults::MUTATION_PROBABILITY)]
    pub mutation: f64,

    /// Migration type
    #[arg(long, value_enum, default_value_t = MigrationKind::None)]
    pub migration: MigrationKind,

    /// Migration probability per event
    #[arg(long, default_value_t = defaults::MIGRATION_PROBABILITY)]
    pub migration_probability: f64,

    /// Death rate for ecological updates
    #[arg(long)]
    pub death_rate: Option<f64>,

    /// Initial fraction of vacant slots
    #[arg(long, default_value_t = 0.0)]
    pub vacancy: f64,

    /// Skip waiting times in homogeneous states
    #[arg(long)]
    pub optimize_homo: bool,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file written by `evodyn init`
    #[arg(short, long, default_value = defaults::CONFIG_FILE)]
    pub config: PathBuf,

    /// Override number of generations
    #[arg(short = 'g', long)]
    pub generations: Option<f64>,

    /// Override random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Independent replicates, run in parallel; only final states are reported
    #[arg(short, long, default_value_t = defaults::REPLICATES)]
    pub replicates: usize,

    /// Write reports to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save a checkpoint here when the run ends
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Continue from a checkpoint taken with the same configuration
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,
}

//! Shared default values for simulation configuration.
//! These values are used by the `init` command (via clap) and the run options.

pub const CONFIG_FILE: &str = "evodyn.json";

pub const POPULATION_SIZE: usize = 100;
pub const GENERATIONS: f64 = 1000.0;
pub const REPORT_INTERVAL: f64 = 10.0;

// Games
pub const BENEFIT: f64 = 3.0;
pub const COST: f64 = 1.0;
pub const MULTIPLICATION_FACTOR: f64 = 3.0;
pub const MUTANT_FITNESS: f64 = 1.1;

pub const MUTATION_PROBABILITY: f64 = 0.0;
pub const MIGRATION_PROBABILITY: f64 = 0.0;
pub const REPLICATES: usize = 1;

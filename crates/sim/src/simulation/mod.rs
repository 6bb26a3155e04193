//! Simulation engine and configuration.
//!
//! - [`Simulation`]: advances every species by elementary events or
//!   synchronous sweeps and keeps the generation and real-time clocks.
//! - [`SimulationBuilder`]: fluent builder that runs the configuration check
//!   phase before handing out a ready-to-run [`Simulation`].
//! - [`SpeciesCoordinator`]: picks the species performing the next event.
//! - [`Snapshot`]: resumable checkpoint of a running simulation.

pub mod builder;
pub mod engine;
pub mod parameters;
pub mod snapshot;
pub mod species;

pub use builder::SimulationBuilder;
pub use engine::{EventRecord, Simulation};
pub use parameters::{
    Configuration, ExecutionConfig, Initialization, MigrationConfig, MigrationType,
    MutationConfig, MutationKind, PopulationUpdate, SpeciesConfig, SpeciesUpdate,
};
pub use snapshot::Snapshot;
pub use species::SpeciesCoordinator;

//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use evodyn_sim::prelude::*;
//!
//! let mut sim = SimulationBuilder::new()
//!     .model(MatrixGame::prisoners_dilemma(3.0, 1.0))
//!     .population_size(50)
//!     .seed(1)
//!     .build()
//!     .unwrap();
//! sim.step(1.0).unwrap();
//! ```

pub use crate::base::fitness::PayoffMap;
pub use crate::errors::{BuilderError, ConfigError, SimError};
pub use crate::model::{ConstantSelection, ContinuousSnowdrift, MatrixGame, PublicGoods, TraitModel};
pub use crate::network::{Geometry, GeometryConfig, Network};
pub use crate::population::{Population, SamplingType, ScoringMode, UpdateRule};
pub use crate::simulation::{
    Configuration, Initialization, MigrationConfig, MigrationType, MutationConfig,
    PopulationUpdate, Simulation, SimulationBuilder, SpeciesConfig, SpeciesUpdate,
};

use thiserror::Error;

/// Inconsistent or invalid configuration detected during the check phase.
///
/// Inconsistencies with a safe default are corrected in place and logged;
/// the variants here are the ones without such a default.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A parameter value is outside its valid range
    #[error("Invalid parameter {name}: {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// Two settings cannot be combined
    #[error("Incompatible configuration: {0}")]
    Incompatible(String),
    /// Network and population disagree on size
    #[error("Network size {network} does not match population size {population}")]
    SizeMismatch { network: usize, population: usize },
    /// A configuration without any species
    #[error("At least one species is required")]
    NoSpecies,
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

/// A sampling loop failed to resolve.
///
/// This only happens when the fitness bookkeeping is inconsistent, so it is
/// never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    /// Cumulative or rejection sampling ran past the last candidate
    #[error("Fitness-proportional sampling exhausted (hit {hit}, total {total})")]
    Exhausted { hit: f64, total: f64 },
    /// No occupied slot is available to pick from
    #[error("No occupied slot available for sampling")]
    Empty,
}

/// Errors raised while running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sampling(#[from] SamplingError),
    /// The trait representation does not define the requested operation
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
    /// A snapshot could not be encoded, decoded or applied
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl From<bincode::Error> for SimError {
    fn from(e: bincode::Error) -> Self {
        Self::Snapshot(e.to_string())
    }
}

/// Errors that can occur during simulation building.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// A required parameter is missing
    #[error("Missing required parameter: {0}")]
    MissingRequired(&'static str),
    /// The assembled configuration failed the check phase
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Initial scoring of the population failed
    #[error("Initialization failed: {0}")]
    Init(#[from] SimError),
}

//! # Simulation Crate
//!
//! The `sim` crate provides the core of an individual-based simulator for
//! evolutionary dynamics. It includes trait models and their payoffs, the
//! interaction and competition networks, populations with their fitness
//! bookkeeping and update rules, and the event scheduler that advances one or
//! more interacting species through time.

pub mod base;
pub mod errors;
pub mod model;
pub mod network;
pub mod population;
pub mod prelude;
pub mod simulation;

pub use base::PayoffMap;
pub use simulation::{Simulation, SimulationBuilder};

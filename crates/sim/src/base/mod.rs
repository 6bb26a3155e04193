//! Base numerical types shared by the engine.

pub mod fitness;

pub use fitness::{PayoffMap, ACCOUNTING_TOLERANCE, NEUTRAL_TOLERANCE};

//! Checkpoints of a running simulation.
//!
//! A [`Snapshot`] captures everything that changes while a simulation runs:
//! clocks, RNG state, the species cursor and every population. Restoring it
//! into a simulation built from the same configuration continues the run
//! bit for bit.

use crate::errors::SimError;
use crate::model::TraitModel;
use crate::population::PopulationState;
use crate::simulation::Simulation;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub seed: u64,
    pub generation: f64,
    pub real_time: f64,
    pub updates: u64,
    pub converged: bool,
    pub rng: Xoshiro256PlusPlus,
    pub cursor: usize,
    pub species: Vec<PopulationState<T>>,
}

impl<T: Serialize + DeserializeOwned> Snapshot<T> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SimError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SimError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| SimError::Snapshot(format!("{}: {e}", path.as_ref().display())))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| SimError::Snapshot(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_bytes(&bytes)
    }
}

impl<M: TraitModel> Simulation<M> {
    /// Capture the current state.
    pub fn snapshot(&self) -> Snapshot<M::Trait> {
        Snapshot {
            seed: self.seed(),
            generation: self.generation,
            real_time: self.real_time,
            updates: self.updates,
            converged: self.converged,
            rng: self.rng.clone(),
            cursor: self.coordinator.cursor(),
            species: self.species.iter().map(|p| p.state()).collect(),
        }
    }

    /// Continue from `snapshot`. The simulation must have been built from
    /// the configuration the snapshot was taken with.
    pub fn restore(&mut self, snapshot: Snapshot<M::Trait>) -> Result<(), SimError> {
        if snapshot.species.len() != self.species.len() {
            return Err(SimError::Snapshot(format!(
                "snapshot holds {} species, simulation has {}",
                snapshot.species.len(),
                self.species.len()
            )));
        }
        for (pop, state) in self.species.iter_mut().zip(snapshot.species) {
            pop.restore(state)?;
        }
        self.generation = snapshot.generation;
        self.real_time = snapshot.real_time;
        self.updates = snapshot.updates;
        self.converged = snapshot.converged;
        self.rng = snapshot.rng;
        self.coordinator.set_cursor(snapshot.cursor);
        tracing::debug!(generation = self.generation, "restored snapshot");
        Ok(())
    }
}

//! Choosing the species that performs the next event.

use crate::model::TraitModel;
use crate::population::Population;
use crate::simulation::parameters::SpeciesUpdate;
use rand::Rng;

/// Species selection scheme plus the cursor used for [`SpeciesUpdate::Turns`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesCoordinator {
    scheme: SpeciesUpdate,
    cursor: usize,
}

impl SpeciesCoordinator {
    pub fn new(scheme: SpeciesUpdate) -> Self {
        Self { scheme, cursor: 0 }
    }

    pub fn scheme(&self) -> SpeciesUpdate {
        self.scheme
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    /// Index of the species to update next, or `None` if every species is
    /// extinct. A single species never consumes random numbers.
    pub fn pick<M: TraitModel, R: Rng + ?Sized>(
        &mut self,
        species: &[Population<M>],
        rng: &mut R,
    ) -> Option<usize> {
        if species.len() == 1 {
            return (!species[0].is_extinct()).then_some(0);
        }
        match self.scheme {
            SpeciesUpdate::Size => pick_weighted(species, rng, |p| p.occupied() as f64),
            SpeciesUpdate::Rate => pick_weighted(species, rng, |p| p.rate() * p.occupied() as f64),
            SpeciesUpdate::Fitness => {
                let total: f64 = species.iter().map(|p| p.ledger().sum_fitness()).sum();
                if total > 0.0 {
                    pick_weighted(species, rng, |p| p.ledger().sum_fitness().max(0.0))
                } else {
                    pick_weighted(species, rng, |p| p.rate() * p.occupied() as f64)
                }
            }
            SpeciesUpdate::Turns => {
                let n = species.len();
                let picked = (0..n)
                    .map(|k| (self.cursor + k) % n)
                    .find(|&s| !species[s].is_extinct())?;
                self.cursor = (picked + 1) % n;
                Some(picked)
            }
            SpeciesUpdate::Uniform => {
                let alive = species.iter().filter(|p| !p.is_extinct()).count();
                if alive == 0 {
                    return None;
                }
                let k = rng.random_range(0..alive);
                species
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| !p.is_extinct())
                    .nth(k)
                    .map(|(s, _)| s)
            }
        }
    }
}

fn pick_weighted<M, R, F>(species: &[Population<M>], rng: &mut R, weight: F) -> Option<usize>
where
    M: TraitModel,
    R: Rng + ?Sized,
    F: Fn(&Population<M>) -> f64,
{
    let total: f64 = species.iter().map(&weight).sum();
    if !(total > 0.0) {
        return None;
    }
    let hit = rng.random::<f64>() * total;
    let mut acc = 0.0;
    let mut last = None;
    for (s, p) in species.iter().enumerate() {
        let w = weight(p);
        acc += w;
        if hit < acc {
            return Some(s);
        }
        if w > 0.0 {
            last = Some(s);
        }
    }
    last
}

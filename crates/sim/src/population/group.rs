//! Reference and interaction groups.

use crate::network::Network;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a group is drawn from the neighborhood of the focal individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingType {
    /// Every neighbor.
    #[default]
    All,
    /// A random subsample of the given size, drawn without replacement.
    Random(usize),
}

/// Reusable group buffer, re-populated for every event.
#[derive(Debug, Clone)]
pub struct Group {
    focal: usize,
    sampling: SamplingType,
    members: Vec<usize>,
}

impl Group {
    pub fn new(sampling: SamplingType) -> Self {
        Self {
            focal: 0,
            sampling,
            members: Vec::new(),
        }
    }

    pub fn focal(&self) -> usize {
        self.focal
    }

    pub fn sampling(&self) -> SamplingType {
        self.sampling
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Sample among the out-neighbors of `focal`. An empty group means no
    /// event occurs.
    pub fn sample_at<R: Rng + ?Sized>(
        &mut self,
        focal: usize,
        net: &dyn Network,
        include_self: bool,
        rng: &mut R,
    ) {
        let neighbors = (!net.is_well_mixed()).then(|| net.neighbors_out(focal));
        self.fill(focal, neighbors, net.size(), include_self, rng);
    }

    /// Sample among the in-neighbors of `focal`; on undirected networks this
    /// is the same as [`Group::sample_at`].
    pub fn sample_in_at<R: Rng + ?Sized>(
        &mut self,
        focal: usize,
        net: &dyn Network,
        include_self: bool,
        rng: &mut R,
    ) {
        let neighbors = (!net.is_well_mixed()).then(|| net.neighbors_in(focal));
        self.fill(focal, neighbors, net.size(), include_self, rng);
    }

    /// Drop members for which `keep` returns false (e.g. vacant slots).
    pub fn retain(&mut self, keep: impl FnMut(&usize) -> bool) {
        self.members.retain(keep);
    }

    /// `neighbors == None` stands for the well-mixed case where every other
    /// slot in `0..size` is a neighbor.
    fn fill<R: Rng + ?Sized>(
        &mut self,
        focal: usize,
        neighbors: Option<&[usize]>,
        size: usize,
        include_self: bool,
        rng: &mut R,
    ) {
        self.focal = focal;
        self.members.clear();
        match (neighbors, self.sampling) {
            (Some(links), SamplingType::All) => self.members.extend_from_slice(links),
            (Some(links), SamplingType::Random(s)) => {
                if s >= links.len() {
                    self.members.extend_from_slice(links);
                } else {
                    self.members
                        .extend(index::sample(rng, links.len(), s).iter().map(|k| links[k]));
                }
            }
            (None, SamplingType::All) => {
                self.members.extend((0..size).filter(|&j| j != focal));
            }
            (None, SamplingType::Random(s)) => {
                let others = size.saturating_sub(1);
                let s = s.min(others);
                self.members.extend(
                    index::sample(rng, others, s)
                        .iter()
                        .map(|k| if k >= focal { k + 1 } else { k }),
                );
            }
        }
        if include_self {
            self.members.push(focal);
        }
    }
}

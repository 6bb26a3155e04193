//! Interaction and competition networks.
//!
//! The engine consumes networks read-only through the [`Network`] trait.
//! Individuals are plain indices into the population arrays, so a network is
//! nothing more than adjacency lists over `0..size`.
//!
//! Well-mixed networks store no adjacency at all: every slot neighbors every
//! other slot, the neighbor slices are empty and consumers are expected to
//! check [`Network::is_well_mixed`] and sample from `0..size` instead.

mod geometry;

pub use geometry::{Geometry, GeometryConfig, GeometryKind};

/// Read-only view of a network over `0..size()`.
pub trait Network: std::fmt::Debug + Send + Sync {
    /// Number of nodes.
    fn size(&self) -> usize;

    /// Nodes that `i` links to. Empty for well-mixed networks.
    fn neighbors_out(&self, i: usize) -> &[usize];

    /// Nodes linking to `i`. Identical to [`Network::neighbors_out`] on
    /// undirected networks.
    fn neighbors_in(&self, i: usize) -> &[usize];

    /// Out-degree of `i`.
    fn degree(&self, i: usize) -> usize {
        if self.is_well_mixed() {
            self.size().saturating_sub(1)
        } else {
            self.neighbors_out(i).len()
        }
    }

    /// Every node is connected to every other node.
    fn is_well_mixed(&self) -> bool;

    /// Links are symmetric.
    fn is_undirected(&self) -> bool;

    fn min_degree(&self) -> usize {
        (0..self.size()).map(|i| self.degree(i)).min().unwrap_or(0)
    }

    fn max_degree(&self) -> usize {
        (0..self.size()).map(|i| self.degree(i)).max().unwrap_or(0)
    }

    fn avg_degree(&self) -> f64 {
        let n = self.size();
        if n == 0 {
            return 0.0;
        }
        (0..n).map(|i| self.degree(i)).sum::<usize>() as f64 / n as f64
    }
}

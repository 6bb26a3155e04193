use super::Network;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// Structure of a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    WellMixed,
    Ring,
    Square { side: usize, periodic: bool },
    Graph,
}

/// Adjacency-list network.
///
/// Only undirected graphs share their in- and out-lists; directed graphs keep
/// both so that scoring can walk incoming links without a reverse search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    kind: GeometryKind,
    size: usize,
    out: Vec<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    inn: Vec<Vec<usize>>,
    undirected: bool,
}

impl Geometry {
    /// Well-mixed population of `size` slots.
    pub fn well_mixed(size: usize) -> Self {
        Self {
            kind: GeometryKind::WellMixed,
            size,
            out: Vec::new(),
            inn: Vec::new(),
            undirected: true,
        }
    }

    /// Undirected cycle; each node links to its two nearest neighbors.
    pub fn ring(size: usize) -> Self {
        let out = (0..size)
            .map(|i| {
                let mut links = Vec::with_capacity(2);
                if size > 1 {
                    links.push((i + size - 1) % size);
                    let right = (i + 1) % size;
                    if !links.contains(&right) {
                        links.push(right);
                    }
                }
                links
            })
            .collect();
        Self {
            kind: GeometryKind::Ring,
            size,
            out,
            inn: Vec::new(),
            undirected: true,
        }
    }

    /// Square lattice with von Neumann neighborhood (up to four neighbors).
    pub fn square(side: usize, periodic: bool) -> Self {
        let size = side * side;
        let mut out = vec![Vec::with_capacity(4); size];
        for row in 0..side {
            for col in 0..side {
                let links = &mut out[row * side + col];
                let mut link = |r: usize, c: usize| {
                    let j = r * side + c;
                    if j != row * side + col && !links.contains(&j) {
                        links.push(j);
                    }
                };
                if periodic {
                    link((row + side - 1) % side, col);
                    link(row, (col + 1) % side);
                    link((row + 1) % side, col);
                    link(row, (col + side - 1) % side);
                } else {
                    if row > 0 {
                        link(row - 1, col);
                    }
                    if col + 1 < side {
                        link(row, col + 1);
                    }
                    if row + 1 < side {
                        link(row + 1, col);
                    }
                    if col > 0 {
                        link(row, col - 1);
                    }
                }
            }
        }
        Self {
            kind: GeometryKind::Square { side, periodic },
            size,
            out,
            inn: Vec::new(),
            undirected: true,
        }
    }

    /// Arbitrary graph from an edge list.
    ///
    /// Self-loops and duplicate edges are dropped. For undirected graphs each
    /// edge is inserted in both directions.
    pub fn from_edges(
        size: usize,
        edges: &[(usize, usize)],
        directed: bool,
    ) -> Result<Self, ConfigError> {
        let mut out = vec![Vec::new(); size];
        let mut inn = if directed {
            vec![Vec::new(); size]
        } else {
            Vec::new()
        };
        for &(a, b) in edges {
            if a >= size || b >= size {
                return Err(ConfigError::Incompatible(format!(
                    "edge ({a}, {b}) outside network of size {size}"
                )));
            }
            if a == b || out[a].contains(&b) {
                continue;
            }
            out[a].push(b);
            if directed {
                inn[b].push(a);
            } else if !out[b].contains(&a) {
                out[b].push(a);
            }
        }
        Ok(Self {
            kind: GeometryKind::Graph,
            size,
            out,
            inn,
            undirected: !directed,
        })
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }
}

impl Network for Geometry {
    fn size(&self) -> usize {
        self.size
    }

    fn neighbors_out(&self, i: usize) -> &[usize] {
        self.out.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    fn neighbors_in(&self, i: usize) -> &[usize] {
        if self.undirected {
            self.neighbors_out(i)
        } else {
            self.inn.get(i).map(Vec::as_slice).unwrap_or(&[])
        }
    }

    fn is_well_mixed(&self) -> bool {
        self.kind == GeometryKind::WellMixed
    }

    fn is_undirected(&self) -> bool {
        self.undirected
    }
}

/// Serializable description of a network, resolved against a population size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometryConfig {
    #[default]
    WellMixed,
    Ring,
    /// Requires a population size that is a perfect square.
    Square { periodic: bool },
    Edges {
        edges: Vec<(usize, usize)>,
        directed: bool,
    },
}

impl GeometryConfig {
    /// Build the network for a population of `size` slots.
    pub fn build(&self, size: usize) -> Result<Geometry, ConfigError> {
        match self {
            Self::WellMixed => Ok(Geometry::well_mixed(size)),
            Self::Ring => Ok(Geometry::ring(size)),
            Self::Square { periodic } => {
                let side = (size as f64).sqrt().round() as usize;
                if side * side != size {
                    return Err(ConfigError::Incompatible(format!(
                        "square lattice requires a square population size, got {size}"
                    )));
                }
                Ok(Geometry::square(side, *periodic))
            }
            Self::Edges { edges, directed } => Geometry::from_edges(size, edges, *directed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_mixed_degree() {
        let g = Geometry::well_mixed(10);
        assert!(g.is_well_mixed());
        assert_eq!(g.degree(3), 9);
        assert!(g.neighbors_out(3).is_empty());
    }

    #[test]
    fn test_ring_neighbors() {
        let g = Geometry::ring(10);
        assert_eq!(g.neighbors_out(0), &[9, 1]);
        assert_eq!(g.neighbors_in(5), &[4, 6]);
        assert_eq!(g.min_degree(), 2);
        assert_eq!(g.max_degree(), 2);
    }

    #[test]
    fn test_ring_of_two_has_single_link() {
        let g = Geometry::ring(2);
        assert_eq!(g.neighbors_out(0), &[1]);
    }

    #[test]
    fn test_square_lattice_degrees() {
        let periodic = Geometry::square(4, true);
        assert_eq!(periodic.size(), 16);
        assert_eq!(periodic.min_degree(), 4);

        let bounded = Geometry::square(4, false);
        assert_eq!(bounded.degree(0), 2);
        assert_eq!(bounded.degree(5), 4);
        assert!((bounded.avg_degree() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_directed_graph_keeps_incoming_links() {
        let g = Geometry::from_edges(3, &[(0, 1), (0, 2), (2, 1)], true).unwrap();
        assert!(!g.is_undirected());
        assert_eq!(g.neighbors_out(0), &[1, 2]);
        assert_eq!(g.neighbors_in(1), &[0, 2]);
        assert!(g.neighbors_out(1).is_empty());
    }

    #[test]
    fn test_undirected_edges_are_symmetric() {
        let g = Geometry::from_edges(3, &[(0, 1), (1, 0), (1, 1)], false).unwrap();
        assert_eq!(g.neighbors_out(0), &[1]);
        assert_eq!(g.neighbors_out(1), &[0]);
    }

    #[test]
    fn test_edge_out_of_range_is_rejected() {
        assert!(Geometry::from_edges(2, &[(0, 5)], false).is_err());
    }

    #[test]
    fn test_square_config_requires_square_size() {
        assert!(GeometryConfig::Square { periodic: true }.build(10).is_err());
        assert_eq!(
            GeometryConfig::Square { periodic: true }.build(9).unwrap().size(),
            9
        );
    }
}

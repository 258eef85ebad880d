//! Graph collaborator consumed by the search: a fixed vertex order, an edge
//! list over vertex positions, and tree detection.
//!
//! [`SimpleGraph`] is the bundled implementation. It keeps a `u64` neighbor
//! bitset per vertex, which limits graphs to 64 vertices; the search is
//! exponential in the vertex count, so that bound is never the binding one.

use rand::Rng;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Largest supported vertex count for [`SimpleGraph`].
pub const MAX_VERTICES: usize = 64;

#[inline(always)]
const fn bit(v: usize) -> u64 {
    1u64 << v
}

// ============================================================================
// Collaborator trait
// ============================================================================

/// What the search needs from a graph.
///
/// Vertices are identified by their position `0..vertex_count()` in a fixed,
/// stable order. Candidate assignments list one label per position in that
/// order. The graph is assumed connected and simple; the search does not
/// check it.
pub trait LabelGraph: Sync {
    /// Number of vertices.
    fn vertex_count(&self) -> usize;

    /// Edges as unordered pairs of vertex positions, in a stable order.
    fn edges(&self) -> &[(usize, usize)];

    /// Number of edges.
    fn edge_count(&self) -> usize {
        self.edges().len()
    }

    /// Whether the graph is a tree (connected with `n - 1` edges).
    fn is_tree(&self) -> bool;

    /// Human-readable graph name used by exporters.
    fn name(&self) -> String {
        format!("G(n={}, e={})", self.vertex_count(), self.edge_count())
    }

    /// Name of the vertex at position `v`, used by exporters.
    fn vertex_name(&self, v: usize) -> String {
        v.to_string()
    }
}

// ============================================================================
// SimpleGraph
// ============================================================================

/// A small simple undirected graph.
///
/// Representation:
/// - `adj[v]` is the neighbor bitset of vertex `v`.
/// - `edges` lists each edge once as `(min, max)`, in insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleGraph {
    name: String,
    adj: Vec<u64>,
    edges: Vec<(usize, usize)>,
}

impl SimpleGraph {
    /// Builds a graph on `n` vertices from an edge list.
    ///
    /// # Errors
    /// Returns an error if `n` exceeds [`MAX_VERTICES`], an endpoint is out of
    /// range, an edge is a self-loop, or an edge is listed twice.
    pub fn from_edges(
        n: usize,
        edges: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self, GraphParseError> {
        if n > MAX_VERTICES {
            return Err(GraphParseError::TooManyVertices { n });
        }
        let mut graph = Self {
            name: String::new(),
            adj: vec![0u64; n],
            edges: Vec::new(),
        };
        for (u, v) in edges {
            for endpoint in [u, v] {
                if endpoint >= n {
                    return Err(GraphParseError::EndpointOutOfRange { vertex: endpoint, n });
                }
            }
            if u == v {
                return Err(GraphParseError::SelfLoop { vertex: u });
            }
            if graph.has_edge(u, v) {
                return Err(GraphParseError::DuplicateEdge { u, v });
            }
            graph.insert_edge(u, v);
        }
        graph.name = format!("G(n={n}, e={})", graph.edges.len());
        Ok(graph)
    }

    /// Cycle \(C_n\): `0 - 1 - ... - (n-1) - 0`.
    ///
    /// # Panics
    /// Panics if `n < 3` or `n > MAX_VERTICES`.
    pub fn cycle(n: usize) -> Self {
        assert!((3..=MAX_VERTICES).contains(&n), "cycle needs 3..=64 vertices, got {n}");
        let mut graph = Self::empty(n, format!("C{n}"));
        for v in 0..n {
            graph.insert_edge(v, (v + 1) % n);
        }
        graph
    }

    /// Path \(P_n\): `0 - 1 - ... - (n-1)`.
    ///
    /// # Panics
    /// Panics if `n == 0` or `n > MAX_VERTICES`.
    pub fn path(n: usize) -> Self {
        assert!((1..=MAX_VERTICES).contains(&n), "path needs 1..=64 vertices, got {n}");
        let mut graph = Self::empty(n, format!("P{n}"));
        for v in 1..n {
            graph.insert_edge(v - 1, v);
        }
        graph
    }

    /// Star \(K_{1,\ell}\) with center `0` and leaves `1..=leaves`.
    ///
    /// # Panics
    /// Panics if the star would exceed [`MAX_VERTICES`].
    pub fn star(leaves: usize) -> Self {
        assert!(leaves < MAX_VERTICES, "star needs at most 63 leaves, got {leaves}");
        let mut graph = Self::empty(leaves + 1, format!("K1,{leaves}"));
        for v in 1..=leaves {
            graph.insert_edge(0, v);
        }
        graph
    }

    /// Complete graph \(K_n\).
    ///
    /// # Panics
    /// Panics if `n == 0` or `n > MAX_VERTICES`.
    pub fn complete(n: usize) -> Self {
        assert!((1..=MAX_VERTICES).contains(&n), "complete graph needs 1..=64 vertices, got {n}");
        let mut graph = Self::empty(n, format!("K{n}"));
        for u in 0..n {
            for v in (u + 1)..n {
                graph.insert_edge(u, v);
            }
        }
        graph
    }

    /// Random recursive tree: vertex `v > 0` attaches to a uniform earlier vertex.
    ///
    /// # Panics
    /// Panics if `n == 0` or `n > MAX_VERTICES`.
    pub fn random_tree<R: Rng>(n: usize, rng: &mut R) -> Self {
        assert!((1..=MAX_VERTICES).contains(&n), "tree needs 1..=64 vertices, got {n}");
        let mut graph = Self::empty(n, format!("T{n}"));
        for v in 1..n {
            let parent = rng.random_range(0..v);
            graph.insert_edge(parent, v);
        }
        graph
    }

    /// Parses a `0/1` adjacency matrix (see [`parse_adjacency_matrix`]).
    ///
    /// # Errors
    /// Returns an error if the matrix is malformed.
    pub fn from_adjacency_matrix(text: &str) -> Result<Self, GraphParseError> {
        let rows = parse_adjacency_matrix(text)?;
        let n = rows.len();
        let mut graph = Self::empty(n, String::new());
        for u in 0..n {
            for v in (u + 1)..n {
                if (rows[u] >> v) & 1 == 1 {
                    graph.insert_edge(u, v);
                }
            }
        }
        graph.name = format!("G(n={n}, e={})", graph.edges.len());
        Ok(graph)
    }

    /// Loads a graph from a file containing a `0/1` adjacency matrix.
    ///
    /// The graph is named after the file stem.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the matrix is malformed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, GraphParseError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| GraphParseError::Io(e.to_string()))?;
        let graph = Self::from_adjacency_matrix(&text)?;
        Ok(match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => graph.with_name(stem),
            None => graph,
        })
    }

    /// Replaces the graph's display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns whether the edge `(u, v)` exists.
    #[inline]
    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        (self.adj[u] >> v) & 1 == 1
    }

    /// Degree of vertex `v`.
    #[inline]
    pub fn degree(&self, v: usize) -> u32 {
        self.adj[v].count_ones()
    }

    /// Whether every vertex is reachable from vertex `0`.
    ///
    /// The empty graph counts as disconnected.
    pub fn is_connected(&self) -> bool {
        let n = self.adj.len();
        if n == 0 {
            return false;
        }
        let all = if n == 64 { u64::MAX } else { bit(n) - 1 };
        let mut seen = bit(0);
        let mut frontier = bit(0);
        while frontier != 0 {
            let mut next = 0u64;
            let mut remaining = frontier;
            while remaining != 0 {
                let v = remaining.trailing_zeros() as usize;
                remaining &= remaining - 1;
                next |= self.adj[v];
            }
            frontier = next & !seen;
            seen |= frontier;
        }
        seen == all
    }

    fn empty(n: usize, name: String) -> Self {
        Self {
            name,
            adj: vec![0u64; n],
            edges: Vec::new(),
        }
    }

    fn insert_edge(&mut self, u: usize, v: usize) {
        self.adj[u] |= bit(v);
        self.adj[v] |= bit(u);
        self.edges.push((u.min(v), u.max(v)));
    }
}

impl LabelGraph for SimpleGraph {
    fn vertex_count(&self) -> usize {
        self.adj.len()
    }

    fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    fn is_tree(&self) -> bool {
        !self.adj.is_empty() && self.edges.len() + 1 == self.adj.len() && self.is_connected()
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Errors encountered while building or parsing a graph.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GraphParseError {
    /// No non-empty rows were found.
    #[error("adjacency matrix is empty")]
    Empty,
    /// Matrix is not square.
    #[error("adjacency matrix is not square: row {row} has length {got}, expected {expected}")]
    NonSquare {
        /// The row index with wrong length.
        row: usize,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },
    /// Encountered a non `0/1` character.
    #[error("invalid character at ({row}, {col}): {ch:?} (expected '0' or '1')")]
    InvalidChar {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
        /// The invalid character.
        ch: char,
    },
    /// More vertices than fit in a `u64` bitset.
    #[error("graph has {n} vertices; at most 64 are supported")]
    TooManyVertices {
        /// Number of vertices requested.
        n: usize,
    },
    /// An edge joins a vertex to itself.
    #[error("self-loop detected at vertex {vertex}")]
    SelfLoop {
        /// The vertex with a self-loop.
        vertex: usize,
    },
    /// `A[i][j] != A[j][i]`.
    #[error("matrix is not symmetric at ({i},{j}): A[i][j]={a_ij}, A[j][i]={a_ji}")]
    NotSymmetric {
        /// Row index.
        i: usize,
        /// Column index.
        j: usize,
        /// Value at A[i][j].
        a_ij: u8,
        /// Value at A[j][i].
        a_ji: u8,
    },
    /// An edge endpoint is not a vertex of the graph.
    #[error("edge endpoint {vertex} is out of range for {n} vertices")]
    EndpointOutOfRange {
        /// The offending endpoint.
        vertex: usize,
        /// Number of vertices.
        n: usize,
    },
    /// The same edge was listed twice.
    #[error("edge ({u}, {v}) is listed more than once")]
    DuplicateEdge {
        /// First endpoint.
        u: usize,
        /// Second endpoint.
        v: usize,
    },
    /// I/O error (file not found, etc.).
    #[error("I/O error: {0}")]
    Io(String),
}

/// Parses a `0/1` adjacency matrix from text into row bitsets.
///
/// Rules:
/// - Blank lines are ignored.
/// - The matrix must be square, symmetric, and have a zero diagonal.
/// - `n` must be `<= 64`.
///
/// # Errors
/// Returns an error if the input is empty, non-square, contains invalid characters,
/// has self-loops, or is not symmetric.
pub fn parse_adjacency_matrix(text: &str) -> Result<Vec<u64>, GraphParseError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return Err(GraphParseError::Empty);
    }
    let n = lines.len();
    if n > MAX_VERTICES {
        return Err(GraphParseError::TooManyVertices { n });
    }

    let mut rows = Vec::with_capacity(n);
    for (i, line) in lines.iter().enumerate() {
        let bytes = line.as_bytes();
        if bytes.len() != n {
            return Err(GraphParseError::NonSquare {
                row: i,
                expected: n,
                got: bytes.len(),
            });
        }
        let mut mask = 0u64;
        for (j, &b) in bytes.iter().enumerate() {
            match b {
                b'0' => {}
                b'1' => mask |= bit(j),
                _ => {
                    return Err(GraphParseError::InvalidChar {
                        row: i,
                        col: j,
                        ch: b as char,
                    })
                }
            }
        }
        rows.push(mask);
    }

    for (i, &row) in rows.iter().enumerate() {
        if (row >> i) & 1 != 0 {
            return Err(GraphParseError::SelfLoop { vertex: i });
        }
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let a_ij = ((rows[i] >> j) & 1) as u8;
            let a_ji = ((rows[j] >> i) & 1) as u8;
            if a_ij != a_ji {
                return Err(GraphParseError::NotSymmetric { i, j, a_ij, a_ji });
            }
        }
    }

    Ok(rows)
}

// ============================================================================
// Tests
// ============================================================================

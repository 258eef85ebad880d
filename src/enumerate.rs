//! Candidate enumeration and deterministic work partitioning.
//!
//! A candidate is a list of indices into the label pool, one per vertex in the
//! graph's vertex order. Two strategies:
//!
//! - [`Strategy::General`]: every ordered selection of `n` distinct pool
//!   entries (`e! / (e - n)!` candidates).
//! - [`Strategy::Tree`]: every ordered selection of `n - 1` distinct entries,
//!   each followed by every pool entry (repeats allowed). A tree has
//!   `n = e + 1` vertices, so its vertex labels cannot all be distinct.
//!
//! Both orders are lexicographic over pool positions, so the stream is the
//! same on every run and every worker can filter it by index on its own.

use crate::graph::LabelGraph;
use itertools::{Itertools, Permutations};
use std::ops::Range;

/// A candidate assignment: `candidate[v]` is the pool index of vertex `v`'s label.
pub type Candidate = Vec<usize>;

// ============================================================================
// Strategy
// ============================================================================

/// Enumeration strategy, chosen from the graph's shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Distinct labels on all vertices.
    General,
    /// Distinct labels on the first `n - 1` vertices, any label on the last.
    Tree,
}

impl Strategy {
    /// Picks [`Strategy::Tree`] for trees and [`Strategy::General`] otherwise.
    pub fn for_graph<G: LabelGraph + ?Sized>(graph: &G) -> Self {
        if graph.is_tree() {
            Self::Tree
        } else {
            Self::General
        }
    }

    /// Short name used in logs and the CLI.
    pub const fn name(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Tree => "tree",
        }
    }
}

// ============================================================================
// Partition
// ============================================================================

/// Returns whether enumeration index `index` belongs to `worker_id` out of
/// `num_workers`.
#[inline]
pub const fn assigned_to(index: usize, worker_id: usize, num_workers: usize) -> bool {
    index % num_workers == worker_id
}

/// The slice of the enumeration owned by one worker: every index congruent to
/// `worker_id` modulo `num_workers`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    worker_id: usize,
    num_workers: usize,
}

impl Partition {
    /// Creates the partition of `worker_id` among `num_workers`.
    ///
    /// # Panics
    /// Panics if `num_workers == 0` or `worker_id >= num_workers`.
    pub fn new(worker_id: usize, num_workers: usize) -> Self {
        assert!(num_workers > 0, "at least one worker is required");
        assert!(
            worker_id < num_workers,
            "worker id {worker_id} out of range for {num_workers} workers"
        );
        Self {
            worker_id,
            num_workers,
        }
    }

    /// The single partition covering the whole enumeration.
    pub const fn whole() -> Self {
        Self {
            worker_id: 0,
            num_workers: 1,
        }
    }

    /// All partitions of a pool of `num_workers` workers, in worker order.
    pub fn all(num_workers: usize) -> impl Iterator<Item = Self> {
        (0..num_workers).map(move |id| Self::new(id, num_workers))
    }

    /// Worker id owning this partition.
    #[inline]
    pub const fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Size of the worker pool.
    #[inline]
    pub const fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Whether enumeration index `index` falls in this partition.
    #[inline]
    pub const fn owns(&self, index: usize) -> bool {
        assigned_to(index, self.worker_id, self.num_workers)
    }
}

// ============================================================================
// Enumerator
// ============================================================================

/// Produces the candidate stream for a graph shape and pool size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateEnumerator {
    strategy: Strategy,
    vertex_count: usize,
    label_count: usize,
}

impl CandidateEnumerator {
    /// Creates an enumerator for `vertex_count` vertices over a pool of
    /// `label_count` labels.
    pub const fn new(strategy: Strategy, vertex_count: usize, label_count: usize) -> Self {
        Self {
            strategy,
            vertex_count,
            label_count,
        }
    }

    /// Creates the enumerator the search uses for `graph`: strategy from its
    /// shape, pool size equal to its edge count.
    pub fn for_graph<G: LabelGraph + ?Sized>(graph: &G) -> Self {
        Self::new(
            Strategy::for_graph(graph),
            graph.vertex_count(),
            graph.edge_count(),
        )
    }

    /// The enumeration strategy.
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Length of the distinct-label prefix of each candidate.
    const fn prefix_len(&self) -> usize {
        match self.strategy {
            Strategy::General => self.vertex_count,
            Strategy::Tree => self.vertex_count.saturating_sub(1),
        }
    }

    /// Total number of candidates over all partitions, or `None` if it does
    /// not fit in a `u128`.
    pub fn candidate_count(&self) -> Option<u128> {
        let k = self.prefix_len();
        let e = self.label_count;
        if k > e {
            return Some(0);
        }
        // e! / (e - k)!
        let prefixes = ((e - k + 1)..=e).try_fold(1u128, |acc, x| acc.checked_mul(x as u128))?;
        match self.strategy {
            Strategy::General => Some(prefixes),
            Strategy::Tree => prefixes.checked_mul(e as u128),
        }
    }

    /// Lazily enumerates the candidates owned by `partition`.
    ///
    /// The partition unit is the distinct-label prefix: for the general
    /// strategy that is the whole candidate, for the tree strategy all
    /// completions of a prefix stay with the prefix's owner.
    pub fn candidates(&self, partition: Partition) -> Candidates {
        Candidates {
            prefixes: (0..self.label_count).permutations(self.prefix_len()),
            partition,
            next_index: 0,
            strategy: self.strategy,
            label_count: self.label_count,
            pending: None,
        }
    }
}

/// Iterator over one partition's candidates. See [`CandidateEnumerator::candidates`].
pub struct Candidates {
    prefixes: Permutations<Range<usize>>,
    partition: Partition,
    next_index: usize,
    strategy: Strategy,
    label_count: usize,
    /// Tree strategy: the current prefix and the next tail label to append.
    pending: Option<(Vec<usize>, usize)>,
}

impl Candidates {
    fn next_owned_prefix(&mut self) -> Option<Vec<usize>> {
        loop {
            let prefix = self.prefixes.next()?;
            let index = self.next_index;
            self.next_index += 1;
            if self.partition.owns(index) {
                return Some(prefix);
            }
        }
    }
}

impl Iterator for Candidates {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        match self.strategy {
            Strategy::General => self.next_owned_prefix(),
            Strategy::Tree => loop {
                if let Some((prefix, tail)) = &mut self.pending {
                    if *tail < self.label_count {
                        let mut candidate = Vec::with_capacity(prefix.len() + 1);
                        candidate.extend_from_slice(prefix);
                        candidate.push(*tail);
                        *tail += 1;
                        return Some(candidate);
                    }
                }
                let prefix = self.next_owned_prefix()?;
                self.pending = Some((prefix, 0));
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

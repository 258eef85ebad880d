//! Validity check for candidate labelings: the induced edge labels must be
//! pairwise distinct.

use crate::graph::LabelGraph;
use crate::labels::{Label, Moduli};
use std::collections::HashSet;

// ============================================================================
// Checker
// ============================================================================

/// Reusable edge-label injectivity checker.
///
/// Edge labels are compared through their mixed-radix codes in a hash set, so
/// one check is O(e·k). The set is kept between calls; a worker builds one
/// checker and runs every candidate of its partition through it.
#[derive(Debug)]
pub struct EdgeLabelChecker<'a> {
    edges: &'a [(usize, usize)],
    vertex_count: usize,
    moduli: &'a Moduli,
    seen: HashSet<u64>,
}

impl<'a> EdgeLabelChecker<'a> {
    /// Creates a checker for `graph` under `moduli`.
    pub fn new<G: LabelGraph + ?Sized>(graph: &'a G, moduli: &'a Moduli) -> Self {
        let edges = graph.edges();
        Self {
            edges,
            vertex_count: graph.vertex_count(),
            moduli,
            seen: HashSet::with_capacity(edges.len()),
        }
    }

    /// Checks a vertex labeling given as one label per vertex position.
    pub fn is_valid(&mut self, assignment: &[Label]) -> bool {
        debug_assert_eq!(assignment.len(), self.vertex_count);
        self.check(|v| assignment[v].components())
    }

    /// Checks a candidate given as pool indices, one per vertex position.
    pub fn is_valid_candidate(&mut self, pool: &[Label], candidate: &[usize]) -> bool {
        debug_assert_eq!(candidate.len(), self.vertex_count);
        self.check(|v| pool[candidate[v]].components())
    }

    fn check<'l>(&mut self, label_of: impl Fn(usize) -> &'l [u32]) -> bool {
        self.seen.clear();
        for &(u, v) in self.edges {
            let code = self.moduli.combined_code(label_of(u), label_of(v));
            if !self.seen.insert(code) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Free functions
// ============================================================================

/// Returns whether `assignment` (one label per vertex position) induces
/// pairwise distinct edge labels on `graph`.
pub fn is_valid<G: LabelGraph + ?Sized>(graph: &G, assignment: &[Label], moduli: &Moduli) -> bool {
    EdgeLabelChecker::new(graph, moduli).is_valid(assignment)
}

/// Induced label of every edge, in the graph's edge order.
pub fn edge_labels<G: LabelGraph + ?Sized>(
    graph: &G,
    assignment: &[Label],
    moduli: &Moduli,
) -> Vec<((usize, usize), Label)> {
    graph
        .edges()
        .iter()
        .map(|&(u, v)| ((u, v), moduli.combine(&assignment[u], &assignment[v])))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SimpleGraph;
    use crate::labels::label_space;

    fn labels(raw: &[u32]) -> Vec<Label> {
        raw.iter().map(|&x| Label::from([x])).collect()
    }

    #[test]
    fn distinct_labels_on_a_triangle_are_always_valid() {
        // a+b == a+c iff b == c, so distinct vertex labels never collide on K3.
        let graph = SimpleGraph::cycle(3);
        let moduli = Moduli::new([2, 2]).unwrap();
        let space = label_space(&moduli);
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    if a == b || b == c || a == c {
                        continue;
                    }
                    let assignment = vec![space[a].clone(), space[b].clone(), space[c].clone()];
                    assert!(is_valid(&graph, &assignment, &moduli));
                }
            }
        }
    }

    #[test]
    fn disjoint_edges_can_collide() {
        // C4 with 0,1,2,3 in Z4: edges (0,1)->1 and (2,3)->1.
        let graph = SimpleGraph::cycle(4);
        let moduli = Moduli::new([4]).unwrap();
        assert!(!is_valid(&graph, &labels(&[0, 1, 2, 3]), &moduli));
        // 0,1,3,2: sums 1,0,1,2
        assert!(!is_valid(&graph, &labels(&[0, 1, 3, 2]), &moduli));
    }

    #[test]
    fn path_with_repeated_vertex_label() {
        let graph = SimpleGraph::path(4);
        let moduli = Moduli::new([3]).unwrap();
        // sums 1, 0, 2
        assert!(is_valid(&graph, &labels(&[0, 1, 2, 0]), &moduli));
        // sums 1, 1, 1
        assert!(!is_valid(&graph, &labels(&[0, 1, 0, 1]), &moduli));
    }

    #[test]
    fn checker_is_reusable_across_candidates() {
        let graph = SimpleGraph::path(4);
        let moduli = Moduli::new([3]).unwrap();
        let pool = labels(&[0, 1, 2]);
        let mut checker = EdgeLabelChecker::new(&graph, &moduli);
        assert!(!checker.is_valid_candidate(&pool, &[0, 1, 0, 1]));
        assert!(checker.is_valid_candidate(&pool, &[0, 1, 2, 0]));
        assert!(checker.is_valid_candidate(&pool, &[0, 1, 2, 0]));
    }

    #[test]
    fn edge_labels_follow_edge_order() {
        let graph = SimpleGraph::star(2);
        let moduli = Moduli::new([3]).unwrap();
        let mapping = edge_labels(&graph, &labels(&[2, 2, 0]), &moduli);
        assert_eq!(
            mapping,
            vec![((0, 1), Label::from([1])), ((0, 2), Label::from([2]))]
        );
    }
}

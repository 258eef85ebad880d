//! # Gamma-Harmonious Labeling Search
//!
//! A parallel exhaustive search for *gamma-harmonious* labelings: vertex labels
//! drawn from \(\mathbb{Z}_{m_1} \times \dots \times \mathbb{Z}_{m_k}\) whose
//! induced edge labels (component-wise sums of the endpoint labels) are
//! pairwise distinct.
//!
//! This crate provides:
//! - The label space of a modulus list, in lexicographic order.
//! - Lazy candidate enumeration, with a cheaper strategy for trees.
//! - An O(e·k) validity check.
//! - A worker pool with deterministic partitioning and two completion
//!   protocols: first match with cancellation, and exhaustive streaming.
//!
//! ## Quick Start
//!
//! ```
//! use gamma_search::prelude::*;
//!
//! // Odd cycles are harmonious: C5 over Z5.
//! let graph = SimpleGraph::cycle(5);
//! let moduli = Moduli::new([5]).unwrap();
//! let labels = label_space(&moduli);
//!
//! let config = SearchConfig::default().with_workers(2);
//! let outcome = Searcher::new(config, &NullExporter)
//!     .find_one(&graph, &labels, &moduli)
//!     .unwrap();
//!
//! let labeling = outcome.labeling().expect("C5 has a harmonious labeling");
//! assert!(is_valid(&graph, &labeling.assignment, &moduli));
//! ```
//!
//! ## Enumerating Every Labeling
//!
//! ```
//! use gamma_search::prelude::*;
//!
//! let graph = SimpleGraph::star(3);
//! let moduli = Moduli::new([3]).unwrap();
//! let labels = label_space(&moduli);
//!
//! let exporter = MemoryExporter::new();
//! let summary = Searcher::new(SearchConfig::default().with_workers(2), &exporter)
//!     .find_all(&graph, &labels, &moduli)
//!     .unwrap();
//! assert_eq!(summary.matches, exporter.labelings().len());
//! ```
//!
//! ## Modules
//!
//! - [`labels`]: Moduli, labels, and the label space.
//! - [`graph`]: The graph interface the search consumes, and a small bitset graph.
//! - [`enumerate`]: Candidate streams and work partitions.
//! - [`validate`]: Edge-label injectivity check.
//! - [`search`]: Worker pool and coordinator.
//! - [`export`]: Where results go.
//!
//! ## Performance Notes
//!
//! - The candidate space is `e! / (e - n)!` (times `e` for trees); only tiny
//!   graphs are practical.
//! - Which labeling `find_one` returns depends on worker timing. Whether one
//!   exists does not.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::inline_always)] // Intentional for hot-path code
#![allow(clippy::doc_markdown)] // LaTeX-style notation in docs

pub mod enumerate;
pub mod export;
pub mod graph;
pub mod labels;
pub mod search;
pub mod validate;

/// Re-export commonly used types for convenience.
pub mod prelude {
    pub use crate::enumerate::{CandidateEnumerator, Partition, Strategy};
    pub use crate::export::{Exporter, FileExporter, MemoryExporter, NullExporter};
    pub use crate::graph::{LabelGraph, SimpleGraph};
    pub use crate::labels::{iter_label_space, label_space, Label, Moduli};
    pub use crate::search::{
        find_all, find_one, SearchConfig, SearchError, SearchOutcome, SearchSummary, Searcher,
    };
    pub use crate::validate::is_valid;
}

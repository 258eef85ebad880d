//! Exporter boundary: where found labelings (and "no labeling" outcomes) go.
//!
//! The search calls an [`Exporter`] synchronously from the coordinator or from
//! worker threads and only logs its failures; what an exporter does with a
//! labeling never affects the search.

use crate::graph::LabelGraph;
use crate::labels::{Label, Moduli};
use itertools::Itertools;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors raised by exporters.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing an artifact failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Receives search results.
///
/// Implementations must be `Sync`: in exhaustive mode every worker thread
/// exports its own matches as it finds them.
pub trait Exporter: Sync {
    /// Persists a valid labeling. `assignment[v]` is the label of vertex `v`.
    ///
    /// `destination` names the artifact; exhaustive searches pass a unique
    /// `Worker-{id}_Labeling-{seq}` name per match.
    ///
    /// # Errors
    /// Returns an error if the labeling could not be persisted.
    fn export_labeling(
        &self,
        graph: &dyn LabelGraph,
        assignment: &[Label],
        moduli: &Moduli,
        destination: Option<&str>,
    ) -> Result<(), ExportError>;

    /// Records that no valid labeling exists for `labels`.
    ///
    /// # Errors
    /// Returns an error if the outcome could not be persisted.
    fn export_not_found(
        &self,
        graph: &dyn LabelGraph,
        labels: &[Label],
        moduli: &Moduli,
    ) -> Result<(), ExportError> {
        let _ = (graph, labels, moduli);
        Ok(())
    }
}

// ============================================================================
// NullExporter
// ============================================================================

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullExporter;

impl Exporter for NullExporter {
    fn export_labeling(
        &self,
        _graph: &dyn LabelGraph,
        _assignment: &[Label],
        _moduli: &Moduli,
        _destination: Option<&str>,
    ) -> Result<(), ExportError> {
        Ok(())
    }
}

// ============================================================================
// MemoryExporter
// ============================================================================

/// A labeling captured by [`MemoryExporter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedLabeling {
    /// Artifact name passed by the search.
    pub destination: Option<String>,
    /// One label per vertex position.
    pub assignment: Vec<Label>,
}

/// Keeps every exported labeling in memory.
#[derive(Debug, Default)]
pub struct MemoryExporter {
    labelings: Mutex<Vec<ExportedLabeling>>,
    not_found: Mutex<usize>,
}

impl MemoryExporter {
    /// Creates an empty exporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the labelings exported so far, in arrival order.
    pub fn labelings(&self) -> Vec<ExportedLabeling> {
        self.labelings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the labelings exported so far.
    pub fn take(&self) -> Vec<ExportedLabeling> {
        std::mem::take(&mut *self.labelings.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of "no labeling found" outcomes recorded.
    pub fn not_found_count(&self) -> usize {
        *self.not_found.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Exporter for MemoryExporter {
    fn export_labeling(
        &self,
        _graph: &dyn LabelGraph,
        assignment: &[Label],
        _moduli: &Moduli,
        destination: Option<&str>,
    ) -> Result<(), ExportError> {
        self.labelings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ExportedLabeling {
                destination: destination.map(str::to_string),
                assignment: assignment.to_vec(),
            });
        Ok(())
    }

    fn export_not_found(
        &self,
        _graph: &dyn LabelGraph,
        _labels: &[Label],
        _moduli: &Moduli,
    ) -> Result<(), ExportError> {
        *self.not_found.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

// ============================================================================
// FileExporter
// ============================================================================

/// Artifact name used when a labeling is exported without a destination.
pub const DEFAULT_LABELING_NAME: &str = "Labeling";

/// Artifact name for the "no labeling found" outcome.
pub const NOT_FOUND_NAME: &str = "Output";

/// Writes one text file per labeling into a directory.
///
/// A labeling is written to `{destination}.txt` as one `vertex:label` line per
/// vertex, e.g. `0:(1, 2)`. A "no labeling found" outcome is written to
/// `Output.txt`.
#[derive(Clone, Debug)]
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    /// Creates the exporter, creating `dir` if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ExportError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_artifact(
        &self,
        name: &str,
        body: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    ) -> Result<(), ExportError> {
        let path = self.dir.join(format!("{name}.txt"));
        let result = File::create(&path).and_then(|f| {
            let mut w = BufWriter::new(f);
            body(&mut w)?;
            w.flush()
        });
        result.map_err(|source| ExportError::Io { path, source })
    }
}

impl Exporter for FileExporter {
    fn export_labeling(
        &self,
        graph: &dyn LabelGraph,
        assignment: &[Label],
        _moduli: &Moduli,
        destination: Option<&str>,
    ) -> Result<(), ExportError> {
        self.write_artifact(destination.unwrap_or(DEFAULT_LABELING_NAME), |w| {
            for (v, label) in assignment.iter().enumerate() {
                writeln!(w, "{}:{label}", graph.vertex_name(v))?;
            }
            Ok(())
        })
    }

    fn export_not_found(
        &self,
        graph: &dyn LabelGraph,
        labels: &[Label],
        moduli: &Moduli,
    ) -> Result<(), ExportError> {
        self.write_artifact(NOT_FOUND_NAME, |w| {
            writeln!(
                w,
                "No labeling of {} is found with [{}] over {moduli}",
                graph.name(),
                labels.iter().join(", ")
            )
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SimpleGraph;

    fn assignment(raw: &[[u32; 2]]) -> Vec<Label> {
        raw.iter().map(|&c| Label::from(c)).collect()
    }

    #[test]
    fn file_exporter_writes_vertex_label_lines() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileExporter::new(dir.path().join("out")).unwrap();
        let graph = SimpleGraph::cycle(3);
        let moduli = Moduli::new([2, 2]).unwrap();
        let labels = assignment(&[[0, 0], [0, 1], [1, 0]]);

        exporter
            .export_labeling(&graph, &labels, &moduli, Some("Worker-0_Labeling-1"))
            .unwrap();

        let text = fs::read_to_string(exporter.dir().join("Worker-0_Labeling-1.txt")).unwrap();
        assert_eq!(text, "0:(0, 0)\n1:(0, 1)\n2:(1, 0)\n");
    }

    #[test]
    fn file_exporter_uses_default_name_without_destination() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileExporter::new(dir.path()).unwrap();
        let graph = SimpleGraph::path(2);
        let moduli = Moduli::new([2, 2]).unwrap();
        exporter
            .export_labeling(&graph, &assignment(&[[1, 1], [0, 1]]), &moduli, None)
            .unwrap();
        assert!(dir.path().join("Labeling.txt").exists());
    }

    #[test]
    fn file_exporter_writes_not_found_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileExporter::new(dir.path()).unwrap();
        let graph = SimpleGraph::cycle(4);
        let moduli = Moduli::new([2, 2]).unwrap();
        let labels = assignment(&[[0, 0], [0, 1], [1, 0], [1, 1]]);
        exporter.export_not_found(&graph, &labels, &moduli).unwrap();

        let text = fs::read_to_string(dir.path().join("Output.txt")).unwrap();
        assert_eq!(
            text,
            "No labeling of C4 is found with [(0, 0), (0, 1), (1, 0), (1, 1)] over Z_2 x Z_2\n"
        );
    }

    #[test]
    fn file_exporter_reports_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileExporter::new(dir.path()).unwrap();
        let graph = SimpleGraph::path(2);
        let moduli = Moduli::new([2]).unwrap();
        let err = exporter
            .export_labeling(
                &graph,
                &[Label::from([0]), Label::from([1])],
                &moduli,
                Some("missing/dir/name"),
            )
            .unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }

    #[test]
    fn memory_exporter_collects_in_order() {
        let exporter = MemoryExporter::new();
        let graph = SimpleGraph::path(2);
        let moduli = Moduli::new([2, 2]).unwrap();
        exporter
            .export_labeling(&graph, &assignment(&[[0, 0], [0, 1]]), &moduli, Some("a"))
            .unwrap();
        exporter
            .export_labeling(&graph, &assignment(&[[1, 0], [0, 1]]), &moduli, None)
            .unwrap();
        exporter.export_not_found(&graph, &[], &moduli).unwrap();

        let got = exporter.take();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].destination.as_deref(), Some("a"));
        assert_eq!(got[1].destination, None);
        assert!(exporter.labelings().is_empty());
        assert_eq!(exporter.not_found_count(), 1);
    }
}

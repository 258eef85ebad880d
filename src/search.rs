//! Parallel search driver: spawns the worker pool, runs the completion
//! protocol, and hands results to the exporter.
//!
//! Two modes share one coordinator:
//!
//! - **First match** ([`Searcher::find_one`]): the first `Found` signal the
//!   coordinator observes wins. It raises the cancellation flag, keeps draining
//!   until every worker has reported, and returns that labeling. Which valid
//!   labeling wins depends on thread timing; whether one is found does not.
//! - **Exhaustive** ([`Searcher::find_all`]): no cancellation. Workers stream
//!   every match to the exporter as `Worker-{id}_Labeling-{seq}` and the
//!   coordinator waits for all of them.
//!
//! Workers report over a `crossbeam` channel, exactly one signal each. A
//! worker that panics reports `Failed`; if the channel disconnects with slots
//! still empty, the missing workers are marked failed. Failed workers count as
//! exhausted for termination, so the coordinator never blocks forever.

use crate::enumerate::{Candidate, CandidateEnumerator, Partition};
use crate::export::{Exporter, NullExporter};
use crate::graph::LabelGraph;
use crate::labels::{Label, LabelError, Moduli};
use crate::validate::{edge_labels, EdgeLabelChecker};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Default coordinator poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Candidates a worker checks between updates of the shared progress counter.
const TALLY_FLUSH_EVERY: u64 = 4096;

/// Artifact name for the labeling returned by a first-match search.
pub const FOUND_LABELING_NAME: &str = "Valid_Gamma_Harmonious_Labeling";

/// Search configuration parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    /// Number of worker threads, each owning one partition.
    pub num_workers: usize,
    /// How long the coordinator waits for a signal before logging progress
    /// and waiting again.
    pub poll_interval: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_workers: default_worker_count(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SearchConfig {
    /// Overrides the worker count.
    #[must_use]
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Overrides the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// One worker per logical core, minus one for the coordinator, at least one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .map_or(1, |n| n.saturating_sub(1))
        .max(1)
}

// ============================================================================
// Errors and results
// ============================================================================

/// Configuration errors. All of them are reported before any worker starts.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The label pool must hold exactly one label per edge.
    #[error("label pool has {labels} labels but the graph has {edges} edges")]
    LabelCountMismatch {
        /// Pool size.
        labels: usize,
        /// Edge count of the graph.
        edges: usize,
    },
    /// A pool label does not fit the moduli.
    #[error("label {index} in the pool is invalid: {source}")]
    InvalidLabel {
        /// Position of the label in the pool.
        index: usize,
        /// What is wrong with it.
        #[source]
        source: LabelError,
    },
    /// The configured worker count is zero.
    #[error("worker count must be at least 1")]
    NoWorkers,
    /// The worker thread pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A valid labeling returned by a first-match search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labeling {
    /// `assignment[v]` is the label of vertex `v`.
    pub assignment: Vec<Label>,
    /// Pool index of each vertex's label.
    pub pool_indices: Vec<usize>,
    /// Worker that found it.
    pub worker_id: usize,
}

impl Labeling {
    /// Induced edge labels, in the graph's edge order.
    pub fn edge_labels<G: LabelGraph + ?Sized>(
        &self,
        graph: &G,
        moduli: &Moduli,
    ) -> Vec<((usize, usize), Label)> {
        edge_labels(graph, &self.assignment, moduli)
    }
}

/// Result of a first-match search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A valid labeling.
    Found(Labeling),
    /// No worker found one; the enumeration was exhausted.
    NotFound,
    /// No worker found one, but some workers failed before finishing their
    /// partitions, so a labeling may still exist.
    Incomplete {
        /// Workers that panicked or exited without reporting.
        failed_workers: usize,
    },
}

impl SearchOutcome {
    /// The labeling, if one was found.
    pub fn labeling(&self) -> Option<&Labeling> {
        match self {
            Self::Found(labeling) => Some(labeling),
            Self::NotFound | Self::Incomplete { .. } => None,
        }
    }

    /// Whether a labeling was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Counters from an exhaustive search. The labelings themselves went to the
/// exporter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchSummary {
    /// Total valid labelings found.
    pub matches: usize,
    /// Valid labelings found by each worker, indexed by worker id.
    pub matches_per_worker: Vec<usize>,
    /// Candidates checked across all workers.
    pub candidates_checked: u64,
    /// Workers that panicked or exited without reporting.
    pub failed_workers: usize,
    /// Wall-clock duration of the search.
    pub elapsed: Duration,
}

// ============================================================================
// Public API
// ============================================================================

/// Finds one labeling with the default configuration and no exporter.
///
/// # Errors
/// See [`Searcher::find_one`].
pub fn find_one<G: LabelGraph>(
    graph: &G,
    labels: &[Label],
    moduli: &Moduli,
) -> Result<SearchOutcome, SearchError> {
    Searcher::new(SearchConfig::default(), &NullExporter).find_one(graph, labels, moduli)
}

/// Streams every labeling to `exporter` with the default configuration.
///
/// # Errors
/// See [`Searcher::find_all`].
pub fn find_all<G: LabelGraph>(
    graph: &G,
    labels: &[Label],
    moduli: &Moduli,
    exporter: &dyn Exporter,
) -> Result<SearchSummary, SearchError> {
    Searcher::new(SearchConfig::default(), exporter).find_all(graph, labels, moduli)
}

/// Runs searches with a fixed configuration and exporter.
pub struct Searcher<'e> {
    config: SearchConfig,
    exporter: &'e dyn Exporter,
}

impl<'e> Searcher<'e> {
    /// Creates a searcher.
    pub fn new(config: SearchConfig, exporter: &'e dyn Exporter) -> Self {
        Self { config, exporter }
    }

    /// The configuration in use.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Searches for one valid labeling, cancelling the remaining workers as
    /// soon as one is observed.
    ///
    /// The labeling is exported as [`FOUND_LABELING_NAME`]; if none exists the
    /// exporter receives [`Exporter::export_not_found`]. If a worker failed
    /// and nothing was found, the result is [`SearchOutcome::Incomplete`] and
    /// nothing is exported.
    ///
    /// # Errors
    /// Returns an error, without starting any worker, if `labels.len()` is not
    /// the edge count, a label does not fit `moduli`, or the worker pool cannot
    /// be built.
    pub fn find_one<G: LabelGraph>(
        &self,
        graph: &G,
        labels: &[Label],
        moduli: &Moduli,
    ) -> Result<SearchOutcome, SearchError> {
        let enumerator = self.prepare(graph, labels, moduli)?;
        info!(
            graph = %graph.name(),
            moduli = %moduli,
            strategy = enumerator.strategy().name(),
            workers = self.config.num_workers,
            candidates = ?enumerator.candidate_count(),
            "searching for one labeling"
        );

        let report = self.run(graph, labels, moduli, enumerator, Mode::FirstMatch)?;

        let outcome = match report.found {
            Some((worker_id, candidate)) => {
                let assignment = resolve(labels, &candidate);
                info!(
                    worker = worker_id,
                    labeling = %format_assignment(&assignment),
                    elapsed = ?report.elapsed,
                    "valid labeling found"
                );
                if let Err(e) =
                    self.exporter
                        .export_labeling(graph, &assignment, moduli, Some(FOUND_LABELING_NAME))
                {
                    warn!("failed to export labeling: {e}");
                }
                SearchOutcome::Found(Labeling {
                    assignment,
                    pool_indices: candidate,
                    worker_id,
                })
            }
            None if report.failed_workers > 0 => {
                warn!(
                    checked = report.candidates_checked,
                    failed_workers = report.failed_workers,
                    elapsed = ?report.elapsed,
                    "search incomplete; no labeling found in the partitions that finished"
                );
                SearchOutcome::Incomplete {
                    failed_workers: report.failed_workers,
                }
            }
            None => {
                info!(
                    checked = report.candidates_checked,
                    elapsed = ?report.elapsed,
                    "no valid labeling found"
                );
                if let Err(e) = self.exporter.export_not_found(graph, labels, moduli) {
                    warn!("failed to export not-found outcome: {e}");
                }
                SearchOutcome::NotFound
            }
        };
        Ok(outcome)
    }

    /// Enumerates every valid labeling, streaming each one to the exporter as
    /// it is found.
    ///
    /// # Errors
    /// Same configuration errors as [`Searcher::find_one`].
    pub fn find_all<G: LabelGraph>(
        &self,
        graph: &G,
        labels: &[Label],
        moduli: &Moduli,
    ) -> Result<SearchSummary, SearchError> {
        let enumerator = self.prepare(graph, labels, moduli)?;
        info!(
            graph = %graph.name(),
            moduli = %moduli,
            strategy = enumerator.strategy().name(),
            workers = self.config.num_workers,
            candidates = ?enumerator.candidate_count(),
            "enumerating all labelings"
        );

        let report = self.run(graph, labels, moduli, enumerator, Mode::Exhaustive)?;
        let summary = SearchSummary {
            matches: report.matches_per_worker.iter().sum(),
            matches_per_worker: report.matches_per_worker,
            candidates_checked: report.candidates_checked,
            failed_workers: report.failed_workers,
            elapsed: report.elapsed,
        };
        info!(
            matches = summary.matches,
            checked = summary.candidates_checked,
            failed_workers = summary.failed_workers,
            elapsed = ?summary.elapsed,
            "enumeration complete"
        );
        Ok(summary)
    }

    /// Checks the configuration before anything is spawned.
    fn prepare<G: LabelGraph>(
        &self,
        graph: &G,
        labels: &[Label],
        moduli: &Moduli,
    ) -> Result<CandidateEnumerator, SearchError> {
        if self.config.num_workers == 0 {
            return Err(SearchError::NoWorkers);
        }
        let edges = graph.edge_count();
        if labels.len() != edges {
            return Err(SearchError::LabelCountMismatch {
                labels: labels.len(),
                edges,
            });
        }
        for (index, label) in labels.iter().enumerate() {
            moduli
                .check_label(label)
                .map_err(|source| SearchError::InvalidLabel { index, source })?;
        }
        Ok(CandidateEnumerator::for_graph(graph))
    }

    /// Spawns the pool, coordinates it, and joins it.
    fn run<G: LabelGraph>(
        &self,
        graph: &G,
        pool_labels: &[Label],
        moduli: &Moduli,
        enumerator: CandidateEnumerator,
        mode: Mode,
    ) -> Result<RunReport, SearchError> {
        let num_workers = self.config.num_workers;
        let mut coordinator = Coordinator::new(mode, num_workers, self.config.poll_interval);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("gamma-worker-{i}"))
            .build()?;

        let cancel = AtomicBool::new(false);
        let checked = AtomicU64::new(0);
        let (tx, rx) = channel::unbounded::<WorkerSignal>();
        let ctx = WorkerContext {
            graph,
            pool: pool_labels,
            moduli,
            enumerator,
            cancel: &cancel,
            checked: &checked,
            exporter: self.exporter,
        };

        pool.in_place_scope(|scope| {
            for partition in Partition::all(num_workers) {
                let tx = tx.clone();
                let ctx = &ctx;
                scope.spawn(move |_| {
                    trace!(
                        worker = partition.worker_id(),
                        of = partition.num_workers(),
                        "worker started"
                    );
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match mode {
                        Mode::FirstMatch => ctx.first_match(partition),
                        Mode::Exhaustive => ctx.exhaustive(partition),
                    }))
                    .unwrap_or_else(|payload| WorkerOutcome::Failed(panic_message(&*payload)));
                    // The receiver outlives the scope; a send can only fail if
                    // the coordinator itself is gone.
                    let _ = tx.send(WorkerSignal {
                        worker_id: partition.worker_id(),
                        outcome,
                    });
                });
            }
            drop(tx);
            coordinator.advance(Phase::Running);
            coordinator.collect(&rx, &cancel, &checked);
        });
        // Every spawned task has returned once the scope closes.
        coordinator.advance(Phase::Collected);
        let report = coordinator.finish(checked.load(Ordering::Relaxed));
        Ok(report)
    }
}

// ============================================================================
// Worker
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    FirstMatch,
    Exhaustive,
}

/// One-shot message from a worker to the coordinator.
#[derive(Debug)]
struct WorkerSignal {
    worker_id: usize,
    outcome: WorkerOutcome,
}

#[derive(Debug)]
enum WorkerOutcome {
    /// First-match mode: a valid candidate.
    Found(Candidate),
    /// The partition was fully enumerated.
    Exhausted { matches: usize },
    /// The worker stopped on the cancellation flag.
    Cancelled,
    /// The worker panicked or vanished.
    Failed(String),
}

/// Everything a worker borrows from the search call.
struct WorkerContext<'a, G> {
    graph: &'a G,
    pool: &'a [Label],
    moduli: &'a Moduli,
    enumerator: CandidateEnumerator,
    cancel: &'a AtomicBool,
    checked: &'a AtomicU64,
    exporter: &'a dyn Exporter,
}

impl<G: LabelGraph> WorkerContext<'_, G> {
    fn first_match(&self, partition: Partition) -> WorkerOutcome {
        let mut checker = EdgeLabelChecker::new(self.graph, self.moduli);
        let mut tally = Tally::new(self.checked);
        for candidate in self.enumerator.candidates(partition) {
            if self.cancel.load(Ordering::Relaxed) {
                return WorkerOutcome::Cancelled;
            }
            tally.bump();
            if checker.is_valid_candidate(self.pool, &candidate) {
                return WorkerOutcome::Found(candidate);
            }
        }
        WorkerOutcome::Exhausted { matches: 0 }
    }

    fn exhaustive(&self, partition: Partition) -> WorkerOutcome {
        let worker_id = partition.worker_id();
        let mut checker = EdgeLabelChecker::new(self.graph, self.moduli);
        let mut tally = Tally::new(self.checked);
        let mut matches = 0usize;
        for candidate in self.enumerator.candidates(partition) {
            tally.bump();
            if !checker.is_valid_candidate(self.pool, &candidate) {
                continue;
            }
            matches += 1;
            let assignment = resolve(self.pool, &candidate);
            let destination = format!("Worker-{worker_id}_Labeling-{matches}");
            trace!(worker = worker_id, %destination, "streaming labeling");
            if let Err(e) =
                self.exporter
                    .export_labeling(self.graph, &assignment, self.moduli, Some(&destination))
            {
                warn!(worker = worker_id, "failed to export {destination}: {e}");
            }
        }
        WorkerOutcome::Exhausted { matches }
    }
}

/// Batches a worker's candidate count into the shared counter.
///
/// Flushes on drop, including while unwinding from a panic.
struct Tally<'a> {
    local: u64,
    shared: &'a AtomicU64,
}

impl<'a> Tally<'a> {
    fn new(shared: &'a AtomicU64) -> Self {
        Self { local: 0, shared }
    }

    #[inline]
    fn bump(&mut self) {
        self.local += 1;
        if self.local == TALLY_FLUSH_EVERY {
            self.shared.fetch_add(self.local, Ordering::Relaxed);
            self.local = 0;
        }
    }
}

impl Drop for Tally<'_> {
    fn drop(&mut self) {
        self.shared.fetch_add(self.local, Ordering::Relaxed);
    }
}

fn resolve(pool: &[Label], candidate: &[usize]) -> Vec<Label> {
    candidate.iter().map(|&i| pool[i].clone()).collect()
}

fn format_assignment(assignment: &[Label]) -> String {
    assignment
        .iter()
        .enumerate()
        .map(|(v, label)| format!("{v}:{label}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Coordinator lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Spawning,
    Running,
    Found,
    AllExhausted,
    Collected,
    Done,
}

impl Phase {
    fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Spawning, Self::Running)
                | (Self::Running, Self::Found | Self::AllExhausted)
                | (Self::Found | Self::AllExhausted, Self::Collected)
                | (Self::Collected, Self::Done)
        )
    }
}

/// Per-worker outcome slots. Each worker fills its own slot once.
#[derive(Debug)]
struct OutcomeSlots {
    slots: Vec<Option<WorkerOutcome>>,
    filled: usize,
}

impl OutcomeSlots {
    fn new(num_workers: usize) -> Self {
        Self {
            slots: (0..num_workers).map(|_| None).collect(),
            filled: 0,
        }
    }

    /// Stores a signal. Returns `false` if the slot was already filled.
    fn record(&mut self, signal: WorkerSignal) -> bool {
        let slot = &mut self.slots[signal.worker_id];
        if slot.is_some() {
            return false;
        }
        *slot = Some(signal.outcome);
        self.filled += 1;
        true
    }

    fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    fn pending(&self) -> usize {
        self.slots.len() - self.filled
    }

    /// Marks every empty slot as failed. Returns how many were empty.
    fn fail_missing(&mut self, reason: &str) -> usize {
        let mut missing = 0;
        for slot in self.slots.iter_mut().filter(|s| s.is_none()) {
            *slot = Some(WorkerOutcome::Failed(reason.to_string()));
            missing += 1;
        }
        self.filled += missing;
        missing
    }

    fn failed(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Some(WorkerOutcome::Failed(_))))
            .count()
    }

    fn matches_per_worker(&self) -> Vec<usize> {
        self.slots
            .iter()
            .map(|s| match s {
                Some(WorkerOutcome::Exhausted { matches }) => *matches,
                Some(WorkerOutcome::Found(_)) => 1,
                _ => 0,
            })
            .collect()
    }
}

struct RunReport {
    found: Option<(usize, Candidate)>,
    matches_per_worker: Vec<usize>,
    failed_workers: usize,
    candidates_checked: u64,
    elapsed: Duration,
}

struct Coordinator {
    mode: Mode,
    poll_interval: Duration,
    phase: Phase,
    slots: OutcomeSlots,
    found: Option<(usize, Candidate)>,
    started: Instant,
}

impl Coordinator {
    fn new(mode: Mode, num_workers: usize, poll_interval: Duration) -> Self {
        Self {
            mode,
            poll_interval,
            phase: Phase::Spawning,
            slots: OutcomeSlots::new(num_workers),
            found: None,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid coordinator transition {:?} -> {next:?}",
            self.phase
        );
        debug!(from = ?self.phase, to = ?next, "coordinator phase");
        self.phase = next;
    }

    /// Waits until every worker has reported, then settles on `Found` or
    /// `AllExhausted`.
    fn collect(&mut self, rx: &Receiver<WorkerSignal>, cancel: &AtomicBool, checked: &AtomicU64) {
        while !self.slots.is_complete() {
            match rx.recv_timeout(self.poll_interval) {
                Ok(signal) => self.observe(signal, cancel),
                Err(RecvTimeoutError::Timeout) => {
                    debug!(
                        checked = checked.load(Ordering::Relaxed),
                        pending = self.slots.pending(),
                        elapsed = ?self.started.elapsed(),
                        "search in progress"
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let missing = self.slots.fail_missing("exited without reporting");
                    error!(missing, "workers exited without reporting; treating them as exhausted");
                }
            }
        }
        if self.phase == Phase::Running {
            self.advance(Phase::AllExhausted);
        }
    }

    fn observe(&mut self, signal: WorkerSignal, cancel: &AtomicBool) {
        let worker = signal.worker_id;
        trace!(worker, outcome = ?signal.outcome, "worker signal");
        match &signal.outcome {
            WorkerOutcome::Found(candidate) if self.found.is_none() => {
                debug_assert_eq!(self.mode, Mode::FirstMatch);
                self.found = Some((worker, candidate.clone()));
                cancel.store(true, Ordering::Relaxed);
                info!(worker, "labeling found; cancelling remaining workers");
                self.advance(Phase::Found);
            }
            WorkerOutcome::Found(_) => {
                debug!(worker, "additional labeling ignored");
            }
            WorkerOutcome::Failed(reason) => {
                error!(worker, %reason, "worker failed; treating its partition as exhausted");
            }
            WorkerOutcome::Exhausted { .. } | WorkerOutcome::Cancelled => {}
        }
        if !self.slots.record(signal) {
            warn!(worker, "duplicate signal ignored");
        }
    }

    fn finish(mut self, candidates_checked: u64) -> RunReport {
        let report = RunReport {
            found: self.found.take(),
            matches_per_worker: self.slots.matches_per_worker(),
            failed_workers: self.slots.failed(),
            candidates_checked,
            elapsed: self.started.elapsed(),
        };
        self.advance(Phase::Done);
        report
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportError, MemoryExporter};
    use crate::graph::SimpleGraph;
    use crate::labels::label_space;
    use crate::validate::is_valid;
    use itertools::Itertools;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;
    use rstest::rstest;
    use std::collections::HashSet;

    fn fast_config(num_workers: usize) -> SearchConfig {
        SearchConfig::default()
            .with_workers(num_workers)
            .with_poll_interval(Duration::from_millis(10))
    }

    fn scalar_labels(raw: &[u32]) -> Vec<Label> {
        raw.iter().map(|&x| Label::from([x])).collect()
    }

    /// Single-threaded ground truth, built straight from permutations.
    fn brute_force<G: LabelGraph>(graph: &G, pool: &[Label], moduli: &Moduli) -> Vec<Vec<Label>> {
        let n = graph.vertex_count();
        let mut out = Vec::new();
        if graph.is_tree() {
            for prefix in pool.iter().permutations(n - 1) {
                for last in pool {
                    let assignment: Vec<Label> =
                        prefix.iter().map(|&l| l.clone()).chain([last.clone()]).collect();
                    if is_valid(graph, &assignment, moduli) {
                        out.push(assignment);
                    }
                }
            }
        } else {
            for perm in pool.iter().permutations(n) {
                let assignment: Vec<Label> = perm.into_iter().cloned().collect();
                if is_valid(graph, &assignment, moduli) {
                    out.push(assignment);
                }
            }
        }
        out.sort();
        out
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = SearchConfig::default();
        assert!(cfg.num_workers >= 1);
        assert_eq!(cfg.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(default_worker_count() >= 1);
    }

    #[test]
    fn phase_transitions() {
        assert!(Phase::Spawning.can_advance_to(Phase::Running));
        assert!(Phase::Running.can_advance_to(Phase::Found));
        assert!(Phase::Running.can_advance_to(Phase::AllExhausted));
        assert!(Phase::Found.can_advance_to(Phase::Collected));
        assert!(Phase::Collected.can_advance_to(Phase::Done));
        assert!(!Phase::Found.can_advance_to(Phase::AllExhausted));
        assert!(!Phase::Spawning.can_advance_to(Phase::Done));
    }

    #[test]
    fn outcome_slots_ignore_duplicates_and_fill_missing() {
        let mut slots = OutcomeSlots::new(3);
        assert!(slots.record(WorkerSignal {
            worker_id: 1,
            outcome: WorkerOutcome::Exhausted { matches: 2 },
        }));
        assert!(!slots.record(WorkerSignal {
            worker_id: 1,
            outcome: WorkerOutcome::Cancelled,
        }));
        assert_eq!(slots.pending(), 2);
        assert_eq!(slots.fail_missing("gone"), 2);
        assert!(slots.is_complete());
        assert_eq!(slots.failed(), 2);
        assert_eq!(slots.matches_per_worker(), vec![0, 2, 0]);
    }

    #[test]
    fn tally_flushes_on_drop() {
        let shared = AtomicU64::new(0);
        {
            let mut tally = Tally::new(&shared);
            for _ in 0..(TALLY_FLUSH_EVERY + 5) {
                tally.bump();
            }
            assert_eq!(shared.load(Ordering::Relaxed), TALLY_FLUSH_EVERY);
        }
        assert_eq!(shared.load(Ordering::Relaxed), TALLY_FLUSH_EVERY + 5);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(8)]
    fn triangle_over_klein_group_has_a_labeling(#[case] workers: usize) {
        let graph = SimpleGraph::cycle(3);
        let moduli = Moduli::new([2, 2]).unwrap();
        let pool: Vec<Label> = label_space(&moduli).into_iter().take(3).collect();
        let exporter = MemoryExporter::new();

        let outcome = Searcher::new(fast_config(workers), &exporter)
            .find_one(&graph, &pool, &moduli)
            .unwrap();

        let truth = brute_force(&graph, &pool, &moduli);
        assert!(!truth.is_empty());
        let labeling = outcome.labeling().expect("a labeling exists");
        assert!(is_valid(&graph, &labeling.assignment, &moduli));
        assert!(truth.contains(&labeling.assignment));
        let edge_set: HashSet<Label> = labeling
            .edge_labels(&graph, &moduli)
            .into_iter()
            .map(|(_, l)| l)
            .collect();
        assert_eq!(edge_set.len(), 3);

        let exported = exporter.labelings();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].destination.as_deref(), Some(FOUND_LABELING_NAME));
        assert_eq!(exported[0].assignment, labeling.assignment);
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    fn even_cycle_over_z4_reports_not_found(#[case] workers: usize) {
        let graph = SimpleGraph::cycle(4);
        let moduli = Moduli::new([4]).unwrap();
        let pool = label_space(&moduli);
        assert!(brute_force(&graph, &pool, &moduli).is_empty());

        let exporter = MemoryExporter::new();
        let outcome = Searcher::new(fast_config(workers), &exporter)
            .find_one(&graph, &pool, &moduli)
            .unwrap();
        assert_eq!(outcome, SearchOutcome::NotFound);
        assert_eq!(exporter.not_found_count(), 1);
        assert!(exporter.labelings().is_empty());
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(7)]
    fn star_enumeration_matches_brute_force(#[case] workers: usize) {
        let graph = SimpleGraph::star(3);
        let moduli = Moduli::new([3]).unwrap();
        let pool = scalar_labels(&[0, 1, 2]);
        let exporter = MemoryExporter::new();

        let summary = Searcher::new(fast_config(workers), &exporter)
            .find_all(&graph, &pool, &moduli)
            .unwrap();

        let mut found: Vec<Vec<Label>> =
            exporter.labelings().into_iter().map(|l| l.assignment).collect();
        found.sort();
        let truth = brute_force(&graph, &pool, &moduli);
        // Leaves must be pairwise distinct, so the last leaf repeats the center.
        assert_eq!(truth.len(), 6);
        assert_eq!(found, truth);
        assert_eq!(summary.matches, 6);
        assert_eq!(summary.matches_per_worker.len(), workers);
        assert_eq!(summary.failed_workers, 0);
        assert_eq!(summary.candidates_checked, 18);
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    fn cycle_enumeration_matches_brute_force(#[case] workers: usize) {
        let graph = SimpleGraph::cycle(5);
        let moduli = Moduli::new([5]).unwrap();
        let pool = label_space(&moduli);
        let exporter = MemoryExporter::new();

        let summary = Searcher::new(fast_config(workers), &exporter)
            .find_all(&graph, &pool, &moduli)
            .unwrap();

        let mut found: Vec<Vec<Label>> =
            exporter.labelings().into_iter().map(|l| l.assignment).collect();
        found.sort();
        let truth = brute_force(&graph, &pool, &moduli);
        assert!(!truth.is_empty());
        assert_eq!(found, truth);
        assert_eq!(summary.matches, truth.len());
        assert_eq!(summary.candidates_checked, 120);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    fn seeded_small_graphs_match_brute_force(#[case] workers: usize) {
        let mut rng = XorShiftRng::seed_from_u64(0xC0FFEE);
        let mut graphs: Vec<SimpleGraph> = (0..8)
            .map(|i| SimpleGraph::random_tree(2 + i % 4, &mut rng))
            .collect();
        graphs.extend((3..=5).map(SimpleGraph::cycle));

        for graph in &graphs {
            let e = graph.edge_count();
            let half = u32::try_from(e.div_ceil(2)).unwrap();
            let full = u32::try_from(e).unwrap();
            for moduli in [Moduli::new([full]).unwrap(), Moduli::new([2, half]).unwrap()] {
                let pool: Vec<Label> = label_space(&moduli).into_iter().take(e).collect();
                let truth = brute_force(graph, &pool, &moduli);

                let exporter = MemoryExporter::new();
                let summary = Searcher::new(fast_config(workers), &exporter)
                    .find_all(graph, &pool, &moduli)
                    .unwrap();
                let mut found: Vec<Vec<Label>> =
                    exporter.labelings().into_iter().map(|l| l.assignment).collect();
                found.sort();
                assert_eq!(found, truth, "{} over {moduli}", graph.name());
                assert_eq!(summary.matches, truth.len());
                assert_eq!(summary.failed_workers, 0);

                let outcome = Searcher::new(fast_config(workers), &NullExporter)
                    .find_one(graph, &pool, &moduli)
                    .unwrap();
                match outcome.labeling() {
                    Some(labeling) => assert!(truth.contains(&labeling.assignment)),
                    None => {
                        assert!(truth.is_empty(), "{} over {moduli}", graph.name());
                        assert_eq!(outcome, SearchOutcome::NotFound);
                    }
                }
            }
        }
    }

    #[test]
    fn exhaustive_destinations_are_unique_per_worker_and_match() {
        let graph = SimpleGraph::star(3);
        let moduli = Moduli::new([3]).unwrap();
        let pool = scalar_labels(&[0, 1, 2]);
        let exporter = MemoryExporter::new();
        let summary = Searcher::new(fast_config(2), &exporter)
            .find_all(&graph, &pool, &moduli)
            .unwrap();

        let names: Vec<String> = exporter
            .labelings()
            .into_iter()
            .filter_map(|l| l.destination)
            .collect();
        let distinct: HashSet<&String> = names.iter().collect();
        assert_eq!(distinct.len(), names.len());
        for (worker, &count) in summary.matches_per_worker.iter().enumerate() {
            for seq in 1..=count {
                assert!(names.contains(&format!("Worker-{worker}_Labeling-{seq}")));
            }
        }
    }

    #[rstest]
    #[case(SimpleGraph::cycle(3), 2)]
    #[case(SimpleGraph::cycle(3), 4)]
    #[case(SimpleGraph::star(3), 4)]
    #[case(SimpleGraph::path(1), 1)]
    fn label_count_mismatch_fails_before_spawning(#[case] graph: SimpleGraph, #[case] pool_size: usize) {
        let moduli = Moduli::new([5]).unwrap();
        let pool: Vec<Label> = label_space(&moduli).into_iter().take(pool_size).collect();
        let exporter = MemoryExporter::new();
        let searcher = Searcher::new(fast_config(2), &exporter);

        let err = searcher.find_one(&graph, &pool, &moduli).unwrap_err();
        assert!(matches!(err, SearchError::LabelCountMismatch { .. }));
        let err = searcher.find_all(&graph, &pool, &moduli).unwrap_err();
        assert!(matches!(err, SearchError::LabelCountMismatch { .. }));
        assert!(exporter.labelings().is_empty());
        assert_eq!(exporter.not_found_count(), 0);
    }

    #[test]
    fn invalid_pool_label_is_rejected() {
        let graph = SimpleGraph::cycle(3);
        let moduli = Moduli::new([2, 2]).unwrap();
        let pool = vec![Label::from([0, 0]), Label::from([0, 2]), Label::from([1, 1])];
        let err = find_one(&graph, &pool, &moduli).unwrap_err();
        assert!(matches!(err, SearchError::InvalidLabel { index: 1, .. }));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let graph = SimpleGraph::cycle(3);
        let moduli = Moduli::new([3]).unwrap();
        let pool = label_space(&moduli);
        let err = Searcher::new(fast_config(0), &NullExporter)
            .find_one(&graph, &pool, &moduli)
            .unwrap_err();
        assert!(matches!(err, SearchError::NoWorkers));
    }

    #[test]
    fn cancellation_stops_workers_with_huge_partitions() {
        // P14 over Z13: the very first candidate 0,1,...,12,0 is valid (edge
        // sums 2i+1 cover Z13 minus 12, and 12+0 closes it). The stream holds
        // 13! * 13 candidates, so the call only returns if the other workers
        // are cancelled.
        let graph = SimpleGraph::path(14);
        let moduli = Moduli::new([13]).unwrap();
        let pool = label_space(&moduli);
        let started = Instant::now();

        let outcome = Searcher::new(fast_config(4), &NullExporter)
            .find_one(&graph, &pool, &moduli)
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(60));
        let labeling = outcome.labeling().expect("a labeling exists");
        assert!(is_valid(&graph, &labeling.assignment, &moduli));
    }

    /// A path whose edge list panics when read off the calling thread.
    struct PanickyGraph {
        inner: SimpleGraph,
        owner: std::thread::ThreadId,
    }

    impl LabelGraph for PanickyGraph {
        fn vertex_count(&self) -> usize {
            self.inner.vertex_count()
        }
        fn edges(&self) -> &[(usize, usize)] {
            assert_eq!(std::thread::current().id(), self.owner, "edge list unavailable");
            self.inner.edges()
        }
        fn is_tree(&self) -> bool {
            self.inner.is_tree()
        }
    }

    #[test]
    fn panicking_workers_make_first_match_incomplete() {
        let graph = PanickyGraph {
            inner: SimpleGraph::path(4),
            owner: std::thread::current().id(),
        };
        let moduli = Moduli::new([3]).unwrap();
        let pool = label_space(&moduli);
        assert!(!brute_force(&graph.inner, &pool, &moduli).is_empty());

        let exporter = MemoryExporter::new();
        let outcome = Searcher::new(fast_config(3), &exporter)
            .find_one(&graph, &pool, &moduli)
            .unwrap();
        assert_eq!(outcome, SearchOutcome::Incomplete { failed_workers: 3 });
        assert!(!outcome.is_found());
        assert!(outcome.labeling().is_none());
        assert_eq!(exporter.not_found_count(), 0);
        assert!(exporter.labelings().is_empty());
    }

    struct FailingExporter;

    impl Exporter for FailingExporter {
        fn export_labeling(
            &self,
            _graph: &dyn LabelGraph,
            _assignment: &[Label],
            _moduli: &Moduli,
            _destination: Option<&str>,
        ) -> Result<(), ExportError> {
            panic!("exporter exploded");
        }
    }

    #[test]
    fn panicking_exporter_marks_workers_failed() {
        let graph = SimpleGraph::star(3);
        let moduli = Moduli::new([3]).unwrap();
        let pool = label_space(&moduli);
        let summary = Searcher::new(fast_config(2), &FailingExporter)
            .find_all(&graph, &pool, &moduli)
            .unwrap();
        // Every worker owns at least one valid labeling here, so each one hits
        // the exporter and fails.
        assert_eq!(summary.failed_workers, 2);
        assert_eq!(summary.matches, 0);
    }

    #[test]
    fn panic_message_extracts_strings() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(&*payload), "worker panicked");
    }
}

//! Command-line driver for the gamma-harmonious labeling search.
//!
//! Builds a graph from a named family or an adjacency-matrix file, takes the
//! first `e` labels of the label space as the pool, and runs either a
//! first-match or an exhaustive search.

use clap::{ArgGroup, Parser};
use gamma_search::export::{Exporter, FileExporter, NullExporter};
use gamma_search::graph::{LabelGraph, SimpleGraph, MAX_VERTICES};
use gamma_search::labels::{iter_label_space, Label, Moduli};
use gamma_search::search::{SearchConfig, SearchOutcome, Searcher};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Gamma-harmonious labeling search
#[derive(Parser, Debug)]
#[command(name = "gamma-search")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("graph_source")
        .required(true)
        .args(["cycle", "path", "star", "complete", "random_tree", "graph"])
))]
struct Args {
    /// Cycle on N vertices
    #[arg(long, value_name = "N")]
    cycle: Option<usize>,

    /// Path on N vertices
    #[arg(long, value_name = "N")]
    path: Option<usize>,

    /// Star with N leaves
    #[arg(long, value_name = "N")]
    star: Option<usize>,

    /// Complete graph on N vertices
    #[arg(long, value_name = "N")]
    complete: Option<usize>,

    /// Random recursive tree on N vertices
    #[arg(long, value_name = "N")]
    random_tree: Option<usize>,

    /// Seed for --random-tree
    #[arg(long, requires = "random_tree")]
    seed: Option<u64>,

    /// Adjacency-matrix file ('0'/'1' rows)
    #[arg(short = 'g', long, value_name = "FILE")]
    graph: Option<PathBuf>,

    /// Moduli of the label group, comma separated
    #[arg(short = 'm', long, value_delimiter = ',', default_value = "3,3")]
    moduli: Vec<u32>,

    /// Enumerate every labeling instead of stopping at the first
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Number of workers (default: available parallelism minus one, at least 1)
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Coordinator poll interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    poll_ms: u64,

    /// Directory for labeling files (nothing is written without it)
    #[arg(short = 'o', long, value_name = "DIR")]
    out: Option<PathBuf>,
}

impl Args {
    fn to_config(&self) -> SearchConfig {
        let config = SearchConfig::default().with_poll_interval(Duration::from_millis(self.poll_ms));
        match self.workers {
            Some(n) => config.with_workers(n),
            None => config,
        }
    }

    fn build_graph(&self) -> Result<SimpleGraph, Box<dyn Error>> {
        let check = |family: &str, n: usize, range: std::ops::RangeInclusive<usize>| {
            if range.contains(&n) {
                Ok(n)
            } else {
                Err(format!(
                    "--{family} takes {}..={}, got {n}",
                    range.start(),
                    range.end()
                ))
            }
        };

        let graph = if let Some(n) = self.cycle {
            SimpleGraph::cycle(check("cycle", n, 3..=MAX_VERTICES)?)
        } else if let Some(n) = self.path {
            SimpleGraph::path(check("path", n, 1..=MAX_VERTICES)?)
        } else if let Some(n) = self.star {
            SimpleGraph::star(check("star", n, 0..=MAX_VERTICES - 1)?)
        } else if let Some(n) = self.complete {
            SimpleGraph::complete(check("complete", n, 1..=MAX_VERTICES)?)
        } else if let Some(n) = self.random_tree {
            let n = check("random-tree", n, 1..=MAX_VERTICES)?;
            let seed = self.seed.unwrap_or_else(rand::random);
            info!(seed, "generating random tree");
            SimpleGraph::random_tree(n, &mut StdRng::seed_from_u64(seed))
        } else if let Some(file) = &self.graph {
            SimpleGraph::load_from_file(file)?
        } else {
            return Err("no graph selected".into());
        };
        Ok(graph)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let graph = args.build_graph()?;
    let moduli = Moduli::new(args.moduli.clone())?;

    let edge_count = graph.edge_count();
    let labels: Vec<Label> = iter_label_space(&moduli).take(edge_count).collect();
    if labels.len() < edge_count {
        return Err(format!(
            "{} has {edge_count} edges but {moduli} has only {} labels",
            graph.name(),
            moduli.space_size()
        )
        .into());
    }

    let file_exporter = args.out.as_ref().map(FileExporter::new).transpose()?;
    let exporter: &dyn Exporter = match &file_exporter {
        Some(exporter) => exporter,
        None => &NullExporter,
    };

    info!(
        graph = %graph.name(),
        moduli = %moduli,
        labels = labels.len(),
        "starting search"
    );
    let searcher = Searcher::new(args.to_config(), exporter);

    if args.all {
        let summary = searcher.find_all(&graph, &labels, &moduli)?;
        println!(
            "{}: {} labeling(s) over {moduli} ({} candidates, {:.2?})",
            graph.name(),
            summary.matches,
            summary.candidates_checked,
            summary.elapsed
        );
        for (worker, count) in summary.matches_per_worker.iter().enumerate() {
            println!("  worker {worker}: {count}");
        }
        if summary.failed_workers > 0 {
            eprintln!("{} worker(s) failed", summary.failed_workers);
        }
        return Ok(());
    }

    match searcher.find_one(&graph, &labels, &moduli)? {
        SearchOutcome::Found(labeling) => {
            println!(
                "{}: labeling found by worker {}",
                graph.name(),
                labeling.worker_id
            );
            for (v, label) in labeling.assignment.iter().enumerate() {
                println!("  {}:{label}", graph.vertex_name(v));
            }
        }
        SearchOutcome::NotFound => {
            println!("{}: no labeling over {moduli}", graph.name());
        }
        SearchOutcome::Incomplete { failed_workers } => {
            return Err(format!(
                "{}: search incomplete, {failed_workers} worker(s) failed before finishing",
                graph.name()
            )
            .into());
        }
    }
    Ok(())
}

//! Batch-parallel scan orchestration.
//!
//! A scan moves through a fixed sequence of phases:
//!
//! ```text
//! INIT -> SCANNING_FILESYSTEM -> (CHECKPOINT_LOADED | FRESH)
//!      -> BATCH_DISPATCH -> BATCH_AGGREGATE (per batch) -> COMPLETE
//! ```
//!
//! Batches run on a dedicated rayon pool. The thread that called
//! [`Orchestrator::run`] is the only one that touches the [`ResultSet`] and
//! the checkpoint file; workers hand finished batches back over a channel.

pub mod batch;
mod orchestrator;
pub mod results;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::checkpoint::CheckpointError;
use crate::collaborators::{publish_results, GenreMatcher, PublishSummary, TrackStore};
use crate::duplicates::{group_duplicates, DuplicateGroup};
use crate::fingerprint::Algorithm;
use crate::scanner::WalkerConfig;

pub use batch::{partition, Batch, BatchOutcome, BatchReport};
pub use orchestrator::{select_files, Orchestrator};
pub use results::ResultSet;

/// Default checkpoint location, relative to the working directory.
pub const DEFAULT_CHECKPOINT_FILE: &str = "trackdupe_checkpoint.json";

/// Worker count used when none is configured: available cores, capped at 8.
#[must_use]
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
        .min(8)
}

/// Everything the orchestrator needs besides the root and the engine.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Algorithms to run, in order. Already resolved against capabilities.
    pub algorithms: Vec<Algorithm>,
    pub batch_size: usize,
    pub worker_count: usize,
    /// Load a matching checkpoint before dispatching.
    pub resume: bool,
    pub checkpoint_path: PathBuf,
    /// Completed batches between checkpoint writes.
    pub checkpoint_interval: usize,
    /// Keep the checkpoint file after a completed scan.
    pub keep_checkpoint: bool,
    pub max_files: Option<usize>,
    /// Random subset size for very large libraries.
    pub sample_size: Option<usize>,
    /// Seed for the subset; drawn at random (and persisted) when `None`.
    pub sample_seed: Option<u64>,
    pub walker: WalkerConfig,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            algorithms: vec![Algorithm::Spectral, Algorithm::ByteHash],
            batch_size: 100,
            worker_count: default_worker_count(),
            resume: true,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
            checkpoint_interval: 5,
            keep_checkpoint: false,
            max_files: None,
            sample_size: None,
            sample_seed: None,
            walker: WalkerConfig::default(),
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.algorithms.is_empty() {
            return Err(OrchestratorError::NoAlgorithms);
        }
        let positive = [
            ("batch_size", Some(self.batch_size)),
            ("worker_count", Some(self.worker_count)),
            ("checkpoint_interval", Some(self.checkpoint_interval)),
            ("max_files", self.max_files),
            ("sample_size", self.sample_size),
        ];
        for (name, value) in positive {
            if value == Some(0) {
                return Err(OrchestratorError::InvalidOption(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

/// Phases of a scan, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Init,
    ScanningFilesystem,
    CheckpointLoaded,
    Fresh,
    BatchDispatch,
    BatchAggregate,
    Complete,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::ScanningFilesystem => "scanning filesystem",
            Self::CheckpointLoaded => "checkpoint loaded",
            Self::Fresh => "fresh start",
            Self::BatchDispatch => "dispatching batches",
            Self::BatchAggregate => "aggregating batches",
            Self::Complete => "complete",
        })
    }
}

/// Scan-fatal errors. Everything per-file or per-batch is data instead.
#[derive(thiserror::Error, Debug)]
pub enum OrchestratorError {
    #[error("No usable fingerprint algorithm selected")]
    NoAlgorithms,

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Invalid scan root: {0}")]
    Root(#[from] crate::scanner::ScanError),

    #[error("Cannot resume from checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: CheckpointError,
    },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Incremental progress after each aggregated batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    /// Files done, including those restored from the checkpoint.
    pub processed: usize,
    pub total: usize,
    /// Files with at least one failed algorithm in this run.
    pub errors: usize,
    pub batches_done: usize,
    pub batches_total: usize,
    /// Files per second in this run.
    pub rate: f64,
    pub eta: Option<Duration>,
}

/// Counters for one invocation of [`Orchestrator::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanCounters {
    pub files_discovered: usize,
    pub walk_errors: usize,
    pub files_selected: usize,
    /// Selected files skipped because the checkpoint already covers them.
    pub files_resumed: usize,
    pub batches_total: usize,
    pub batches_completed: usize,
    pub batches_failed: usize,
    pub batches_skipped: usize,
    /// Files fingerprinted in this run.
    pub files_processed: usize,
    /// Files with at least one failure in this run.
    pub file_errors: usize,
}

/// Final state of a scan, complete or interrupted.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub root: PathBuf,
    pub algorithms: Vec<Algorithm>,
    pub results: ResultSet,
    pub counters: ScanCounters,
    pub resumed: bool,
    pub interrupted: bool,
    pub elapsed: Duration,
    /// Checkpoint file left on disk, if any.
    pub checkpoint: Option<PathBuf>,
}

impl ScanOutcome {
    /// Failed (file, algorithm) results across the whole result set.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    /// Distinct files with at least one failed algorithm.
    #[must_use]
    pub fn files_with_errors(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| &r.file().path)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Distinct files with at least one result.
    #[must_use]
    pub fn files_fingerprinted(&self) -> usize {
        self.results.iter().map(|r| &r.file().path).collect::<BTreeSet<_>>().len()
    }

    /// Ranked duplicate groups per algorithm, ordered by fingerprint.
    #[must_use]
    pub fn duplicate_groups(&self) -> BTreeMap<Algorithm, Vec<DuplicateGroup>> {
        self.algorithms
            .iter()
            .map(|&algorithm| {
                let groups = group_duplicates(self.results.for_algorithm(algorithm), algorithm);
                (algorithm, groups.into_values().collect())
            })
            .collect()
    }

    /// Hand every successful result to an external track store.
    pub fn publish(&self, store: &dyn TrackStore, matcher: &dyn GenreMatcher) -> PublishSummary {
        publish_results(store, matcher, self.results.iter())
    }
}

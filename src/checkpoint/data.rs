//! In-memory scan state that gets persisted as a checkpoint.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CheckpointError;
use crate::fingerprint::{Algorithm, FingerprintResult};
use crate::scan::ResultSet;

/// Current on-disk format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Everything needed to resume a scan.
///
/// The orchestrator owns one of these for the lifetime of a scan and is the
/// only writer. A file is in `processed` only once all of its algorithm
/// results are in `results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    pub version: u32,
    /// Canonical scan root.
    pub root: PathBuf,
    pub algorithms: Vec<Algorithm>,
    /// Seed used to draw the sample, so a resume draws the same subset.
    #[serde(default)]
    pub sample_seed: Option<u64>,
    pub processed: BTreeSet<PathBuf>,
    pub results: ResultSet,
    pub processed_count: usize,
    pub error_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl ScanCheckpoint {
    #[must_use]
    pub fn new(root: PathBuf, algorithms: Vec<Algorithm>, sample_seed: Option<u64>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            root,
            algorithms,
            sample_seed,
            processed: BTreeSet::new(),
            results: ResultSet::new(),
            processed_count: 0,
            error_count: 0,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed.contains(path)
    }

    /// Record the results of a completed batch and mark its files processed.
    /// Returns the number of files with at least one failure.
    pub fn record_completed<'a>(
        &mut self,
        files: impl IntoIterator<Item = &'a Path>,
        results: Vec<FingerprintResult>,
    ) -> usize {
        let mut failed: BTreeSet<PathBuf> = BTreeSet::new();
        for result in results {
            if !result.is_success() {
                failed.insert(result.file().path.clone());
            }
            self.results.insert(result);
        }
        for path in files {
            self.processed.insert(path.to_path_buf());
        }
        self.processed_count = self.processed.len();
        self.error_count += failed.len();
        self.touch();
        failed.len()
    }

    /// Record failure results of a batch that died. Its files stay
    /// unprocessed so a resumed scan retries them.
    pub fn record_failed(&mut self, results: Vec<FingerprintResult>, file_count: usize) {
        self.results.extend(results);
        self.error_count += file_count;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Reject a checkpoint taken for another root or another algorithm list.
    pub fn ensure_compatible(&self, root: &Path, algorithms: &[Algorithm]) -> Result<(), CheckpointError> {
        if self.root != root {
            return Err(CheckpointError::RootMismatch {
                expected: root.to_path_buf(),
                found: self.root.clone(),
            });
        }
        if self.algorithms != algorithms {
            return Err(CheckpointError::AlgorithmMismatch {
                expected: join(algorithms),
                found: join(&self.algorithms),
            });
        }
        Ok(())
    }
}

fn join(algorithms: &[Algorithm]) -> String {
    algorithms
        .iter()
        .map(|a| a.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

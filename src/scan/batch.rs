//! Batches: the unit of dispatch, checkpointing and failure isolation.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::fingerprint::{panic_message, Algorithm, FailureKind, FingerprintEngine, FingerprintResult};
use crate::scanner::FileRecord;

/// A slice of the file list processed by one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub index: usize,
    pub files: Vec<FileRecord>,
}

/// What happened to a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// One result per file and algorithm.
    Completed(Vec<FingerprintResult>),
    /// The batch died outside the per-file error boundary.
    Failed(String),
    /// Not started because shutdown was requested.
    Skipped,
}

/// A batch handed back to the aggregating thread.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub index: usize,
    pub files: Vec<FileRecord>,
    pub outcome: BatchOutcome,
    pub elapsed: Duration,
}

impl BatchReport {
    #[must_use]
    pub fn skipped(batch: Batch) -> Self {
        Self {
            index: batch.index,
            files: batch.files,
            outcome: BatchOutcome::Skipped,
            elapsed: Duration::ZERO,
        }
    }

    /// Failure results for every file and algorithm of a failed batch.
    #[must_use]
    pub fn failure_results(&self, algorithms: &[Algorithm]) -> Vec<FingerprintResult> {
        let BatchOutcome::Failed(message) = &self.outcome else {
            return Vec::new();
        };
        self.files
            .iter()
            .flat_map(|file| {
                algorithms.iter().map(move |&algorithm| {
                    FingerprintResult::failure(
                        file.clone(),
                        algorithm,
                        FailureKind::BatchFailed,
                        format!("batch {} failed: {message}", self.index),
                        Duration::ZERO,
                    )
                })
            })
            .collect()
    }
}

/// Split `files` into batches of at most `batch_size`, preserving order.
#[must_use]
pub fn partition(files: Vec<FileRecord>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(files.len().div_ceil(batch_size));
    let mut files = files.into_iter().peekable();
    let mut index = 0;
    while files.peek().is_some() {
        batches.push(Batch {
            index,
            files: files.by_ref().take(batch_size).collect(),
        });
        index += 1;
    }
    batches
}

/// Run every algorithm on every file of `batch`, sequentially.
///
/// A panic escaping the engine fails the whole batch instead of the worker.
pub fn run_batch(batch: Batch, engine: &dyn FingerprintEngine, algorithms: &[Algorithm]) -> BatchReport {
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut results = Vec::with_capacity(batch.files.len() * algorithms.len());
        for file in &batch.files {
            for &algorithm in algorithms {
                results.push(engine.fingerprint(algorithm, file));
            }
        }
        results
    }));

    let outcome = match outcome {
        Ok(results) => BatchOutcome::Completed(results),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("Batch {} failed: {}", batch.index, message);
            BatchOutcome::Failed(message)
        }
    };

    BatchReport {
        index: batch.index,
        files: batch.files,
        outcome,
        elapsed: started.elapsed(),
    }
}

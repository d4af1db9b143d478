//! The scan state machine.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::batch::{partition, run_batch, BatchOutcome, BatchReport};
use super::{BatchProgress, OrchestratorError, ScanCounters, ScanOptions, ScanOutcome, ScanPhase};
use crate::checkpoint::ScanCheckpoint;
use crate::fingerprint::{Algorithm, FingerprintEngine};
use crate::progress::ProgressCallback;
use crate::scanner::path_utils::validate_root;
use crate::scanner::{FileRecord, Walker};

/// Runs a scan: walk, select, resume, dispatch batches, aggregate.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use trackdupe::fingerprint::{Capabilities, FingerprintOptions, Fingerprinter};
/// use trackdupe::scan::{Orchestrator, ScanOptions};
///
/// let engine = Arc::new(Fingerprinter::new(FingerprintOptions::default(), Capabilities::detect()));
/// let outcome = Orchestrator::new(ScanOptions::default(), engine).run(Path::new("/music"))?;
/// println!("{} results", outcome.results.len());
/// # Ok::<(), trackdupe::scan::OrchestratorError>(())
/// ```
pub struct Orchestrator {
    options: ScanOptions,
    engine: Arc<dyn FingerprintEngine>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(options: ScanOptions, engine: Arc<dyn FingerprintEngine>) -> Self {
        Self {
            options,
            engine,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    #[must_use]
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn enter(&self, phase: ScanPhase, total: usize) {
        log::debug!("Scan phase: {phase}");
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(phase, total);
        }
    }

    fn leave(&self, phase: ScanPhase) {
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(phase);
        }
    }

    /// Run a scan of `root`.
    ///
    /// Per-file and per-batch failures end up in the returned result set;
    /// only problems that make the scan meaningless are errors.
    pub fn run(&self, root: &Path) -> Result<ScanOutcome, OrchestratorError> {
        let started = Instant::now();
        self.enter(ScanPhase::Init, 0);
        self.options.validate()?;
        let root = validate_root(root)?;
        let algorithms = self.options.algorithms.clone();
        log::info!(
            "Starting scan of {} with [{}]",
            root.display(),
            algorithms.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(", ")
        );
        self.leave(ScanPhase::Init);

        let mut counters = ScanCounters::default();
        let discovered = self.discover(&root, &mut counters);

        let (mut checkpoint, resumed) = self.load_or_start(&root)?;

        if self.is_shutdown_requested() {
            log::warn!("Scan interrupted before fingerprinting started");
            return Ok(self.outcome(root, checkpoint, counters, resumed, true, started));
        }

        let seed = self.sample_seed(&checkpoint);
        checkpoint.sample_seed = seed;
        let selected = select_files(discovered, self.options.max_files, self.options.sample_size, seed);
        counters.files_selected = selected.len();

        let pending: Vec<FileRecord> = selected
            .into_iter()
            .filter(|file| !checkpoint.is_processed(&file.path))
            .collect();
        counters.files_resumed = counters.files_selected - pending.len();
        if counters.files_resumed > 0 {
            log::info!(
                "Skipping {} files already processed by the checkpoint",
                counters.files_resumed
            );
        }

        let batches = partition(pending, self.options.batch_size);
        counters.batches_total = batches.len();

        let interrupted = self.dispatch(batches, &mut checkpoint, &mut counters)?;

        self.enter(ScanPhase::Complete, counters.files_selected);
        if interrupted {
            log::warn!(
                "Scan interrupted: {} of {} batches skipped, checkpoint left at its last saved state",
                counters.batches_skipped,
                counters.batches_total
            );
        } else {
            self.finish_checkpoint(&checkpoint);
        }
        log::info!(
            "Scan finished in {:.1}s: {} files processed, {} with errors",
            started.elapsed().as_secs_f64(),
            counters.files_processed,
            counters.file_errors
        );
        self.leave(ScanPhase::Complete);

        Ok(self.outcome(root, checkpoint, counters, resumed, interrupted, started))
    }

    fn discover(&self, root: &Path, counters: &mut ScanCounters) -> Vec<FileRecord> {
        self.enter(ScanPhase::ScanningFilesystem, 0);

        let mut walker = Walker::new(root, self.options.walker.clone());
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }

        let mut files = Vec::new();
        for entry in walker.walk() {
            match entry {
                Ok(file) => {
                    files.push(file);
                    if let Some(ref callback) = self.progress_callback {
                        if let Some(last) = files.last() {
                            callback.on_file_discovered(files.len(), &last.path);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("{e}");
                    counters.walk_errors += 1;
                }
            }
        }

        counters.files_discovered = files.len();
        log::info!(
            "Found {} audio files ({} unreadable entries)",
            files.len(),
            counters.walk_errors
        );
        self.leave(ScanPhase::ScanningFilesystem);
        files
    }

    fn load_or_start(&self, root: &Path) -> Result<(ScanCheckpoint, bool), OrchestratorError> {
        let path = &self.options.checkpoint_path;
        let checkpoint_error = |source| OrchestratorError::Checkpoint {
            path: path.clone(),
            source,
        };

        if self.options.resume {
            if let Some(checkpoint) = ScanCheckpoint::load_if_exists(path).map_err(checkpoint_error)? {
                checkpoint
                    .ensure_compatible(root, &self.options.algorithms)
                    .map_err(checkpoint_error)?;
                self.enter(ScanPhase::CheckpointLoaded, checkpoint.processed_count);
                log::info!(
                    "Resuming from checkpoint: {} files already processed",
                    checkpoint.processed_count
                );
                self.leave(ScanPhase::CheckpointLoaded);
                return Ok((checkpoint, true));
            }
        } else if path.exists() {
            log::info!("Ignoring existing checkpoint {} (resume disabled)", path.display());
        }

        self.enter(ScanPhase::Fresh, 0);
        let checkpoint = ScanCheckpoint::new(root.to_path_buf(), self.options.algorithms.clone(), None);
        self.leave(ScanPhase::Fresh);
        Ok((checkpoint, false))
    }

    /// The seed for sampling: a resumed checkpoint's seed wins so the
    /// subset is the same one the interrupted run was working on.
    fn sample_seed(&self, checkpoint: &ScanCheckpoint) -> Option<u64> {
        self.options.sample_size?;
        match (checkpoint.sample_seed, self.options.sample_seed) {
            (Some(saved), Some(requested)) if saved != requested => {
                log::warn!("Using checkpoint sample seed {saved} instead of {requested}");
                Some(saved)
            }
            (Some(saved), _) => Some(saved),
            (None, Some(requested)) => Some(requested),
            (None, None) => Some(rand::random()),
        }
    }

    /// Run every batch on the worker pool and fold the reports into
    /// `checkpoint`. Returns whether any batch was skipped for shutdown.
    fn dispatch(
        &self,
        batches: Vec<super::Batch>,
        checkpoint: &mut ScanCheckpoint,
        counters: &mut ScanCounters,
    ) -> Result<bool, OrchestratorError> {
        let total_batches = batches.len();
        let remaining_files: usize = batches.iter().map(|b| b.files.len()).sum();
        self.enter(ScanPhase::BatchDispatch, counters.files_selected);
        log::info!(
            "Dispatching {} files in {} batches on {} workers",
            remaining_files,
            total_batches,
            self.options.worker_count
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.worker_count)
            .thread_name(|i| format!("trackdupe-worker-{i}"))
            .panic_handler(|payload| {
                log::error!("Worker panicked: {}", crate::fingerprint::panic_message(payload.as_ref()));
            })
            .build()?;

        let algorithms: Arc<[Algorithm]> = self.options.algorithms.clone().into();
        let (tx, rx) = mpsc::channel::<BatchReport>();
        for batch in batches {
            let tx = tx.clone();
            let engine = Arc::clone(&self.engine);
            let algorithms = Arc::clone(&algorithms);
            let flag = self.shutdown_flag.clone();
            pool.spawn(move || {
                let report = if flag.is_some_and(|f| f.load(Ordering::SeqCst)) {
                    BatchReport::skipped(batch)
                } else {
                    run_batch(batch, engine.as_ref(), &algorithms)
                };
                // The receiver only goes away if aggregation itself failed.
                let _ = tx.send(report);
            });
        }
        drop(tx);

        let dispatch_started = Instant::now();
        let mut done_this_run = 0usize;
        let mut since_save = 0usize;
        self.report_progress(counters, done_this_run, dispatch_started, total_batches);

        for report in rx {
            self.enter(ScanPhase::BatchAggregate, report.files.len());
            let file_count = report.files.len();
            match report.outcome {
                BatchOutcome::Completed(results) => {
                    let errors = checkpoint.record_completed(report.files.iter().map(|f| f.path.as_path()), results);
                    counters.batches_completed += 1;
                    counters.files_processed += file_count;
                    counters.file_errors += errors;
                    log::debug!(
                        "Batch {} done in {:.2}s: {} files, {} with errors",
                        report.index,
                        report.elapsed.as_secs_f64(),
                        file_count,
                        errors
                    );
                }
                BatchOutcome::Failed(_) => {
                    let failures = report.failure_results(&algorithms);
                    checkpoint.record_failed(failures, file_count);
                    counters.batches_failed += 1;
                    counters.file_errors += file_count;
                }
                BatchOutcome::Skipped => {
                    counters.batches_skipped += 1;
                    self.leave(ScanPhase::BatchAggregate);
                    continue;
                }
            }

            done_this_run += file_count;
            since_save += 1;
            if since_save >= self.options.checkpoint_interval {
                since_save = 0;
                self.save_checkpoint(checkpoint);
            }
            self.report_progress(counters, done_this_run, dispatch_started, total_batches);
            self.leave(ScanPhase::BatchAggregate);
        }

        self.leave(ScanPhase::BatchDispatch);
        Ok(counters.batches_skipped > 0)
    }

    fn report_progress(&self, counters: &ScanCounters, done_this_run: usize, since: Instant, batches_total: usize) {
        let processed = counters.files_resumed + done_this_run;
        let elapsed = since.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            done_this_run as f64 / elapsed
        } else {
            0.0
        };
        let remaining = counters.files_selected.saturating_sub(processed);
        let eta = (rate > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / rate));

        let progress = BatchProgress {
            processed,
            total: counters.files_selected,
            errors: counters.file_errors,
            batches_done: counters.batches_completed + counters.batches_failed,
            batches_total,
            rate,
            eta,
        };

        if progress.batches_done > 0 {
            log::info!(
                "Progress: {}/{} files, {} errors, {:.1} files/s, ETA {}",
                progress.processed,
                progress.total,
                progress.errors,
                progress.rate,
                progress.eta.map_or_else(|| "unknown".to_string(), |d| format!("{}s", d.as_secs()))
            );
        }
        if let Some(ref callback) = self.progress_callback {
            callback.on_batch_completed(&progress);
        }
    }

    fn save_checkpoint(&self, checkpoint: &ScanCheckpoint) -> bool {
        match checkpoint.save(&self.options.checkpoint_path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to save checkpoint: {e}");
                false
            }
        }
    }

    fn finish_checkpoint(&self, checkpoint: &ScanCheckpoint) {
        let saved = self.save_checkpoint(checkpoint);
        if saved && !self.options.keep_checkpoint {
            if let Err(e) = ScanCheckpoint::remove(&self.options.checkpoint_path) {
                log::warn!("Failed to remove checkpoint: {e}");
            }
        }
    }

    fn outcome(
        &self,
        root: PathBuf,
        checkpoint: ScanCheckpoint,
        counters: ScanCounters,
        resumed: bool,
        interrupted: bool,
        started: Instant,
    ) -> ScanOutcome {
        let path = &self.options.checkpoint_path;
        ScanOutcome {
            root,
            algorithms: checkpoint.algorithms,
            results: checkpoint.results,
            counters,
            resumed,
            interrupted,
            elapsed: started.elapsed(),
            checkpoint: path.exists().then(|| path.clone()),
        }
    }
}

/// Pick the files to fingerprint, in path order.
///
/// With `sample_size` smaller than the list, a random subset is drawn from
/// an RNG seeded with `seed`, so the same seed always draws the same subset.
/// `max_files` is applied last.
#[must_use]
pub fn select_files(
    mut files: Vec<FileRecord>,
    max_files: Option<usize>,
    sample_size: Option<usize>,
    seed: Option<u64>,
) -> Vec<FileRecord> {
    files.sort_by(|a, b| a.path.cmp(&b.path));

    if let Some(n) = sample_size.filter(|&n| n < files.len()) {
        let mut rng = StdRng::seed_from_u64(seed.unwrap_or_default());
        files = files.choose_multiple(&mut rng, n).cloned().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        log::info!("Sampled {n} files (seed {})", seed.unwrap_or_default());
    }

    if let Some(max) = max_files {
        files.truncate(max);
    }
    files
}

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::tempdir;
use trackdupe::checkpoint::ScanCheckpoint;
use trackdupe::fingerprint::{Algorithm, FailureKind, FingerprintEngine, FingerprintResult};
use trackdupe::report::ScanReport;
use trackdupe::scan::{Orchestrator, ScanOptions};
use trackdupe::scanner::FileRecord;

use super::common::{byte_options, engine, write_file};

/// Raises the shutdown flag once `limit` files have been fingerprinted.
struct InterruptAfter {
    inner: Arc<dyn FingerprintEngine>,
    calls: AtomicUsize,
    limit: usize,
    flag: Arc<AtomicBool>,
}

impl FingerprintEngine for InterruptAfter {
    fn fingerprint(&self, algorithm: Algorithm, file: &FileRecord) -> FingerprintResult {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.flag.store(true, Ordering::SeqCst);
        }
        self.inner.fingerprint(algorithm, file)
    }
}

fn sequential_options(state: &std::path::Path) -> ScanOptions {
    ScanOptions {
        worker_count: 1,
        ..byte_options(state)
    }
}

fn populate(dir: &std::path::Path) {
    for i in 0..10 {
        let content = format!("track contents {}", i / 2);
        write_file(dir, &format!("{i:02}.mp3"), content.as_bytes());
    }
}

#[test]
fn test_interrupted_scan_resumes_to_the_same_report() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    populate(music.path());
    let options = sequential_options(state.path());
    let checkpoint_path = options.checkpoint_path.clone();

    let flag = Arc::new(AtomicBool::new(false));
    let interrupting = Arc::new(InterruptAfter {
        inner: engine(),
        calls: AtomicUsize::new(0),
        limit: 4,
        flag: Arc::clone(&flag),
    });
    let first = Orchestrator::new(options.clone(), interrupting)
        .with_shutdown_flag(Arc::clone(&flag))
        .run(music.path())
        .unwrap();

    assert!(first.interrupted);
    assert_eq!(first.counters.batches_completed, 2);
    assert_eq!(first.counters.batches_skipped, 3);
    assert_eq!(first.checkpoint.as_deref(), Some(checkpoint_path.as_path()));

    let saved = ScanCheckpoint::load(&checkpoint_path).unwrap();
    assert_eq!(saved.processed.len(), 4);
    assert_eq!(saved.results.len(), 4);

    let resumed = Orchestrator::new(options, engine())
        .with_shutdown_flag(Arc::new(AtomicBool::new(false)))
        .run(music.path())
        .unwrap();
    assert!(resumed.resumed);
    assert!(!resumed.interrupted);
    assert_eq!(resumed.counters.files_resumed, 4);
    assert_eq!(resumed.counters.files_processed, 6);
    assert!(!checkpoint_path.exists());

    let fresh_state = tempdir().unwrap();
    let fresh = Orchestrator::new(sequential_options(fresh_state.path()), engine())
        .run(music.path())
        .unwrap();

    assert_eq!(resumed.duplicate_groups(), fresh.duplicate_groups());
    assert_eq!(resumed.duplicate_groups()[&Algorithm::ByteHash].len(), 5);

    let resumed_report = ScanReport::build(&resumed, &resumed.duplicate_groups(), None);
    let fresh_report = ScanReport::build(&fresh, &fresh.duplicate_groups(), None);
    assert_eq!(
        serde_json::to_value(&resumed_report.duplicates).unwrap(),
        serde_json::to_value(&fresh_report.duplicates).unwrap()
    );
    assert_eq!(resumed_report.overall.files_processed, fresh_report.overall.files_processed);
    assert_eq!(resumed_report.overall.total_errors, fresh_report.overall.total_errors);
}

#[test]
fn test_shutdown_before_dispatch_keeps_existing_checkpoint() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    populate(music.path());
    let options = ScanOptions {
        keep_checkpoint: true,
        ..sequential_options(state.path())
    };

    Orchestrator::new(options.clone(), engine()).run(music.path()).unwrap();
    let before = std::fs::read_to_string(&options.checkpoint_path).unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    let outcome = Orchestrator::new(options.clone(), engine())
        .with_shutdown_flag(flag)
        .run(music.path())
        .unwrap();

    assert!(outcome.interrupted);
    assert_eq!(std::fs::read_to_string(&options.checkpoint_path).unwrap(), before);
}

#[test]
fn test_no_resume_starts_over() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    populate(music.path());
    let options = ScanOptions {
        keep_checkpoint: true,
        ..sequential_options(state.path())
    };
    Orchestrator::new(options.clone(), engine()).run(music.path()).unwrap();

    let again = Orchestrator::new(
        ScanOptions {
            resume: false,
            ..options.clone()
        },
        engine(),
    )
    .run(music.path())
    .unwrap();
    assert!(!again.resumed);
    assert_eq!(again.counters.files_resumed, 0);
    assert_eq!(again.counters.files_processed, 10);

    let resumed = Orchestrator::new(options, engine()).run(music.path()).unwrap();
    assert!(resumed.resumed);
    assert_eq!(resumed.counters.files_resumed, 10);
    assert_eq!(resumed.counters.files_processed, 0);
}

#[test]
fn test_sample_seed_is_persisted_for_resume() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    populate(music.path());
    let options = ScanOptions {
        sample_size: Some(6),
        keep_checkpoint: true,
        ..sequential_options(state.path())
    };

    let first = Orchestrator::new(options.clone(), engine()).run(music.path()).unwrap();
    let saved = ScanCheckpoint::load(&options.checkpoint_path).unwrap();
    assert!(saved.sample_seed.is_some());
    assert_eq!(first.counters.files_selected, 6);

    // Resuming draws the same subset, so nothing new needs fingerprinting.
    let resumed = Orchestrator::new(options, engine()).run(music.path()).unwrap();
    assert_eq!(resumed.counters.files_resumed, 6);
    assert_eq!(resumed.counters.files_processed, 0);
}

/// Panics outside the per-file boundary whenever it sees `poison`.
struct PanicsOn {
    inner: Arc<dyn FingerprintEngine>,
    poison: &'static str,
}

impl FingerprintEngine for PanicsOn {
    fn fingerprint(&self, algorithm: Algorithm, file: &FileRecord) -> FingerprintResult {
        if file.path.ends_with(self.poison) {
            panic!("worker crashed on {}", file.path.display());
        }
        self.inner.fingerprint(algorithm, file)
    }
}

/// Counts the files it is asked to fingerprint.
struct Counting {
    inner: Arc<dyn FingerprintEngine>,
    seen: std::sync::Mutex<Vec<std::path::PathBuf>>,
}

impl FingerprintEngine for Counting {
    fn fingerprint(&self, algorithm: Algorithm, file: &FileRecord) -> FingerprintResult {
        self.seen.lock().unwrap().push(file.path.clone());
        self.inner.fingerprint(algorithm, file)
    }
}

#[test]
fn test_failed_batch_is_isolated_and_retried_on_resume() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    for i in 0..6 {
        write_file(music.path(), &format!("{i}.mp3"), format!("pair {}", i / 2).as_bytes());
    }
    let options = ScanOptions {
        keep_checkpoint: true,
        ..byte_options(state.path())
    };

    let crashing = Arc::new(PanicsOn {
        inner: engine(),
        poison: "2.mp3",
    });
    let first = Orchestrator::new(options.clone(), crashing).run(music.path()).unwrap();

    assert!(!first.interrupted);
    assert_eq!(first.counters.batches_total, 3);
    assert_eq!(first.counters.batches_failed, 1);
    assert_eq!(first.counters.batches_completed, 2);
    assert_eq!(first.counters.file_errors, 2);
    assert_eq!(first.counters.files_processed, 4);

    let failed: Vec<_> = first
        .results
        .for_algorithm(Algorithm::ByteHash)
        .filter(|r| !r.is_success())
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed
        .iter()
        .all(|r| r.failure_kind() == Some(FailureKind::BatchFailed) && r.fingerprint().is_empty()));
    let mut failed_names: Vec<_> = failed.iter().map(|r| r.file().file_name()).collect();
    failed_names.sort();
    assert_eq!(failed_names, vec!["2.mp3", "3.mp3"]);

    // The other batches still completed and grouped.
    assert_eq!(first.duplicate_groups()[&Algorithm::ByteHash].len(), 2);

    let saved = ScanCheckpoint::load(&options.checkpoint_path).unwrap();
    assert_eq!(saved.processed.len(), 4);
    assert!(!saved.is_processed(&music.path().canonicalize().unwrap().join("2.mp3")));

    let counting = Arc::new(Counting {
        inner: engine(),
        seen: std::sync::Mutex::new(Vec::new()),
    });
    let resumed = Orchestrator::new(options, Arc::clone(&counting) as Arc<dyn FingerprintEngine>)
        .run(music.path())
        .unwrap();

    assert!(resumed.resumed);
    assert_eq!(resumed.counters.files_resumed, 4);
    assert_eq!(resumed.counters.files_processed, 2);
    assert_eq!(resumed.counters.batches_failed, 0);
    let mut retried: Vec<String> = counting
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    retried.sort();
    assert_eq!(retried, vec!["2.mp3", "3.mp3"]);

    assert!(resumed.results.for_algorithm(Algorithm::ByteHash).all(|r| r.is_success()));
    assert_eq!(resumed.duplicate_groups()[&Algorithm::ByteHash].len(), 3);
}

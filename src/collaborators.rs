//! Narrow interfaces to components that live outside this crate.
//!
//! A track store persists results keyed by content hash and a genre
//! matcher labels a path. Only the operations below are used; hosts plug in
//! their own database or classifier. [`MemoryTrackStore`] backs tests and
//! single-process use.
//!
//! This is library-facing API: the `trackdupe` binary writes its report and
//! never publishes. Embedding code publishes a finished scan with
//! [`ScanOutcome::publish`](crate::scan::ScanOutcome::publish).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::fingerprint::{Algorithm, FingerprintResult};

/// One published track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Fingerprint value, the store key.
    pub hash: String,
    pub algorithm: Algorithm,
    pub path: PathBuf,
    pub size: u64,
    pub duration_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Track store unavailable: {0}")]
    Unavailable(String),

    #[error("Track store rejected {hash}: {reason}")]
    Rejected { hash: String, reason: String },
}

/// Key-value persistence for tracks, keyed by hash.
pub trait TrackStore: Send + Sync {
    /// Insert or replace the record stored under `record.hash`.
    fn insert(&self, record: TrackRecord) -> Result<(), StoreError>;

    fn get_by_hash(&self, hash: &str) -> Result<Option<TrackRecord>, StoreError>;
}

/// Maps a file path to a genre label.
pub trait GenreMatcher: Send + Sync {
    fn classify(&self, path: &Path) -> Option<String>;
}

/// Matcher that never labels anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGenre;

impl GenreMatcher for NoGenre {
    fn classify(&self, _path: &Path) -> Option<String> {
        None
    }
}

impl<F> GenreMatcher for F
where
    F: Fn(&Path) -> Option<String> + Send + Sync,
{
    fn classify(&self, path: &Path) -> Option<String> {
        self(path)
    }
}

/// In-process [`TrackStore`].
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    records: RwLock<HashMap<String, TrackRecord>>,
}

impl MemoryTrackStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrackStore for MemoryTrackStore {
    fn insert(&self, record: TrackRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        records.insert(record.hash.clone(), record);
        Ok(())
    }

    fn get_by_hash(&self, hash: &str) -> Result<Option<TrackRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(records.get(hash).cloned())
    }
}

/// Outcome of [`publish_results`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub inserted: usize,
    /// Failed fingerprint results, which are never published.
    pub skipped: usize,
    pub store_errors: usize,
}

/// Publish every successful result to `store`, labelled by `matcher`.
///
/// Store failures are logged and counted; publishing carries on with the
/// next record.
pub fn publish_results<'a>(
    store: &dyn TrackStore,
    matcher: &dyn GenreMatcher,
    results: impl IntoIterator<Item = &'a FingerprintResult>,
) -> PublishSummary {
    let mut summary = PublishSummary::default();
    for result in results {
        if !result.is_success() {
            summary.skipped += 1;
            continue;
        }
        let file = result.file();
        let record = TrackRecord {
            hash: result.fingerprint().to_string(),
            algorithm: result.algorithm(),
            path: file.path.clone(),
            size: file.size,
            duration_secs: result.duration_secs(),
            genre: matcher.classify(&file.path),
        };
        match store.insert(record) {
            Ok(()) => summary.inserted += 1,
            Err(e) => {
                log::warn!("Failed to publish {}: {}", file.path.display(), e);
                summary.store_errors += 1;
            }
        }
    }
    log::debug!(
        "Published {} tracks ({} skipped, {} store errors)",
        summary.inserted,
        summary.skipped,
        summary.store_errors
    );
    summary
}

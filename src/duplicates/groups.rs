//! Grouping fingerprint results into ranked duplicate groups.
//!
//! ```
//! use trackdupe::duplicates::group_duplicates;
//! use trackdupe::fingerprint::{Algorithm, FingerprintResult};
//! use trackdupe::scanner::FileRecord;
//! use std::path::PathBuf;
//! use std::time::{Duration, SystemTime};
//!
//! let result = |path: &str, fp: &str| {
//!     let file = FileRecord::new(PathBuf::from(path), 100, SystemTime::UNIX_EPOCH);
//!     FingerprintResult::success(file, Algorithm::ByteHash, fp.to_string(), 0.0, Duration::ZERO).unwrap()
//! };
//! let results = vec![result("/m/a.mp3", "x"), result("/m/b.flac", "x"), result("/m/c.mp3", "y")];
//!
//! let groups = group_duplicates(&results, Algorithm::ByteHash);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups["x"].keep().path, PathBuf::from("/m/b.flac"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ranking;
use crate::fingerprint::{Algorithm, FingerprintResult};
use crate::scanner::FileRecord;

/// Two or more files sharing one fingerprint, ranked best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub algorithm: Algorithm,
    pub fingerprint: String,
    /// Ranked by [`ranking::compare_quality`]; never fewer than two.
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Build a group from unranked members.
    #[must_use]
    pub fn new(algorithm: Algorithm, fingerprint: String, files: Vec<FileRecord>) -> Self {
        debug_assert!(files.len() >= 2, "a duplicate group needs at least two files");
        Self {
            algorithm,
            fingerprint,
            files: ranking::ranked(files),
        }
    }

    /// The top-ranked file.
    #[must_use]
    pub fn keep(&self) -> &FileRecord {
        &self.files[0]
    }

    /// Every file except the top-ranked one.
    #[must_use]
    pub fn removals(&self) -> &[FileRecord] {
        &self.files[1..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Bytes freed by removing everything except the kept file.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.removals().iter().map(|f| f.size).sum()
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Group the results of one algorithm by exact fingerprint.
///
/// Results for other algorithms are ignored. When a path appears more than
/// once, the last result wins, so a later failure removes an earlier success
/// from consideration. Failures never join a group and singletons are dropped.
#[must_use]
pub fn group_duplicates<'a, I>(results: I, algorithm: Algorithm) -> BTreeMap<String, DuplicateGroup>
where
    I: IntoIterator<Item = &'a FingerprintResult>,
{
    let mut latest: HashMap<&Path, &FingerprintResult> = HashMap::new();
    for result in results {
        if result.algorithm() == algorithm {
            latest.insert(result.file().path.as_path(), result);
        }
    }

    let mut buckets: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
    for result in latest.into_values().filter(|r| r.is_success()) {
        buckets
            .entry(result.fingerprint().to_string())
            .or_default()
            .push(result.file().clone());
    }

    let groups: BTreeMap<String, DuplicateGroup> = buckets
        .into_iter()
        .filter(|(_, files)| files.len() >= 2)
        .map(|(fingerprint, files)| {
            log::trace!("{} group {}: {} files", algorithm, fingerprint, files.len());
            let group = DuplicateGroup::new(algorithm, fingerprint.clone(), files);
            (fingerprint, group)
        })
        .collect();

    log::debug!("{}: {} duplicate group(s)", algorithm, groups.len());
    groups
}

/// Summary of the grouping for one algorithm.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateStats {
    /// Successfully fingerprinted files.
    pub total_files: usize,
    pub duplicate_groups: usize,
    /// Files that belong to some group.
    pub duplicate_files: usize,
    pub unique_files: usize,
    /// `duplicate_files / total_files`, 0 when nothing was fingerprinted.
    pub duplication_rate: f64,
    pub average_group_size: f64,
    pub largest_group: usize,
    pub reclaimable_bytes: u64,
}

impl DuplicateStats {
    #[must_use]
    pub fn from_groups<'a>(total_files: usize, groups: impl IntoIterator<Item = &'a DuplicateGroup>) -> Self {
        let mut stats = Self {
            total_files,
            ..Self::default()
        };
        for group in groups {
            stats.duplicate_groups += 1;
            stats.duplicate_files += group.len();
            stats.largest_group = stats.largest_group.max(group.len());
            stats.reclaimable_bytes += group.reclaimable_bytes();
        }
        stats.unique_files = total_files.saturating_sub(stats.duplicate_files);
        if total_files > 0 {
            stats.duplication_rate = stats.duplicate_files as f64 / total_files as f64;
        }
        if stats.duplicate_groups > 0 {
            stats.average_group_size = stats.duplicate_files as f64 / stats.duplicate_groups as f64;
        }
        stats
    }
}

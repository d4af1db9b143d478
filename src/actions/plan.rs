//! Which files a cleanup keeps and which it quarantines.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::duplicates::DuplicateGroup;
use crate::fingerprint::Algorithm;
use crate::scanner::FileRecord;

/// One duplicate group's decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub algorithm: Algorithm,
    pub fingerprint: String,
    /// Highest-ranked file of the group.
    pub keep: FileRecord,
    /// Files to move away, best first.
    pub remove: Vec<FileRecord>,
}

/// Every removal a cleanup would perform.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupPlan {
    pub entries: Vec<PlanEntry>,
}

impl CleanupPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files to be removed.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.entries.iter().map(|e| e.remove.len()).sum()
    }

    /// Bytes freed if every removal succeeds.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().flat_map(|e| &e.remove).map(|f| f.size).sum()
    }

    /// Removals in plan order.
    pub fn removals(&self) -> impl Iterator<Item = &FileRecord> {
        self.entries.iter().flat_map(|e| &e.remove)
    }
}

/// Build a cleanup plan from ranked groups.
///
/// A file that some group keeps is never removed, and no file is removed
/// twice. Groups left with nothing to remove are dropped.
#[must_use]
pub fn plan<'a>(groups: impl IntoIterator<Item = &'a DuplicateGroup>) -> CleanupPlan {
    let groups: Vec<&DuplicateGroup> = groups.into_iter().filter(|g| !g.is_empty()).collect();
    let kept: HashSet<PathBuf> = groups.iter().map(|g| g.keep().path.clone()).collect();
    let mut removed: HashSet<PathBuf> = HashSet::new();

    let entries = groups
        .into_iter()
        .filter_map(|group| {
            let remove: Vec<FileRecord> = group
                .removals()
                .iter()
                .filter(|f| !kept.contains(&f.path))
                .filter(|f| removed.insert(f.path.clone()))
                .cloned()
                .collect();
            (!remove.is_empty()).then(|| PlanEntry {
                algorithm: group.algorithm,
                fingerprint: group.fingerprint.clone(),
                keep: group.keep().clone(),
                remove,
            })
        })
        .collect();

    CleanupPlan { entries }
}

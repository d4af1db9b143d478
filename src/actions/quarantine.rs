//! Moving duplicates into a quarantine directory.
//!
//! Nothing is ever deleted: every removal is moved into a fresh
//! `trackdupe_quarantine_<timestamp>` directory next to a `manifest.csv`
//! mapping quarantined names back to their original paths.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use super::plan::CleanupPlan;
use crate::scanner::FileRecord;

/// Name of the restore manifest inside the quarantine directory.
pub const MANIFEST_FILE: &str = "manifest.csv";

const QUARANTINE_PREFIX: &str = "trackdupe_quarantine_";

/// How a cleanup runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupMode {
    /// Report what would move; touch nothing.
    DryRun,
    /// Move files into quarantine.
    Live,
}

/// Errors that stop a cleanup before any file moves.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("cannot create quarantine directory under {path}: {source}")]
    QuarantineDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single file was not moved.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Size or mtime differ from the scan.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MoveError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// A file that was moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovedFile {
    pub original: PathBuf,
    pub quarantined: PathBuf,
    pub size: u64,
}

/// A file that could not be moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of [`execute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupReport {
    pub mode: CleanupMode,
    /// Created quarantine directory; `None` on a dry run.
    pub quarantine_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub planned_files: usize,
    pub planned_bytes: u64,
    pub moved: Vec<MovedFile>,
    pub bytes_reclaimed: u64,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.mode {
            CleanupMode::DryRun => format!(
                "Would quarantine {} file(s), reclaiming {}",
                self.planned_files,
                bytesize::ByteSize(self.planned_bytes)
            ),
            CleanupMode::Live => {
                let dir = self
                    .quarantine_dir
                    .as_ref()
                    .map_or_else(String::new, |d| format!(" into {}", d.display()));
                if self.all_succeeded() {
                    format!(
                        "Quarantined {} file(s){}, reclaiming {}",
                        self.moved.len(),
                        dir,
                        bytesize::ByteSize(self.bytes_reclaimed)
                    )
                } else {
                    format!(
                        "Quarantined {} file(s){}, {} failed, reclaiming {}",
                        self.moved.len(),
                        dir,
                        self.failures.len(),
                        bytesize::ByteSize(self.bytes_reclaimed)
                    )
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ManifestRow<'a> {
    quarantined_name: &'a str,
    original_path: String,
    size: u64,
}

/// Run `plan`.
///
/// A dry run only fills in the planned totals. A live run creates a new
/// quarantine directory under `quarantine_root` and moves every removal
/// into it; failures of individual files are recorded and do not stop the
/// remaining moves.
///
/// # Errors
///
/// Returns an error when the quarantine directory cannot be created.
pub fn execute(plan: &CleanupPlan, quarantine_root: &Path, mode: CleanupMode) -> Result<CleanupReport, CleanupError> {
    let mut report = CleanupReport {
        mode,
        quarantine_dir: None,
        manifest: None,
        planned_files: plan.total_files(),
        planned_bytes: plan.total_bytes(),
        moved: Vec::new(),
        bytes_reclaimed: 0,
        failures: Vec::new(),
    };

    if mode == CleanupMode::DryRun {
        for file in plan.removals() {
            log::info!("[dry run] would quarantine {}", file.path.display());
        }
        return Ok(report);
    }

    let dir = create_quarantine_dir(quarantine_root, Local::now())?;
    log::info!("Quarantining {} file(s) into {}", report.planned_files, dir.display());

    for (index, file) in plan.removals().enumerate() {
        let name = quarantined_name(index + 1, file);
        let target = dir.join(&name);
        match move_verified(file, &target) {
            Ok(()) => {
                log::info!("Quarantined {} -> {}", file.path.display(), name);
                report.bytes_reclaimed += file.size;
                report.moved.push(MovedFile {
                    original: file.path.clone(),
                    quarantined: target,
                    size: file.size,
                });
            }
            Err(e) => {
                log::warn!("Not quarantined: {e}");
                report.failures.push(CleanupFailure {
                    path: file.path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let manifest = dir.join(MANIFEST_FILE);
    match write_manifest(&manifest, &report.moved) {
        Ok(()) => report.manifest = Some(manifest),
        Err(e) => {
            log::error!("Failed to write manifest {}: {}", manifest.display(), e);
            report.failures.push(CleanupFailure {
                path: manifest,
                error: e.to_string(),
            });
        }
    }

    report.quarantine_dir = Some(dir);
    Ok(report)
}

/// Create `trackdupe_quarantine_<YYYYmmdd_HHMMSS>` under `root`, adding a
/// `_<n>` suffix when that name is taken. An existing directory is never
/// reused.
pub fn create_quarantine_dir(root: &Path, now: DateTime<Local>) -> Result<PathBuf, CleanupError> {
    let dir_err = |source| CleanupError::QuarantineDir {
        path: root.to_path_buf(),
        source,
    };
    fs::create_dir_all(root).map_err(dir_err)?;

    let base = format!("{QUARANTINE_PREFIX}{}", now.format("%Y%m%d_%H%M%S"));
    let mut candidate = root.join(&base);
    let mut suffix = 0u32;
    loop {
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && suffix < 10_000 => {
                suffix += 1;
                candidate = root.join(format!("{base}_{suffix}"));
            }
            Err(e) => return Err(dir_err(e)),
        }
    }
}

/// `<index>_<file name>`, zero-padded so a listing sorts in plan order.
fn quarantined_name(index: usize, file: &FileRecord) -> String {
    format!("{index:05}_{}", file.file_name())
}

/// Move `file` to `target` if it still matches the scan.
fn move_verified(file: &FileRecord, target: &Path) -> Result<(), MoveError> {
    let metadata = fs::metadata(&file.path).map_err(|e| MoveError::from_io(&file.path, e))?;
    if metadata.len() != file.size {
        log::warn!(
            "File modified since scan: {} (size changed from {} to {})",
            file.path.display(),
            file.size,
            metadata.len()
        );
        return Err(MoveError::Modified(file.path.clone()));
    }
    if metadata.modified().is_ok_and(|mtime| mtime != file.modified) {
        log::warn!("File modified since scan: {} (mtime changed)", file.path.display());
        return Err(MoveError::Modified(file.path.clone()));
    }

    move_file(&file.path, target)
}

/// Rename, falling back to copy and remove when the rename fails (for
/// example across filesystems).
fn move_file(source: &Path, target: &Path) -> Result<(), MoveError> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            log::debug!(
                "Rename of {} failed ({}), copying instead",
                source.display(),
                rename_err
            );
            fs::copy(source, target).map_err(|e| MoveError::from_io(source, e))?;
            if let Err(e) = fs::remove_file(source) {
                let _ = fs::remove_file(target);
                return Err(MoveError::from_io(source, e));
            }
            Ok(())
        }
    }
}

fn write_manifest(path: &Path, moved: &[MovedFile]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    if moved.is_empty() {
        writer.write_record(["quarantined_name", "original_path", "size"])?;
    }
    for entry in moved {
        let name = entry
            .quarantined
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.serialize(ManifestRow {
            quarantined_name: &name,
            original_path: entry.original.display().to_string(),
            size: entry.size,
        })?;
    }
    writer.flush()?;
    Ok(())
}

//! Recursive audio file discovery using jwalk.
//!
//! Children are sorted by name inside every directory, so two walks of an
//! unchanged tree yield records in the same order. Entries that cannot be
//! read are yielded as `Err` and the walk continues.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{extension_of, FileRecord, ScanError, WalkerConfig};

/// Walks a directory tree and yields [`FileRecord`]s for accepted audio files.
#[derive(Debug)]
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Stop yielding entries once `flag` is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn build_ignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    fn is_ignored(&self, path: &Path, is_dir: bool, gitignore: Option<&Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let relative = if cfg!(windows) {
            relative.to_string_lossy().replace('\\', "/")
        } else {
            relative.to_string_lossy().into_owned()
        };
        gi.matched_path_or_any_parents(relative, is_dir).is_ignore()
    }

    /// Walk the tree.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, ScanError>> + '_ {
        let gitignore = self.build_ignore();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(|_depth, _path, _state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: shutdown requested, stopping");
                return None;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    return Some(Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }));
                }
            };

            let path = entry.path();
            if path == self.root {
                return None;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                return None;
            }
            if file_type.is_symlink() && !self.config.follow_symlinks {
                log::trace!("Skipping symlink: {}", path.display());
                return None;
            }

            let extension = extension_of(&path);
            if !self.config.accepts(&extension) {
                return None;
            }
            if self.is_ignored(&path, false, gitignore.as_ref()) {
                log::trace!("Ignoring file: {}", path.display());
                return None;
            }

            self.record_for(path)
        })
    }

    fn record_for(&self, path: PathBuf) -> Option<Result<FileRecord, ScanError>> {
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", path.display(), e);
                return Some(Err(ScanError::from_io(&path, e)));
            }
        };
        if !metadata.is_file() {
            return None;
        }

        let size = metadata.len();
        if size == 0 {
            log::debug!("Skipping empty file: {}", path.display());
            return None;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Some(Ok(FileRecord::new(path, size, modified)))
    }
}

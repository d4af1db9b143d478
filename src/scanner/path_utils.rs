//! Path helpers: scan-root validation and Unicode normalization.
//!
//! macOS hands out NFD file names while most other systems use NFC, so the
//! same visible name can arrive as two different byte strings. Anything that
//! compares names textually (filename similarity, for instance) goes through
//! [`normalize_path_str`] first. Paths used to open files are never rewritten.
//!
//! ```
//! use trackdupe::scanner::path_utils::{normalize_path_str, paths_equal};
//!
//! assert_eq!(normalize_path_str("cafe\u{0301}.flac"), "café.flac");
//! assert!(paths_equal("café.flac", "cafe\u{0301}.flac"));
//! ```

use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

use super::ScanError;

/// NFC form of `s`.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

#[must_use]
pub fn paths_equal(a: &str, b: &str) -> bool {
    normalize_path_str(a) == normalize_path_str(b)
}

/// NFC-normalized, lossily converted file stem of `path`.
#[must_use]
pub fn normalized_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| normalize_path_str(&s.to_string_lossy()))
        .unwrap_or_default()
}

/// Check that `root` exists, is a directory and can be listed.
///
/// Returns the canonical absolute path so every [`FileRecord`](super::FileRecord)
/// produced under it carries an absolute identity.
pub fn validate_root(root: &Path) -> Result<PathBuf, ScanError> {
    let metadata = std::fs::metadata(root).map_err(|e| ScanError::from_io(root, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|e| ScanError::from_io(root, e))?;
    std::fs::canonicalize(root).map_err(|e| ScanError::from_io(root, e))
}

//! Directory traversal and file identity.
//!
//! - [`walker`]: recursive discovery of audio files with jwalk
//! - [`path_utils`]: root validation and Unicode normalization helpers
//!
//! ```no_run
//! use trackdupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/music"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{} ({}): {} bytes", file.path.display(), file.extension, file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod path_utils;
pub mod walker;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

pub use walker::Walker;

/// Container extensions picked up by default (lower-case, no dot).
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "m4a", "aiff", "aif", "ogg", "wma", "aac",
];

/// Identity and metadata of one audio file, captured during the walk.
///
/// Records are never mutated after creation and serialize losslessly, so a
/// resumed scan sees exactly what the interrupted one saw.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path; the identity of the file across the whole scan.
    pub path: PathBuf,
    /// Lower-cased container extension without the dot (may be empty).
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time. May predate the Unix epoch.
    #[serde(with = "signed_time")]
    pub modified: SystemTime,
}

impl FileRecord {
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        let extension = extension_of(&path);
        Self {
            path,
            extension,
            size,
            modified,
        }
    }

    /// Build a record from the file's current metadata (symlinks followed).
    pub fn from_path(path: &Path) -> Result<Self, ScanError> {
        let metadata = std::fs::metadata(path).map_err(|e| ScanError::from_io(path, e))?;
        if !metadata.is_file() {
            return Err(ScanError::NotAFile(path.to_path_buf()));
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(Self::new(path.to_path_buf(), metadata.len(), modified))
    }

    /// File name component, lossily converted.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Serde form of a [`SystemTime`] that also covers instants before the Unix
/// epoch, which serde's own impl rejects.
///
/// Stored as whole seconds (signed) plus a non-negative nanosecond offset, so
/// `-1.25 s` is `{ secs_since_epoch: -2, nanos_since_epoch: 750_000_000 }`.
/// Post-epoch values use the same field names as serde's built-in format.
pub(crate) mod signed_time {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

    const NANOS_PER_SEC: u32 = 1_000_000_000;

    #[derive(Serialize, Deserialize)]
    struct SignedTime {
        secs_since_epoch: i64,
        nanos_since_epoch: u32,
    }

    fn to_signed(time: SystemTime) -> Option<SignedTime> {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Some(SignedTime {
                secs_since_epoch: i64::try_from(after.as_secs()).ok()?,
                nanos_since_epoch: after.subsec_nanos(),
            }),
            Err(err) => {
                let before = err.duration();
                let secs = i64::try_from(before.as_secs()).ok()?;
                Some(match before.subsec_nanos() {
                    0 => SignedTime {
                        secs_since_epoch: -secs,
                        nanos_since_epoch: 0,
                    },
                    nanos => SignedTime {
                        secs_since_epoch: -secs - 1,
                        nanos_since_epoch: NANOS_PER_SEC - nanos,
                    },
                })
            }
        }
    }

    fn from_signed(value: &SignedTime) -> Option<SystemTime> {
        if value.nanos_since_epoch >= NANOS_PER_SEC {
            return None;
        }
        let nanos = Duration::from_nanos(u64::from(value.nanos_since_epoch));
        if value.secs_since_epoch >= 0 {
            UNIX_EPOCH.checked_add(Duration::from_secs(value.secs_since_epoch.unsigned_abs()) + nanos)
        } else {
            UNIX_EPOCH
                .checked_sub(Duration::from_secs(value.secs_since_epoch.unsigned_abs()))?
                .checked_add(nanos)
        }
    }

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        match to_signed(*time) {
            Some(value) => value.serialize(serializer),
            None => Err(<S::Error as ser::Error>::custom("modification time out of range")),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let value = SignedTime::deserialize(deserializer)?;
        from_signed(&value).ok_or_else(|| <D::Error as de::Error>::custom("modification time out of range"))
    }
}

/// Lower-cased extension of `path`, empty when there is none.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Directory walk settings.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Accepted extensions, lower-case without the dot.
    pub extensions: Vec<String>,
    pub follow_symlinks: bool,
    pub skip_hidden: bool,
    /// Gitignore-style patterns, relative to the root.
    pub ignore_patterns: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            follow_symlinks: false,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
        }
    }
}

impl WalkerConfig {
    /// Whether `extension` (already lower-cased) is in the accepted set.
    #[must_use]
    pub fn accepts(&self, extension: &str) -> bool {
        !extension.is_empty() && self.extensions.iter().any(|e| e.eq_ignore_ascii_case(extension))
    }
}

/// Errors raised while walking or validating the scan root.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub(crate) fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

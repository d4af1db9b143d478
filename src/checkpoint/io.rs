//! Checkpoint persistence.
//!
//! The file is a JSON envelope holding a SHA-256 of the compact payload next
//! to the payload itself. Writes go to a sibling temp file which is then
//! renamed over the target, so an interrupted write leaves the previous
//! checkpoint untouched.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::data::{ScanCheckpoint, CHECKPOINT_VERSION};
use super::CheckpointError;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    checksum: String,
    checkpoint: &'a ScanCheckpoint,
}

#[derive(Deserialize)]
struct Envelope {
    checksum: String,
    checkpoint: ScanCheckpoint,
}

fn checksum_of(checkpoint: &ScanCheckpoint) -> Result<String, CheckpointError> {
    let compact = serde_json::to_string(checkpoint).map_err(CheckpointError::Serialize)?;
    Ok(format!("{:x}", Sha256::digest(compact.as_bytes())))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

impl ScanCheckpoint {
    /// Envelope JSON for this checkpoint.
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        let envelope = EnvelopeRef {
            checksum: checksum_of(self)?,
            checkpoint: self,
        };
        serde_json::to_string_pretty(&envelope).map_err(CheckpointError::Serialize)
    }

    /// Atomically replace the checkpoint at `path`.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let json = self.to_json()?;
        let tmp = temp_path(path);
        let write_err = |source| CheckpointError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut file = File::create(&tmp).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            write_err(e)
        })?;

        log::debug!(
            "Checkpoint saved to {} ({} files processed)",
            path.display(),
            self.processed_count
        );
        Ok(())
    }

    /// Parse and verify envelope JSON.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let envelope: Envelope = serde_json::from_str(json).map_err(CheckpointError::Parse)?;

        if checksum_of(&envelope.checkpoint)? != envelope.checksum {
            return Err(CheckpointError::ChecksumMismatch);
        }
        if envelope.checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Version {
                found: envelope.checkpoint.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        Ok(envelope.checkpoint)
    }

    /// Load and verify the checkpoint at `path`.
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let json = fs::read_to_string(path).map_err(|source| CheckpointError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let checkpoint = Self::from_json(&json)?;
        log::info!(
            "Loaded checkpoint from {} ({} files processed, {} errors, saved {})",
            path.display(),
            checkpoint.processed_count,
            checkpoint.error_count,
            checkpoint.updated_at.to_rfc3339()
        );
        Ok(checkpoint)
    }

    /// Load `path` if it exists.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>, CheckpointError> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Delete the checkpoint at `path`; a missing file is not an error.
    pub fn remove(path: &Path) -> Result<(), CheckpointError> {
        match fs::remove_file(path) {
            Ok(()) => {
                log::debug!("Removed checkpoint {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Write {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

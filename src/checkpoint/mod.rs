//! Resumable scan state.
//!
//! - [`data`]: the [`ScanCheckpoint`] structure
//! - [`io`]: checksummed, atomically replaced JSON persistence

pub mod data;
pub mod io;

use std::path::PathBuf;

pub use data::{ScanCheckpoint, CHECKPOINT_VERSION};

/// Errors reading, writing or validating a checkpoint.
#[derive(thiserror::Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint is corrupted or in an unknown format: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Checkpoint integrity check failed: checksum mismatch")]
    ChecksumMismatch,

    #[error("Unsupported checkpoint version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Checkpoint belongs to {found}, not {expected}")]
    RootMismatch { expected: PathBuf, found: PathBuf },

    #[error("Checkpoint was taken with algorithms [{found}], this scan uses [{expected}]")]
    AlgorithmMismatch { expected: String, found: String },
}

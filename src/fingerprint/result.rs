//! The single result record produced per (file, algorithm).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Algorithm;
use crate::scanner::FileRecord;

/// Why a file could not be fingerprinted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    PermissionDenied,
    Io,
    Unsupported,
    Decode,
    EmptyStream,
    Timeout,
    Unavailable,
    Panic,
    BatchFailed,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Io => "io",
            Self::Unsupported => "unsupported",
            Self::Decode => "decode",
            Self::EmptyStream => "empty_stream",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::Panic => "panic",
            Self::BatchFailed => "batch_failed",
        }
    }
}

/// Success or failure, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum FingerprintOutcome {
    Success { fingerprint: String, duration_secs: f64 },
    Failure { kind: FailureKind, error: String },
}

/// Rejected attempt to build a result that breaks the success/failure invariant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidResult {
    #[error("successful result has an empty fingerprint")]
    EmptyFingerprint,
    #[error("result carries both a fingerprint and an error")]
    Ambiguous,
    #[error("failed result has an empty error message")]
    EmptyError,
}

/// Outcome of fingerprinting one file with one algorithm.
///
/// Exactly one of {non-empty fingerprint, non-empty error} holds; the
/// constructors and deserialization both enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResultRecord", into = "ResultRecord")]
pub struct FingerprintResult {
    file: FileRecord,
    algorithm: Algorithm,
    outcome: FingerprintOutcome,
    processing_time: Duration,
}

impl FingerprintResult {
    pub fn success(
        file: FileRecord,
        algorithm: Algorithm,
        fingerprint: String,
        duration_secs: f64,
        processing_time: Duration,
    ) -> Result<Self, InvalidResult> {
        if fingerprint.is_empty() {
            return Err(InvalidResult::EmptyFingerprint);
        }
        let duration_secs = if duration_secs.is_finite() { duration_secs.max(0.0) } else { 0.0 };
        Ok(Self {
            file,
            algorithm,
            outcome: FingerprintOutcome::Success {
                fingerprint,
                duration_secs,
            },
            processing_time,
        })
    }

    /// Build a failure. An empty message is replaced with the kind's name.
    #[must_use]
    pub fn failure(
        file: FileRecord,
        algorithm: Algorithm,
        kind: FailureKind,
        error: impl Into<String>,
        processing_time: Duration,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = kind.as_str().to_string();
        }
        Self {
            file,
            algorithm,
            outcome: FingerprintOutcome::Failure { kind, error },
            processing_time,
        }
    }

    #[must_use]
    pub fn file(&self) -> &FileRecord {
        &self.file
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[must_use]
    pub fn outcome(&self) -> &FingerprintOutcome {
        &self.outcome
    }

    #[must_use]
    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FingerprintOutcome::Success { .. })
    }

    /// Fingerprint string, empty on failure.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        match &self.outcome {
            FingerprintOutcome::Success { fingerprint, .. } => fingerprint,
            FingerprintOutcome::Failure { .. } => "",
        }
    }

    /// Analyzed audio length in seconds, zero on failure.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        match &self.outcome {
            FingerprintOutcome::Success { duration_secs, .. } => *duration_secs,
            FingerprintOutcome::Failure { .. } => 0.0,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            FingerprintOutcome::Success { .. } => None,
            FingerprintOutcome::Failure { error, .. } => Some(error),
        }
    }

    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            FingerprintOutcome::Success { .. } => None,
            FingerprintOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Flat wire shape used in checkpoints and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResultRecord {
    file: FileRecord,
    algorithm: Algorithm,
    #[serde(default)]
    fingerprint: String,
    #[serde(default)]
    duration_secs: f64,
    processing_time: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_kind: Option<FailureKind>,
}

impl TryFrom<ResultRecord> for FingerprintResult {
    type Error = InvalidResult;

    fn try_from(record: ResultRecord) -> Result<Self, Self::Error> {
        match record.error {
            Some(error) => {
                if !record.fingerprint.is_empty() {
                    return Err(InvalidResult::Ambiguous);
                }
                if error.is_empty() {
                    return Err(InvalidResult::EmptyError);
                }
                Ok(Self {
                    file: record.file,
                    algorithm: record.algorithm,
                    outcome: FingerprintOutcome::Failure {
                        kind: record.failure_kind.unwrap_or(FailureKind::Io),
                        error,
                    },
                    processing_time: record.processing_time,
                })
            }
            None => FingerprintResult::success(
                record.file,
                record.algorithm,
                record.fingerprint,
                record.duration_secs,
                record.processing_time,
            ),
        }
    }
}

impl From<FingerprintResult> for ResultRecord {
    fn from(result: FingerprintResult) -> Self {
        let (fingerprint, duration_secs, error, failure_kind) = match result.outcome {
            FingerprintOutcome::Success {
                fingerprint,
                duration_secs,
            } => (fingerprint, duration_secs, None, None),
            FingerprintOutcome::Failure { kind, error } => (String::new(), 0.0, Some(error), Some(kind)),
        };
        Self {
            file: result.file,
            algorithm: result.algorithm,
            fingerprint,
            duration_secs,
            processing_time: result.processing_time,
            error,
            failure_kind,
        }
    }
}

//! Exit codes and structured error output.
//!
//! Per-file and per-batch failures never surface here; they are data in the
//! scan report. Only scan-fatal errors reach `main` as `anyhow::Error`.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: scan completed and duplicates were found
/// - 1: fatal error (bad root, corrupt checkpoint, I/O on the report, ...)
/// - 2: scan completed, no duplicate groups in any algorithm
/// - 3: scan completed but some files failed to fingerprint
/// - 130: interrupted by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoDuplicates = 2,
    PartialSuccess = 3,
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code used in error output.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "TD000",
            Self::GeneralError => "TD001",
            Self::NoDuplicates => "TD002",
            Self::PartialSuccess => "TD003",
            Self::Interrupted => "TD130",
        }
    }

    /// Exit code for a finished (or interrupted) scan.
    ///
    /// Interruption wins over everything, then per-file errors, then the
    /// absence of duplicates.
    #[must_use]
    pub fn for_scan(interrupted: bool, error_count: usize, duplicate_groups: usize) -> Self {
        if interrupted {
            Self::Interrupted
        } else if error_count > 0 {
            Self::PartialSuccess
        } else if duplicate_groups == 0 {
            Self::NoDuplicates
        } else {
            Self::Success
        }
    }
}

/// Error payload printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    pub code: String,
    pub exit_code: i32,
    pub message: String,
    /// Full `anyhow` context chain, outermost first.
    pub causes: Vec<String>,
    pub interrupted: bool,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(|c| c.to_string()).collect(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

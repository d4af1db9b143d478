//! JSON report writer.
//!
//! The document is the [`ScanReport`] with the exit code added at the top:
//!
//! ```json
//! {
//!   "exit_code": 0,
//!   "exit_code_name": "TD000",
//!   "overall": { "root": "/music", "files_processed": 1200, ... },
//!   "performance": { "byte_hash": { ... }, "spectral": { ... } },
//!   "duplicates": { "byte_hash": { "duplicate_groups": 3, "groups": [ ... ] } },
//!   "errors": { ... },
//!   "recommendations": [ ... ]
//! }
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::error::ExitCode;
use crate::report::ScanReport;

/// Errors writing the JSON report.
#[derive(Debug, Error)]
pub enum JsonOutputError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The report plus its exit code.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    pub exit_code: i32,
    pub exit_code_name: &'static str,
    #[serde(flatten)]
    pub report: &'a ScanReport,
}

impl<'a> JsonOutput<'a> {
    #[must_use]
    pub fn new(report: &'a ScanReport, exit_code: ExitCode) -> Self {
        Self {
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
            report,
        }
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON followed by a newline.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write the report to `path`, replacing any previous one.
    pub fn write_file(&self, path: &Path) -> Result<(), JsonOutputError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{Algorithm, FingerprintResult};
    use crate::scan::{ResultSet, ScanCounters, ScanOutcome};
    use crate::scanner::FileRecord;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn report() -> ScanReport {
        let results: ResultSet = ["/m/a.mp3", "/m/b.mp3"]
            .iter()
            .map(|p| {
                let file = FileRecord::new(PathBuf::from(p), 3, SystemTime::UNIX_EPOCH);
                FingerprintResult::success(file, Algorithm::ByteHash, "same".into(), 0.0, Duration::ZERO).unwrap()
            })
            .collect();
        let outcome = ScanOutcome {
            root: PathBuf::from("/m"),
            algorithms: vec![Algorithm::ByteHash],
            results,
            counters: ScanCounters::default(),
            resumed: false,
            interrupted: false,
            elapsed: Duration::from_millis(5),
            checkpoint: None,
        };
        ScanReport::build(&outcome, &outcome.duplicate_groups(), None)
    }

    #[test]
    fn test_json_has_exit_code_and_report() {
        let report = report();
        let output = JsonOutput::new(&report, ExitCode::Success);
        let value: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();

        assert_eq!(value["exit_code"], 0);
        assert_eq!(value["exit_code_name"], "TD000");
        assert_eq!(value["duplicates"]["byte_hash"]["duplicate_groups"], 1);
        assert_eq!(value["duplicates"]["byte_hash"]["groups"][0]["files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_write_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.json");
        let report = report();
        JsonOutput::new(&report, ExitCode::Success).write_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("}\n"));
        assert!(content.contains("\"recommendations\""));
    }
}

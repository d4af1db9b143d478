//! CSV export of duplicate groups.
//!
//! One row per file in every group, best-ranked first:
//!
//! - `algorithm`: algorithm that produced the group
//! - `group`: 1-based group number within the algorithm
//! - `fingerprint`: shared fingerprint
//! - `rank`: 1 for the kept file
//! - `action`: `keep` or `remove`
//! - `path`, `extension`, `size`
//! - `modified`: RFC 3339

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::duplicates::DuplicateGroup;
use crate::fingerprint::Algorithm;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    algorithm: &'static str,
    group: usize,
    fingerprint: &'a str,
    rank: usize,
    action: &'static str,
    path: String,
    extension: &'a str,
    size: u64,
    modified: String,
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    groups: &'a BTreeMap<Algorithm, Vec<DuplicateGroup>>,
}

impl<'a> CsvOutput<'a> {
    #[must_use]
    pub fn new(groups: &'a BTreeMap<Algorithm, Vec<DuplicateGroup>>) -> Self {
        Self { groups }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let mut wrote_any = false;

        for (algorithm, groups) in self.groups {
            for (idx, group) in groups.iter().enumerate() {
                for (rank, file) in group.files.iter().enumerate() {
                    let modified: DateTime<Utc> = file.modified.into();
                    csv_writer.serialize(CsvRow {
                        algorithm: algorithm.as_str(),
                        group: idx + 1,
                        fingerprint: &group.fingerprint,
                        rank: rank + 1,
                        action: if rank == 0 { "keep" } else { "remove" },
                        path: file.path.to_string_lossy().into_owned(),
                        extension: &file.extension,
                        size: file.size,
                        modified: modified.to_rfc3339(),
                    })?;
                    wrote_any = true;
                }
            }
        }

        if !wrote_any {
            csv_writer.write_record([
                "algorithm",
                "group",
                "fingerprint",
                "rank",
                "action",
                "path",
                "extension",
                "size",
                "modified",
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| CsvOutputError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Write the CSV export to `path`.
    pub fn write_file(&self, path: &Path) -> Result<(), CsvOutputError> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        log::info!("CSV export written to {}", path.display());
        Ok(())
    }
}

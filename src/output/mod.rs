//! Report writers.
//!
//! - [`json`]: the full report as pretty JSON
//! - [`csv`]: ranked groups for spreadsheets
//! - [`summary`]: colored terminal summary

pub mod csv;
pub mod json;
pub mod summary;

pub use csv::{CsvOutput, CsvOutputError};
pub use json::{JsonOutput, JsonOutputError};
pub use summary::write_summary;

//! Duplicate detection on top of fingerprint results.
//!
//! - [`groups`]: bucket results by exact fingerprint per algorithm
//! - [`ranking`]: order files in a group by container, size, mtime, path

pub mod groups;
pub mod ranking;

pub use groups::{group_duplicates, DuplicateGroup, DuplicateStats};
pub use ranking::{compare_quality, format_weight, rank, ranked};

//! Quality ranking inside a duplicate group.
//!
//! Files are ordered lexicographically, best first:
//!
//! 1. container format weight (higher first)
//! 2. size in bytes (larger first)
//! 3. modification time (newer first)
//! 4. path (ascending), so the order is total and stable
//!
//! A lossless container always beats a lossy one regardless of size.

use std::cmp::Ordering;

use crate::scanner::FileRecord;

/// Preference weight of a container extension (lower-case, no dot).
///
/// ```
/// use trackdupe::duplicates::format_weight;
///
/// assert!(format_weight("flac") > format_weight("mp3"));
/// assert_eq!(format_weight("xyz"), 0);
/// ```
#[must_use]
pub fn format_weight(extension: &str) -> u8 {
    match extension.to_ascii_lowercase().as_str() {
        "flac" => 5,
        "wav" | "aiff" | "aif" => 4,
        "m4a" => 3,
        "mp3" | "aac" => 2,
        "ogg" | "wma" => 1,
        _ => 0,
    }
}

/// `Less` when `a` should be kept in preference to `b`.
#[must_use]
pub fn compare_quality(a: &FileRecord, b: &FileRecord) -> Ordering {
    format_weight(&b.extension)
        .cmp(&format_weight(&a.extension))
        .then_with(|| b.size.cmp(&a.size))
        .then_with(|| b.modified.cmp(&a.modified))
        .then_with(|| a.path.cmp(&b.path))
}

/// Sort `files` best first.
pub fn rank(files: &mut [FileRecord]) {
    files.sort_by(compare_quality);
}

/// Return `files` sorted best first.
#[must_use]
pub fn ranked(mut files: Vec<FileRecord>) -> Vec<FileRecord> {
    rank(&mut files);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    fn file(path: &str, size: u64, secs: u64) -> FileRecord {
        FileRecord::new(
            PathBuf::from(path),
            size,
            SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        )
    }

    #[test]
    fn test_format_weights() {
        assert_eq!(format_weight("flac"), 5);
        assert_eq!(format_weight("WAV"), 4);
        assert_eq!(format_weight("aiff"), 4);
        assert_eq!(format_weight("m4a"), 3);
        assert_eq!(format_weight("mp3"), 2);
        assert_eq!(format_weight("ogg"), 1);
        assert_eq!(format_weight(""), 0);
    }

    #[test]
    fn test_lossless_beats_bigger_lossy() {
        let flac = file("/m/a.flac", 10_000_000, 1);
        let mp3 = file("/m/a.mp3", 40_000_000, 2);
        assert_eq!(ranked(vec![mp3.clone(), flac.clone()]), vec![flac, mp3]);
    }

    #[test]
    fn test_size_then_mtime_then_path() {
        let big = file("/m/z.mp3", 9, 1);
        let newer = file("/m/y.mp3", 8, 5);
        let older = file("/m/x.mp3", 8, 4);
        let tie_b = file("/m/b.mp3", 7, 3);
        let tie_a = file("/m/a.mp3", 7, 3);

        let order = ranked(vec![tie_b.clone(), older.clone(), tie_a.clone(), newer.clone(), big.clone()]);
        assert_eq!(order, vec![big, newer, older, tie_a, tie_b]);
    }

    #[test]
    fn test_scenario_flac_mp3_mp3() {
        let flac = file("/lib/a.flac", 30_000_000, 100);
        let mp3_large = file("/lib/a.mp3", 8_000_000, 100);
        let mp3_small = file("/lib/a (1).mp3", 4_000_000, 100);
        let order = ranked(vec![mp3_small.clone(), mp3_large.clone(), flac.clone()]);
        assert_eq!(order, vec![flac, mp3_large, mp3_small]);
    }

    #[test]
    fn test_compare_is_reflexive_equal() {
        let a = file("/m/a.mp3", 1, 1);
        assert_eq!(compare_quality(&a, &a), Ordering::Equal);
    }
}

//! Rough accuracy estimate from file names.
//!
//! Files whose names look alike after stripping copy markers and bit-rate
//! tags ("Song (1).mp3", "Song - Copy.mp3", "Song_320.mp3") are taken to be
//! expected duplicates. An algorithm's accuracy is the share of those pairs
//! it put into the same group. This is a heuristic and is only computed for
//! libraries small enough for a pairwise comparison.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::duplicates::DuplicateGroup;
use crate::fingerprint::Algorithm;
use crate::scan::ResultSet;
use crate::scanner::path_utils::normalized_stem;

/// Above this many files the pairwise comparison is skipped.
pub const MAX_ACCURACY_FILES: usize = 2_000;

/// Minimum Sørensen-Dice similarity for two stems to count as a pair.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyEstimate {
    pub expected_pairs: usize,
    pub detected_pairs: usize,
    pub accuracy: f64,
}

fn suffix_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)(\s*\(\d+\)|\s*-?\s*copy|[\s_-]*\d{2,3}\s*kbps|_\d{3})+$").ok())
        .as_ref()
}

/// Lowercased NFC stem with copy and bit-rate suffixes removed.
#[must_use]
pub fn comparable_stem(path: &Path) -> String {
    let stem = normalized_stem(path).to_lowercase();
    match suffix_pattern() {
        Some(pattern) => pattern.replace(&stem, "").trim().to_string(),
        None => stem.trim().to_string(),
    }
}

/// Pairs of paths whose comparable stems are similar enough.
#[must_use]
pub fn expected_pairs(paths: &[&Path]) -> Vec<(PathBuf, PathBuf)> {
    let stems: Vec<String> = paths.iter().map(|p| comparable_stem(p)).collect();
    let mut pairs = Vec::new();
    for i in 0..paths.len() {
        if stems[i].is_empty() {
            continue;
        }
        for j in i + 1..paths.len() {
            if stems[j].is_empty() {
                continue;
            }
            if strsim::sorensen_dice(&stems[i], &stems[j]) >= SIMILARITY_THRESHOLD {
                pairs.push((paths[i].to_path_buf(), paths[j].to_path_buf()));
            }
        }
    }
    pairs
}

/// Accuracy per algorithm. Empty when there are too many files or no
/// expected pairs at all.
#[must_use]
pub fn estimate(
    results: &ResultSet,
    groups: &BTreeMap<Algorithm, Vec<DuplicateGroup>>,
) -> BTreeMap<Algorithm, AccuracyEstimate> {
    let files: BTreeSet<&Path> = results
        .iter()
        .filter(|r| r.is_success())
        .map(|r| r.file().path.as_path())
        .collect();

    if files.len() > MAX_ACCURACY_FILES {
        log::debug!(
            "Skipping accuracy estimate: {} files exceeds {}",
            files.len(),
            MAX_ACCURACY_FILES
        );
        return BTreeMap::new();
    }

    let files: Vec<&Path> = files.into_iter().collect();
    let pairs = expected_pairs(&files);
    if pairs.is_empty() {
        return BTreeMap::new();
    }

    groups
        .iter()
        .map(|(&algorithm, groups)| {
            let membership: HashMap<&Path, usize> = groups
                .iter()
                .enumerate()
                .flat_map(|(index, group)| group.files.iter().map(move |f| (f.path.as_path(), index)))
                .collect();
            let detected_pairs = pairs
                .iter()
                .filter(|(a, b)| {
                    matches!(
                        (membership.get(a.as_path()), membership.get(b.as_path())),
                        (Some(x), Some(y)) if x == y
                    )
                })
                .count();
            let estimate = AccuracyEstimate {
                expected_pairs: pairs.len(),
                detected_pairs,
                accuracy: detected_pairs as f64 / pairs.len() as f64,
            };
            (algorithm, estimate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintResult;
    use crate::scanner::FileRecord;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_comparable_stem_strips_markers() {
        assert_eq!(comparable_stem(Path::new("/m/Song Title (1).mp3")), "song title");
        assert_eq!(comparable_stem(Path::new("/m/Song Title - Copy.mp3")), "song title");
        assert_eq!(comparable_stem(Path::new("/m/Song Title_320.mp3")), "song title");
        assert_eq!(comparable_stem(Path::new("/m/Song Title 128kbps.mp3")), "song title");
        assert_eq!(comparable_stem(Path::new("/m/Song Title.flac")), "song title");
    }

    #[test]
    fn test_expected_pairs() {
        let paths = [
            Path::new("/m/Artist - Track (1).mp3"),
            Path::new("/m/Artist - Track.flac"),
            Path::new("/m/Something Else Entirely.mp3"),
        ];
        let pairs = expected_pairs(&paths);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, PathBuf::from("/m/Artist - Track.flac"));
    }

    fn ok(path: &str, algorithm: Algorithm, fp: &str) -> FingerprintResult {
        let file = FileRecord::new(PathBuf::from(path), 1, SystemTime::UNIX_EPOCH);
        FingerprintResult::success(file, algorithm, fp.into(), 0.0, Duration::ZERO).unwrap()
    }

    #[test]
    fn test_estimate_counts_grouped_pairs() {
        let results: ResultSet = vec![
            ok("/m/Track.flac", Algorithm::Spectral, "a"),
            ok("/m/Track (1).mp3", Algorithm::Spectral, "a"),
            ok("/m/Track.flac", Algorithm::ByteHash, "x"),
            ok("/m/Track (1).mp3", Algorithm::ByteHash, "y"),
        ]
        .into_iter()
        .collect();

        let mut groups: BTreeMap<Algorithm, Vec<DuplicateGroup>> = BTreeMap::new();
        groups.insert(
            Algorithm::Spectral,
            crate::duplicates::group_duplicates(results.for_algorithm(Algorithm::Spectral), Algorithm::Spectral)
                .into_values()
                .collect(),
        );
        groups.insert(Algorithm::ByteHash, Vec::new());

        let accuracy = estimate(&results, &groups);
        assert_eq!(accuracy[&Algorithm::Spectral].accuracy, 1.0);
        assert_eq!(accuracy[&Algorithm::ByteHash].detected_pairs, 0);
        assert_eq!(accuracy[&Algorithm::ByteHash].expected_pairs, 1);
    }

    #[test]
    fn test_estimate_without_pairs_is_empty() {
        let results: ResultSet = vec![ok("/m/alpha.mp3", Algorithm::ByteHash, "1"), ok("/m/zulu.mp3", Algorithm::ByteHash, "2")]
            .into_iter()
            .collect();
        assert!(estimate(&results, &BTreeMap::new()).is_empty());
    }
}

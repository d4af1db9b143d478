//! Aggregated results keyed by (algorithm, path).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::fingerprint::{Algorithm, FingerprintResult};

/// All results of a scan. Inserting a result for an existing
/// (algorithm, path) pair replaces the previous one, so the set does not
/// depend on the order batches arrive in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    by_algorithm: BTreeMap<Algorithm, BTreeMap<PathBuf, FingerprintResult>>,
}

impl ResultSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `result`, returning the one it replaced.
    pub fn insert(&mut self, result: FingerprintResult) -> Option<FingerprintResult> {
        self.by_algorithm
            .entry(result.algorithm())
            .or_default()
            .insert(result.file().path.clone(), result)
    }

    #[must_use]
    pub fn get(&self, algorithm: Algorithm, path: &Path) -> Option<&FingerprintResult> {
        self.by_algorithm.get(&algorithm).and_then(|m| m.get(path))
    }

    /// Results of one algorithm, ordered by path.
    pub fn for_algorithm(&self, algorithm: Algorithm) -> impl Iterator<Item = &FingerprintResult> {
        self.by_algorithm.get(&algorithm).into_iter().flat_map(BTreeMap::values)
    }

    /// Every result, by algorithm then path.
    pub fn iter(&self) -> impl Iterator<Item = &FingerprintResult> {
        self.by_algorithm.values().flat_map(BTreeMap::values)
    }

    /// Algorithms that have at least one result.
    pub fn algorithms(&self) -> impl Iterator<Item = Algorithm> + '_ {
        self.by_algorithm.keys().copied()
    }

    #[must_use]
    pub fn count(&self, algorithm: Algorithm) -> usize {
        self.by_algorithm.get(&algorithm).map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_algorithm.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Extend<FingerprintResult> for ResultSet {
    fn extend<T: IntoIterator<Item = FingerprintResult>>(&mut self, iter: T) {
        for result in iter {
            self.insert(result);
        }
    }
}

impl FromIterator<FingerprintResult> for ResultSet {
    fn from_iter<T: IntoIterator<Item = FingerprintResult>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Serialized as `{ "<algorithm>": [result, ...] }`.
impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.by_algorithm
                .iter()
                .map(|(algorithm, results)| (algorithm, results.values().collect::<Vec<_>>())),
        )
    }
}

impl<'de> Deserialize<'de> for ResultSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let lists = BTreeMap::<Algorithm, Vec<FingerprintResult>>::deserialize(deserializer)?;
        let mut set = Self::new();
        for (algorithm, results) in lists {
            for result in results {
                if result.algorithm() != algorithm {
                    return Err(D::Error::custom(format!(
                        "{} result for {} filed under {}",
                        result.algorithm(),
                        result.file().path.display(),
                        algorithm
                    )));
                }
                set.insert(result);
            }
        }
        Ok(set)
    }
}

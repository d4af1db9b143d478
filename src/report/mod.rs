//! The final scan report.
//!
//! [`ScanReport`] is the authoritative record of a scan: what was processed,
//! how each algorithm performed, which groups it found, what failed and
//! why, and what a cleanup did. It is built once from the
//! [`ScanOutcome`] after the orchestrator returns.

pub mod accuracy;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::actions::CleanupReport;
use crate::duplicates::{DuplicateGroup, DuplicateStats};
use crate::fingerprint::{Algorithm, FailureKind};
use crate::scan::ScanOutcome;

pub use accuracy::AccuracyEstimate;

/// Failure examples kept per algorithm.
const ERROR_SAMPLES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub overall: OverallStats,
    pub performance: BTreeMap<Algorithm, PerformanceStats>,
    pub duplicates: BTreeMap<Algorithm, AlgorithmDuplicates>,
    pub errors: BTreeMap<Algorithm, ErrorBreakdown>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub accuracy: BTreeMap<Algorithm, AccuracyEstimate>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallStats {
    pub root: PathBuf,
    pub algorithms: Vec<Algorithm>,
    pub files_discovered: usize,
    pub files_selected: usize,
    /// Files restored from a checkpoint rather than fingerprinted now.
    pub files_resumed: usize,
    /// Distinct files with at least one result.
    pub files_processed: usize,
    /// Distinct files with at least one failed algorithm.
    pub total_errors: usize,
    pub walk_errors: usize,
    pub batches_failed: usize,
    pub duration_secs: f64,
    pub resumed: bool,
    pub interrupted: bool,
    pub timestamp: String,
}

/// Timing and success figures for one algorithm.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    /// Seconds per successful file.
    pub avg_processing_time: f64,
    pub total_processing_time: f64,
    pub min_processing_time: f64,
    pub max_processing_time: f64,
    /// Mean analyzed audio duration over results that report one.
    pub avg_audio_duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmDuplicates {
    #[serde(flatten)]
    pub stats: DuplicateStats,
    pub groups: Vec<DuplicateGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorBreakdown {
    pub total: usize,
    pub by_kind: BTreeMap<FailureKind, usize>,
    pub samples: Vec<ErrorSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSample {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub error: String,
}

impl ScanReport {
    /// Assemble the report.
    ///
    /// `groups` is normally [`ScanOutcome::duplicate_groups`].
    #[must_use]
    pub fn build(
        outcome: &ScanOutcome,
        groups: &BTreeMap<Algorithm, Vec<DuplicateGroup>>,
        cleanup: Option<&CleanupReport>,
    ) -> Self {
        let overall = OverallStats {
            root: outcome.root.clone(),
            algorithms: outcome.algorithms.clone(),
            files_discovered: outcome.counters.files_discovered,
            files_selected: outcome.counters.files_selected,
            files_resumed: outcome.counters.files_resumed,
            files_processed: outcome.files_fingerprinted(),
            total_errors: outcome.files_with_errors(),
            walk_errors: outcome.counters.walk_errors,
            batches_failed: outcome.counters.batches_failed,
            duration_secs: outcome.elapsed.as_secs_f64(),
            resumed: outcome.resumed,
            interrupted: outcome.interrupted,
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        let performance = outcome
            .algorithms
            .iter()
            .map(|&algorithm| (algorithm, performance_for(outcome, algorithm)))
            .collect();

        let duplicates = outcome
            .algorithms
            .iter()
            .map(|&algorithm| {
                let groups = groups.get(&algorithm).cloned().unwrap_or_default();
                let successful = outcome.results.for_algorithm(algorithm).filter(|r| r.is_success()).count();
                let stats = DuplicateStats::from_groups(successful, &groups);
                (algorithm, AlgorithmDuplicates { stats, groups })
            })
            .collect();

        let errors = outcome
            .algorithms
            .iter()
            .map(|&algorithm| (algorithm, errors_for(outcome, algorithm)))
            .collect();

        let accuracy = accuracy::estimate(&outcome.results, groups);

        let mut report = Self {
            overall,
            performance,
            duplicates,
            errors,
            accuracy,
            recommendations: Vec::new(),
            cleanup: cleanup.cloned(),
        };
        report.recommendations = recommendations(&report);
        report
    }

    /// Duplicate groups across all algorithms.
    #[must_use]
    pub fn total_groups(&self) -> usize {
        self.duplicates.values().map(|d| d.stats.duplicate_groups).sum()
    }
}

fn performance_for(outcome: &ScanOutcome, algorithm: Algorithm) -> PerformanceStats {
    let mut stats = PerformanceStats::default();
    let mut times = Vec::new();
    let mut durations = Vec::new();

    for result in outcome.results.for_algorithm(algorithm) {
        stats.total_processed += 1;
        if result.is_success() {
            stats.successful += 1;
            times.push(result.processing_time().as_secs_f64());
            if result.duration_secs() > 0.0 {
                durations.push(result.duration_secs());
            }
        } else {
            stats.failed += 1;
        }
    }

    if stats.total_processed > 0 {
        stats.success_rate = stats.successful as f64 / stats.total_processed as f64;
    }
    if !times.is_empty() {
        stats.total_processing_time = times.iter().sum();
        stats.avg_processing_time = stats.total_processing_time / times.len() as f64;
        stats.min_processing_time = times.iter().copied().fold(f64::INFINITY, f64::min);
        stats.max_processing_time = times.iter().copied().fold(0.0, f64::max);
    }
    if !durations.is_empty() {
        stats.avg_audio_duration = durations.iter().sum::<f64>() / durations.len() as f64;
    }
    stats
}

fn errors_for(outcome: &ScanOutcome, algorithm: Algorithm) -> ErrorBreakdown {
    let mut breakdown = ErrorBreakdown::default();
    for result in outcome.results.for_algorithm(algorithm) {
        let Some(kind) = result.failure_kind() else {
            continue;
        };
        breakdown.total += 1;
        *breakdown.by_kind.entry(kind).or_default() += 1;
        if breakdown.samples.len() < ERROR_SAMPLES {
            breakdown.samples.push(ErrorSample {
                path: result.file().path.clone(),
                kind,
                error: result.error().unwrap_or_default().to_string(),
            });
        }
    }
    breakdown
}

fn recommendations(report: &ScanReport) -> Vec<String> {
    let mut out = Vec::new();

    if report.overall.interrupted {
        out.push("Scan was interrupted: run it again to resume from the checkpoint".to_string());
    }

    let fastest = report
        .performance
        .iter()
        .filter(|(_, p)| p.successful > 0)
        .min_by(|a, b| a.1.avg_processing_time.total_cmp(&b.1.avg_processing_time));
    if let Some((algorithm, perf)) = fastest {
        out.push(format!(
            "Performance: {algorithm} is fastest at {:.3}s/file",
            perf.avg_processing_time
        ));
    }

    let most_groups = report
        .duplicates
        .iter()
        .filter(|(_, d)| d.stats.duplicate_groups > 0)
        .max_by_key(|(_, d)| d.stats.duplicate_groups);
    if let Some((algorithm, dups)) = most_groups {
        out.push(format!(
            "Duplicate detection: {algorithm} found the most duplicates ({} groups)",
            dups.stats.duplicate_groups
        ));
    }

    let best_accuracy = report
        .accuracy
        .iter()
        .max_by(|a, b| a.1.accuracy.total_cmp(&b.1.accuracy));
    if let Some((algorithm, estimate)) = best_accuracy {
        if estimate.accuracy < 0.9 {
            out.push(format!(
                "Accuracy: best estimate is {algorithm} at {:.1}%, below the 90% target",
                estimate.accuracy * 100.0
            ));
        }
    }

    let processed = report.overall.files_processed;
    if processed >= 10_000 {
        out.push("Scale: processed 10,000+ files".to_string());
    } else if processed >= 1_000 {
        out.push("Scale: processed 1,000+ files; consider a larger run".to_string());
    }

    if processed > 0 {
        let rate = report.overall.total_errors as f64 / processed as f64;
        let tier = if rate < 0.05 {
            "Error rate: excellent (<5% of files)"
        } else if rate < 0.15 {
            "Error rate: acceptable (5-15% of files), keep an eye on it"
        } else {
            "Error rate: high (>15% of files), investigate before cleaning up"
        };
        out.push(tier.to_string());
    }

    out
}

//! Human-readable terminal summary.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::report::ScanReport;

/// Write a short summary of `report` to `out`.
///
/// Colors follow yansi's global switch; call `yansi::disable()` for plain
/// output.
pub fn write_summary<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let overall = &report.overall;

    writeln!(out)?;
    writeln!(out, "{}", "Scan summary".bold())?;
    writeln!(out, "  Root:        {}", overall.root.display())?;
    writeln!(
        out,
        "  Files:       {} processed of {} selected ({} discovered, {} from checkpoint)",
        overall.files_processed, overall.files_selected, overall.files_discovered, overall.files_resumed
    )?;
    let errors = if overall.total_errors == 0 {
        "0".green().to_string()
    } else {
        overall.total_errors.to_string().yellow().to_string()
    };
    writeln!(out, "  Errors:      {errors}")?;
    writeln!(out, "  Duration:    {:.1}s", overall.duration_secs)?;
    if overall.interrupted {
        writeln!(
            out,
            "  {}",
            "Interrupted: partial results, rerun to resume".yellow().bold()
        )?;
    }

    for (algorithm, dups) in &report.duplicates {
        let stats = &dups.stats;
        writeln!(out)?;
        writeln!(out, "{}", algorithm.as_str().cyan().bold())?;
        if let Some(perf) = report.performance.get(algorithm) {
            writeln!(
                out,
                "  {} ok, {} failed, {:.3}s/file",
                perf.successful, perf.failed, perf.avg_processing_time
            )?;
        }
        writeln!(
            out,
            "  {} groups, {} duplicate files ({:.1}%), largest group {}",
            stats.duplicate_groups,
            stats.duplicate_files,
            stats.duplication_rate * 100.0,
            stats.largest_group
        )?;
        writeln!(
            out,
            "  Reclaimable: {}",
            ByteSize::b(stats.reclaimable_bytes).to_string().green()
        )?;
        if let Some(estimate) = report.accuracy.get(algorithm) {
            writeln!(
                out,
                "  Name-based accuracy: {:.1}% ({}/{} pairs)",
                estimate.accuracy * 100.0,
                estimate.detected_pairs,
                estimate.expected_pairs
            )?;
        }
    }

    if let Some(cleanup) = &report.cleanup {
        writeln!(out)?;
        writeln!(out, "{} {}", "Cleanup:".bold(), cleanup.summary())?;
        for failure in &cleanup.failures {
            writeln!(out, "  {} {}: {}", "failed".red(), failure.path.display(), failure.error)?;
        }
    }

    if !report.recommendations.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Recommendations".bold())?;
        for line in &report.recommendations {
            writeln!(out, "  - {line}")?;
        }
    }

    Ok(())
}

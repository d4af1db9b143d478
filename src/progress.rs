//! Progress reporting using indicatif.
//!
//! The orchestrator reports through the [`ProgressCallback`] trait; [`Progress`]
//! renders it as a spinner while walking and a bar while batches run.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::scan::{BatchProgress, ScanPhase};

/// Receives progress updates from a scan.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - The phase being entered
    /// * `total` - Files the phase will cover, or 0 when unknown
    fn on_phase_start(&self, phase: ScanPhase, total: usize);

    /// Called for each file found while walking.
    fn on_file_discovered(&self, _count: usize, _path: &Path) {}

    /// Called on the aggregating thread after each batch.
    fn on_batch_completed(&self, progress: &BatchProgress);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: ScanPhase);

    /// Free-form status line.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress reporter.
pub struct Progress {
    multi: MultiProgress,
    walking: Mutex<Option<ProgressBar>>,
    batches: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use trackdupe::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            walking: Mutex::new(None),
            batches: Mutex::new(None),
            quiet,
        }
    }

    fn walking_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn batch_style() -> ProgressStyle {
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    fn with_bar(slot: &Mutex<Option<ProgressBar>>, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = slot.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn store(slot: &Mutex<Option<ProgressBar>>, pb: ProgressBar) {
        if let Ok(mut guard) = slot.lock() {
            *guard = Some(pb);
        }
    }

    fn finish(slot: &Mutex<Option<ProgressBar>>, message: &'static str) {
        if let Ok(mut guard) = slot.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_with_message(message);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: ScanPhase, total: usize) {
        if self.quiet {
            return;
        }

        match phase {
            ScanPhase::ScanningFilesystem => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::walking_style());
                pb.set_message("Scanning library");
                pb.enable_steady_tick(Duration::from_millis(100));
                Self::store(&self.walking, pb);
            }
            ScanPhase::BatchDispatch => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::batch_style());
                pb.set_message("Fingerprinting");
                Self::store(&self.batches, pb);
            }
            _ => {}
        }
    }

    fn on_file_discovered(&self, count: usize, path: &Path) {
        if self.quiet {
            return;
        }
        Self::with_bar(&self.walking, |pb| {
            pb.set_position(count as u64);
            pb.set_message(truncate_path(&path.to_string_lossy(), 40));
        });
    }

    fn on_batch_completed(&self, progress: &BatchProgress) {
        if self.quiet {
            return;
        }
        Self::with_bar(&self.batches, |pb| {
            pb.set_position(progress.processed as u64);
            pb.set_message(batch_message(progress));
        });
    }

    fn on_phase_end(&self, phase: ScanPhase) {
        if self.quiet {
            return;
        }

        match phase {
            ScanPhase::ScanningFilesystem => Self::finish(&self.walking, "Scan complete"),
            ScanPhase::BatchDispatch => Self::finish(&self.batches, "Fingerprinting complete"),
            _ => {}
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.multi.println(message).is_err() {
            log::info!("{message}");
        }
    }
}

/// Status text shown next to the batch bar.
fn batch_message(progress: &BatchProgress) -> String {
    let eta = progress
        .eta
        .map_or_else(|| "--".to_string(), |eta| format!("{}s", eta.as_secs()));
    format!(
        "batch {}/{} | {} errors | {:.1} files/s | ETA {}",
        progress.batches_done, progress.batches_total, progress.errors, progress.rate, eta
    )
}

/// Truncate a path for display, keeping the file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name.chars().skip(name_len.saturating_sub(max_len.saturating_sub(3))).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_path_untouched() {
        assert_eq!(truncate_path("/a/b.mp3", 30), "/a/b.mp3");
    }

    #[test]
    fn test_truncate_keeps_file_name() {
        let path = "/very/long/library/path/Artist/Album/01 Track.flac";
        assert_eq!(truncate_path(path, 30), ".../01 Track.flac");
    }

    #[test]
    fn test_truncate_long_file_name_on_char_boundary() {
        let name = "ü".repeat(50);
        let out = truncate_path(&format!("/m/{name}.mp3"), 20);
        assert!(out.starts_with("..."));
        assert_eq!(out.chars().count(), 20);
    }

    #[test]
    fn test_batch_message() {
        let progress = BatchProgress {
            processed: 50,
            total: 100,
            errors: 2,
            batches_done: 1,
            batches_total: 2,
            rate: 12.5,
            eta: Some(Duration::from_secs(4)),
        };
        assert_eq!(batch_message(&progress), "batch 1/2 | 2 errors | 12.5 files/s | ETA 4s");
    }

    #[test]
    fn test_quiet_progress_ignores_updates() {
        let progress = Progress::new(true);
        progress.on_phase_start(ScanPhase::BatchDispatch, 10);
        progress.on_file_discovered(1, Path::new("/m/a.mp3"));
        progress.on_phase_end(ScanPhase::BatchDispatch);
        assert!(progress.batches.lock().unwrap().is_none());
    }
}

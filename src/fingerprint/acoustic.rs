//! Chromaprint fingerprints through the external `fpcalc` tool.
//!
//! The executable is located once when capabilities are detected. If it is
//! missing, the acoustic algorithm is simply not offered.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use super::{Computed, Deadline, FingerprintError};

/// Environment variable that points at a specific `fpcalc` binary.
pub const FPCALC_ENV: &str = "TRACKDUPE_FPCALC";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A located `fpcalc` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcousticBackend {
    executable: PathBuf,
}

impl AcousticBackend {
    #[must_use]
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }

    /// Find `fpcalc` via `TRACKDUPE_FPCALC` or `PATH`.
    #[must_use]
    pub fn discover() -> Option<Self> {
        if let Some(explicit) = std::env::var_os(FPCALC_ENV) {
            let path = PathBuf::from(explicit);
            if path.is_file() {
                return Some(Self::new(path));
            }
            log::warn!("{} points at {}, which is not a file", FPCALC_ENV, path.display());
        }
        which::which("fpcalc").ok().map(Self::new)
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Run `fpcalc -raw` on the leading `window_secs` of `path`.
    pub(crate) fn fingerprint(
        &self,
        path: &Path,
        window_secs: f64,
        deadline: &Deadline,
    ) -> Result<Computed, FingerprintError> {
        let length = window_secs.ceil().max(1.0) as u64;
        let mut child = Command::new(&self.executable)
            .arg("-raw")
            .arg("-length")
            .arg(length.to_string())
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FingerprintError::Backend(format!("cannot start {}: {e}", self.executable.display())))?;

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if deadline.is_expired() => {
                    kill(&mut child);
                    deadline.check()?;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill(&mut child);
                    return Err(FingerprintError::Backend(e.to_string()));
                }
            }
        };

        let stdout = read_pipe(child.stdout.take());
        if !status.success() {
            let stderr = read_pipe(child.stderr.take());
            let message = stderr.trim();
            return Err(FingerprintError::Backend(if message.is_empty() {
                format!("exited with {status}")
            } else {
                message.to_string()
            }));
        }

        let parsed = parse_output(&stdout)?;
        Ok(Computed {
            fingerprint: blake3::hash(parsed.raw.as_bytes()).to_hex().to_string(),
            duration_secs: parsed.duration_secs.min(window_secs),
        })
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn read_pipe<R: Read>(pipe: Option<R>) -> String {
    let mut out = String::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_string(&mut out);
    }
    out
}

/// `DURATION=` and `FINGERPRINT=` lines of fpcalc's text output.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FpcalcOutput {
    pub duration_secs: f64,
    pub raw: String,
}

pub(crate) fn parse_output(text: &str) -> Result<FpcalcOutput, FingerprintError> {
    let mut duration_secs = 0.0;
    let mut raw = None;

    for line in text.lines() {
        if let Some(value) = line.strip_prefix("DURATION=") {
            duration_secs = value.trim().parse().unwrap_or(0.0);
        } else if let Some(value) = line.strip_prefix("FINGERPRINT=") {
            raw = Some(value.trim().to_string());
        }
    }

    match raw {
        Some(raw) if !raw.is_empty() => Ok(FpcalcOutput { duration_secs, raw }),
        _ => Err(FingerprintError::EmptyStream),
    }
}

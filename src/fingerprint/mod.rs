//! Content fingerprinting.
//!
//! Three interchangeable algorithms turn one audio file into a fingerprint
//! string; two files are duplicate candidates under an algorithm exactly when
//! their fingerprint strings are equal.
//!
//! - [`Algorithm::ByteHash`]: BLAKE3 of the first bytes of the file
//! - [`Algorithm::Spectral`]: BLAKE3 of a quantized spectral feature vector
//! - [`Algorithm::Acoustic`]: Chromaprint via `fpcalc`, when installed
//!
//! [`Fingerprinter::fingerprint`] never fails past its boundary: every error,
//! including a panic inside a decoder, comes back as a failure
//! [`FingerprintResult`].

pub mod acoustic;
pub mod byte_hash;
mod decode;
pub mod fft;
mod result;
pub mod spectral;

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::scanner::FileRecord;

pub use acoustic::AcousticBackend;
pub use result::{FailureKind, FingerprintOutcome, FingerprintResult, InvalidResult};

/// Fingerprinting algorithms. The set is closed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Hash of the leading raw bytes. Finds bit-identical copies only.
    #[value(name = "byte_hash", alias = "byte-hash")]
    ByteHash,
    /// Hash of averaged spectral features over the leading window.
    #[value(name = "spectral")]
    Spectral,
    /// Chromaprint acoustic fingerprint (needs `fpcalc`).
    #[value(name = "acoustic")]
    Acoustic,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::ByteHash, Algorithm::Spectral, Algorithm::Acoustic];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ByteHash => "byte_hash",
            Self::Spectral => "spectral",
            Self::Acoustic => "acoustic",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::ByteHash => "BLAKE3 of the leading bytes (exact copies)",
            Self::Spectral => "quantized spectral features of the leading window (re-encodes, best effort)",
            Self::Acoustic => "Chromaprint acoustic fingerprint via fpcalc",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables shared by all algorithms.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintOptions {
    /// Bytes read by the byte-prefix hash.
    pub prefix_bytes: u64,
    /// Seconds of audio analyzed by the spectral and acoustic algorithms.
    pub window_secs: f64,
    /// Analysis sample rate for the spectral algorithm.
    pub sample_rate: u32,
    /// Per-file time limit.
    pub timeout: Duration,
}

impl Default for FingerprintOptions {
    fn default() -> Self {
        Self {
            prefix_bytes: byte_hash::DEFAULT_PREFIX_BYTES,
            window_secs: 30.0,
            sample_rate: 22_050,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Errors raised inside an algorithm. Converted into failure results by
/// [`Fingerprinter`].
#[derive(thiserror::Error, Debug)]
pub enum FingerprintError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No audio samples decoded")]
    EmptyStream,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Algorithm '{0}' is not available on this system")]
    Unavailable(Algorithm),

    #[error("fpcalc failed: {0}")]
    Backend(String),
}

impl FingerprintError {
    pub(crate) fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Category recorded in the failure result.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::PermissionDenied(_) => FailureKind::PermissionDenied,
            Self::Io { .. } => FailureKind::Io,
            Self::Unsupported(_) => FailureKind::Unsupported,
            Self::Decode(_) | Self::Backend(_) => FailureKind::Decode,
            Self::EmptyStream => FailureKind::EmptyStream,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Unavailable(_) => FailureKind::Unavailable,
        }
    }
}

/// Per-file time budget, checked cooperatively by every algorithm.
///
/// File reads go through [`TimedReader`], so the budget also covers format
/// probing. A single `read` blocked inside the kernel (a hung network mount,
/// say) is not interrupted; the timeout fires once it returns.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    #[must_use]
    pub fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            started: Instant::now(),
            limit: None,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.started.elapsed() >= limit)
    }

    /// Time left, `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.saturating_sub(self.started.elapsed()))
    }

    pub fn check(&self) -> Result<(), FingerprintError> {
        match self.limit {
            Some(limit) if self.is_expired() => Err(FingerprintError::Timeout(limit)),
            _ => Ok(()),
        }
    }

    /// Map a read error, turning a [`TimedReader`] expiry back into a timeout.
    pub(crate) fn map_io(&self, path: &Path, error: io::Error) -> FingerprintError {
        match self.limit {
            Some(limit) if error.kind() == io::ErrorKind::TimedOut && self.is_expired() => {
                FingerprintError::Timeout(limit)
            }
            _ => FingerprintError::from_io(path, error),
        }
    }
}

/// Reader that fails with [`io::ErrorKind::TimedOut`] once its deadline passes.
#[derive(Debug)]
pub(crate) struct TimedReader<R> {
    inner: R,
    deadline: Deadline,
}

impl<R> TimedReader<R> {
    pub(crate) fn new(inner: R, deadline: Deadline) -> Self {
        Self { inner, deadline }
    }

    pub(crate) fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: Read> Read for TimedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.deadline.is_expired() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "fingerprint deadline expired"));
        }
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for TimedReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// What an algorithm produced for one file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Computed {
    pub fingerprint: String,
    pub duration_secs: f64,
}

/// Optional backends, resolved once at process start.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    acoustic: Option<AcousticBackend>,
}

impl Capabilities {
    /// Probe the system for optional backends.
    #[must_use]
    pub fn detect() -> Self {
        let acoustic = AcousticBackend::discover();
        match &acoustic {
            Some(backend) => log::info!("Acoustic fingerprinting via {}", backend.executable().display()),
            None => log::info!("fpcalc not found; acoustic fingerprinting disabled"),
        }
        Self { acoustic }
    }

    /// Built-in algorithms only.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_acoustic(mut self, backend: AcousticBackend) -> Self {
        self.acoustic = Some(backend);
        self
    }

    #[must_use]
    pub fn acoustic(&self) -> Option<&AcousticBackend> {
        self.acoustic.as_ref()
    }

    #[must_use]
    pub fn is_available(&self, algorithm: Algorithm) -> bool {
        match algorithm {
            Algorithm::ByteHash | Algorithm::Spectral => true,
            Algorithm::Acoustic => self.acoustic.is_some(),
        }
    }

    /// Algorithms usable on this system.
    #[must_use]
    pub fn available(&self) -> Vec<Algorithm> {
        Algorithm::ALL
            .into_iter()
            .filter(|a| self.is_available(*a))
            .collect()
    }

    /// The requested algorithms that are available, first occurrence order,
    /// without duplicates. Dropped algorithms are logged.
    #[must_use]
    pub fn resolve(&self, requested: &[Algorithm]) -> Vec<Algorithm> {
        let mut resolved = Vec::with_capacity(requested.len());
        for &algorithm in requested {
            if resolved.contains(&algorithm) {
                continue;
            }
            if self.is_available(algorithm) {
                resolved.push(algorithm);
            } else {
                log::warn!("Algorithm '{}' requested but not available; skipping", algorithm);
            }
        }
        resolved
    }
}

/// The seam the scan orchestrator fingerprints through.
pub trait FingerprintEngine: Send + Sync {
    /// Fingerprint one file. Must return a result for every input.
    fn fingerprint(&self, algorithm: Algorithm, file: &FileRecord) -> FingerprintResult;
}

/// Runs the configured algorithms against single files.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    options: FingerprintOptions,
    capabilities: Capabilities,
}

impl Fingerprinter {
    #[must_use]
    pub fn new(options: FingerprintOptions, capabilities: Capabilities) -> Self {
        Self {
            options,
            capabilities,
        }
    }

    #[must_use]
    pub fn options(&self) -> &FingerprintOptions {
        &self.options
    }

    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Fingerprint `file` with `algorithm`.
    pub fn fingerprint(&self, algorithm: Algorithm, file: &FileRecord) -> FingerprintResult {
        let started = Instant::now();
        let deadline = Deadline::new(self.options.timeout);
        let computed = panic::catch_unwind(AssertUnwindSafe(|| self.compute(algorithm, &file.path, &deadline)));
        let elapsed = started.elapsed();

        match computed {
            Ok(Ok(computed)) => {
                log::trace!("{} {}: {}", algorithm, file.path.display(), computed.fingerprint);
                FingerprintResult::success(
                    file.clone(),
                    algorithm,
                    computed.fingerprint,
                    computed.duration_secs,
                    elapsed,
                )
                .unwrap_or_else(|e| {
                    FingerprintResult::failure(file.clone(), algorithm, FailureKind::Decode, e.to_string(), elapsed)
                })
            }
            Ok(Err(e)) => {
                log::debug!("{} failed for {}: {}", algorithm, file.path.display(), e);
                FingerprintResult::failure(file.clone(), algorithm, e.kind(), e.to_string(), elapsed)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::warn!("{} panicked on {}: {}", algorithm, file.path.display(), message);
                FingerprintResult::failure(
                    file.clone(),
                    algorithm,
                    FailureKind::Panic,
                    format!("internal error: {message}"),
                    elapsed,
                )
            }
        }
    }

    /// Stat `path` and fingerprint it. A file that cannot be stat'ed still
    /// yields a failure result.
    pub fn fingerprint_path(&self, algorithm: Algorithm, path: &Path) -> FingerprintResult {
        match FileRecord::from_path(path) {
            Ok(record) => self.fingerprint(algorithm, &record),
            Err(e) => {
                let record = FileRecord::new(path.to_path_buf(), 0, std::time::SystemTime::UNIX_EPOCH);
                let kind = match e {
                    crate::scanner::ScanError::NotFound(_) => FailureKind::NotFound,
                    crate::scanner::ScanError::PermissionDenied(_) => FailureKind::PermissionDenied,
                    _ => FailureKind::Io,
                };
                FingerprintResult::failure(record, algorithm, kind, e.to_string(), Duration::ZERO)
            }
        }
    }

    fn compute(&self, algorithm: Algorithm, path: &Path, deadline: &Deadline) -> Result<Computed, FingerprintError> {
        match algorithm {
            Algorithm::ByteHash => byte_hash::fingerprint(path, self.options.prefix_bytes, deadline),
            Algorithm::Spectral => spectral::fingerprint(
                path,
                &spectral::SpectralConfig::new(self.options.sample_rate, self.options.window_secs),
                deadline,
            ),
            Algorithm::Acoustic => match &self.capabilities.acoustic {
                Some(backend) => backend.fingerprint(path, self.options.window_secs, deadline),
                None => Err(FingerprintError::Unavailable(Algorithm::Acoustic)),
            },
        }
    }
}

impl FingerprintEngine for Fingerprinter {
    fn fingerprint(&self, algorithm: Algorithm, file: &FileRecord) -> FingerprintResult {
        Fingerprinter::fingerprint(self, algorithm, file)
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

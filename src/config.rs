//! Layered configuration.
//!
//! Values are merged with figment, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config FILE`, else `<platform config dir>/trackdupe/config.toml`)
//! 3. `TRACKDUPE_*` environment variables (`__` separates nested keys)
//! 4. command-line flags
//!
//! ```toml
//! algorithms = ["byte_hash", "spectral"]
//! batch_size = 200
//! checkpoint_interval = 10
//! ignore_patterns = ["Podcasts/**"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::fingerprint::{byte_hash::DEFAULT_PREFIX_BYTES, Algorithm, FingerprintOptions};
use crate::scan::{default_worker_count, ScanOptions, DEFAULT_CHECKPOINT_FILE};
use crate::scanner::{WalkerConfig, DEFAULT_EXTENSIONS};

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "TRACKDUPE_";

/// Default JSON report location.
pub const DEFAULT_REPORT_FILE: &str = "trackdupe_report.json";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Effective settings for a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub algorithms: Vec<Algorithm>,
    pub batch_size: usize,
    pub worker_count: usize,
    pub resume: bool,
    pub checkpoint_path: PathBuf,
    pub checkpoint_interval: usize,
    pub keep_checkpoint: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_seed: Option<u64>,
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub skip_hidden: bool,
    pub follow_symlinks: bool,
    pub prefix_bytes: u64,
    pub window_secs: f64,
    pub sample_rate: u32,
    pub timeout_secs: u64,
    pub report_path: PathBuf,
    /// Parent directory for quarantine folders.
    pub quarantine_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let fingerprint = FingerprintOptions::default();
        Self {
            algorithms: vec![Algorithm::Spectral, Algorithm::ByteHash],
            batch_size: 100,
            worker_count: default_worker_count(),
            resume: true,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
            checkpoint_interval: 5,
            keep_checkpoint: false,
            max_files: None,
            sample_size: None,
            sample_seed: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            ignore_patterns: Vec::new(),
            skip_hidden: false,
            follow_symlinks: false,
            prefix_bytes: DEFAULT_PREFIX_BYTES,
            window_secs: fingerprint.window_secs,
            sample_rate: fingerprint.sample_rate,
            timeout_secs: fingerprint.timeout.as_secs(),
            report_path: PathBuf::from(DEFAULT_REPORT_FILE),
            quarantine_dir: PathBuf::from("."),
        }
    }
}

/// Values set on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithms: Option<Vec<Algorithm>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_interval: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_checkpoint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_symlinks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine_dir: Option<PathBuf>,
}

impl Config {
    /// Platform config file, e.g. `~/.config/trackdupe/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "trackdupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Merge every layer and validate the result.
    ///
    /// An explicit `file` must exist; the platform default is optional.
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let file = match file {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };
        let config: Self = Self::figment(file.as_deref(), overrides).extract()?;
        config.validate()?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// The layered figment without extracting it.
    #[must_use]
    pub fn figment(file: Option<&Path>, overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            log::debug!("Reading config file {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::globals(overrides))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.algorithms.is_empty() {
            return Err(ConfigError::Invalid("algorithms must not be empty".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid("extensions must not be empty".to_string()));
        }
        let positive = [
            ("batch_size", Some(self.batch_size as u64)),
            ("worker_count", Some(self.worker_count as u64)),
            ("checkpoint_interval", Some(self.checkpoint_interval as u64)),
            ("max_files", self.max_files.map(|v| v as u64)),
            ("sample_size", self.sample_size.map(|v| v as u64)),
            ("prefix_bytes", Some(self.prefix_bytes)),
            ("sample_rate", Some(u64::from(self.sample_rate))),
            ("timeout_secs", Some(self.timeout_secs)),
        ];
        for (name, value) in positive {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(ConfigError::Invalid("window_secs must be a positive number".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            extensions: self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            ignore_patterns: self.ignore_patterns.clone(),
        }
    }

    #[must_use]
    pub fn fingerprint_options(&self) -> FingerprintOptions {
        FingerprintOptions {
            prefix_bytes: self.prefix_bytes,
            window_secs: self.window_secs,
            sample_rate: self.sample_rate,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Orchestrator options for `algorithms`, which should already be
    /// resolved against the system's capabilities.
    #[must_use]
    pub fn scan_options(&self, algorithms: Vec<Algorithm>) -> ScanOptions {
        ScanOptions {
            algorithms,
            batch_size: self.batch_size,
            worker_count: self.worker_count,
            resume: self.resume,
            checkpoint_path: self.checkpoint_path.clone(),
            checkpoint_interval: self.checkpoint_interval,
            keep_checkpoint: self.keep_checkpoint,
            max_files: self.max_files,
            sample_size: self.sample_size,
            sample_seed: self.sample_seed,
            walker: self.walker_config(),
        }
    }

    /// The configuration as TOML, for `trackdupe config`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

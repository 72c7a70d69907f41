//! Configuration module
//!
//! Benchmark parameters, their validation, and loading from TOML.

use crate::{DiskRampError, Result, APP_NAME, CONFIG_FILE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Bytes written by one write call (100 MiB)
pub const DEFAULT_PORTION_SIZE: usize = 100 * 1024 * 1024;
/// Sequential writes of the portion per file
pub const DEFAULT_PORTIONS_COUNT: u32 = 10;
/// Target duration of a single-writer pass
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(2);
/// Consecutive non-improving phases before the scan stops
pub const DEFAULT_MAX_SLOW_PHASES: u8 = 2;
/// Highest writer count the scan will try
pub const DEFAULT_MAX_THREADS: usize = 64;
/// Writers run on tokio's blocking pool, which holds at most 512 threads by default
pub const MAX_WRITER_THREADS: usize = 512;

/// Benchmark configuration structure containing all test parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Directory on the volume under test
    pub target_dir: PathBuf,
    /// Size of the workload buffer before calibration (in bytes)
    pub portion_size: usize,
    /// How many times each writer writes the buffer to its file
    pub portions_count: u32,
    /// Time budget a single-writer pass is sized to fit
    #[serde(with = "duration_str")]
    pub time_budget: Duration,
    /// Consecutive slower phases that end the scan
    pub max_slow_phases: u8,
    /// Upper bound on concurrent writers
    pub max_threads: usize,
    /// Flush each file to stable storage before stopping its timer
    pub sync_data: bool,
    /// Leave benchmark files on disk after the run
    pub keep_files: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            target_dir: std::env::temp_dir().join(APP_NAME),
            portion_size: DEFAULT_PORTION_SIZE,
            portions_count: DEFAULT_PORTIONS_COUNT,
            time_budget: DEFAULT_TIME_BUDGET,
            max_slow_phases: DEFAULT_MAX_SLOW_PHASES,
            max_threads: DEFAULT_MAX_THREADS,
            sync_data: false,
            keep_files: false,
        }
    }
}

impl BenchmarkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.target_dir.exists() {
            return Err(DiskRampError::ConfigError(format!(
                "Target directory does not exist: {}",
                self.target_dir.display()
            )));
        }

        if !self.target_dir.is_dir() {
            return Err(DiskRampError::ConfigError(format!(
                "Target path is not a directory: {}",
                self.target_dir.display()
            )));
        }

        if self.portion_size == 0 {
            return Err(DiskRampError::ConfigError(
                "Portion size must be greater than 0".to_string(),
            ));
        }

        const MAX_PORTION_SIZE: u64 = 4 * 1024 * 1024 * 1024; // 4 GiB
        if self.portion_size as u64 > MAX_PORTION_SIZE {
            return Err(DiskRampError::ConfigError(format!(
                "Portion size too large: {} bytes (max: {} bytes)",
                self.portion_size, MAX_PORTION_SIZE
            )));
        }

        if self.portions_count == 0 {
            return Err(DiskRampError::ConfigError(
                "Portions count must be greater than 0".to_string(),
            ));
        }

        if self.time_budget.is_zero() {
            return Err(DiskRampError::ConfigError(
                "Time budget must be greater than 0".to_string(),
            ));
        }

        if self.max_slow_phases == 0 {
            return Err(DiskRampError::ConfigError(
                "Max slow phases must be at least 1".to_string(),
            ));
        }

        if self.max_threads < 2 || self.max_threads > MAX_WRITER_THREADS {
            return Err(DiskRampError::ConfigError(format!(
                "Max threads must be between 2 and {}",
                MAX_WRITER_THREADS
            )));
        }

        Ok(())
    }

    pub fn with_target_dir(mut self, path: PathBuf) -> Self {
        self.target_dir = path;
        self
    }

    pub fn with_portion_size(mut self, size: usize) -> Self {
        self.portion_size = size;
        self
    }

    pub fn with_portions_count(mut self, count: u32) -> Self {
        self.portions_count = count;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_max_slow_phases(mut self, count: u8) -> Self {
        self.max_slow_phases = count;
        self
    }

    pub fn with_max_threads(mut self, count: usize) -> Self {
        self.max_threads = count;
        self
    }

    pub fn with_sync_data(mut self, sync: bool) -> Self {
        self.sync_data = sync;
        self
    }

    pub fn with_keep_files(mut self, keep: bool) -> Self {
        self.keep_files = keep;
        self
    }

    /// Load configuration from `path`, or from the standard config file location.
    /// Returns defaults if no path is given and the standard file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::config_file_path() {
                Ok(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&config_path).map_err(|e| {
            DiskRampError::ConfigError(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    /// Get the standard configuration file path (`<config_dir>/diskramp/diskramp.toml`)
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DiskRampError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

/// Durations as humantime strings (`"2s"`, `"1500ms"`)
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

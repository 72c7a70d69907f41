//! diskramp - sequential write scaling benchmark
//!
//! Writes large random buffers to a target directory from a growing number
//! of concurrent writers and stops once adding writers no longer improves
//! aggregate throughput.

use std::fmt;
use std::path::PathBuf;

pub mod bench;
pub mod config;
pub mod io;
pub mod models;
pub mod util;

/// Stage of a single file write at which a writer gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    /// Target file could not be opened or created
    Open,
    /// The portion write with the given zero-based index failed or was short
    Write { index: u32 },
    /// Flushing the file to stable storage failed
    Sync,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStage::Open => write!(f, "open"),
            WriteStage::Write { index } => write!(f, "write of portion {}", index),
            WriteStage::Sync => write!(f, "sync"),
        }
    }
}

/// A single writer failed to put its workload on disk
#[derive(Debug)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub stage: WriteStage,
    pub source: std::io::Error,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {}: {}", self.stage, self.path.display(), self.source)
    }
}

// Common error types
#[derive(Debug)]
pub enum DiskRampError {
    /// I/O operation outside of a benchmark write failed
    IoError(std::io::Error),
    /// Configuration validation or parsing error
    ConfigError(String),
    /// Workload buffer could not be allocated
    AllocationError { requested: usize },
    /// A writer could not open, write or sync its target file
    WriteFailure(WriteFailure),
    /// At least one writer of a concurrent phase failed
    PhaseFailure {
        thread_count: usize,
        failed_writers: usize,
        first_error: String,
    },
    /// Benchmark orchestration error (worker task panicked or was aborted)
    BenchmarkError(String),
    /// Report export error
    PersistenceError(String),
}

impl fmt::Display for DiskRampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskRampError::IoError(err) => write!(f, "I/O error: {}", err),
            DiskRampError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            DiskRampError::AllocationError { requested } => {
                write!(f, "Failed to allocate a workload buffer of {} bytes", requested)
            }
            DiskRampError::WriteFailure(failure) => write!(f, "Write failure: {}", failure),
            DiskRampError::PhaseFailure {
                thread_count,
                failed_writers,
                first_error,
            } => write!(
                f,
                "Phase with {} threads failed ({} writer(s)): {}",
                thread_count, failed_writers, first_error
            ),
            DiskRampError::BenchmarkError(msg) => write!(f, "Benchmark error: {}", msg),
            DiskRampError::PersistenceError(msg) => write!(f, "Report export error: {}", msg),
        }
    }
}

impl std::error::Error for DiskRampError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiskRampError::IoError(err) => Some(err),
            DiskRampError::WriteFailure(failure) => Some(&failure.source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DiskRampError {
    fn from(err: std::io::Error) -> Self {
        DiskRampError::IoError(err)
    }
}

impl From<WriteFailure> for DiskRampError {
    fn from(failure: WriteFailure) -> Self {
        DiskRampError::WriteFailure(failure)
    }
}

impl From<serde_json::Error> for DiskRampError {
    fn from(err: serde_json::Error) -> Self {
        DiskRampError::PersistenceError(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for DiskRampError {
    fn from(err: toml::de::Error) -> Self {
        DiskRampError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

/// Result type alias for diskramp operations
pub type Result<T> = std::result::Result<T, DiskRampError>;

/// Error presentation helpers for the command line
pub mod error {
    use super::{DiskRampError, WriteStage};
    use std::io::ErrorKind;

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &DiskRampError) -> String {
        match error {
            DiskRampError::AllocationError { requested } => format!(
                "Not enough memory for a {} byte workload buffer. Try a smaller --portion-size.",
                requested
            ),
            DiskRampError::WriteFailure(failure) => match (failure.stage, failure.source.kind()) {
                (WriteStage::Open, ErrorKind::PermissionDenied) => format!(
                    "Cannot create {}. Check that the target directory is writable.",
                    failure.path.display()
                ),
                (WriteStage::Open, ErrorKind::NotFound) => format!(
                    "Cannot create {}. The target directory does not exist.",
                    failure.path.display()
                ),
                (WriteStage::Write { .. }, _) | (WriteStage::Sync, _) => format!(
                    "Writing {} failed ({}). The volume may be full or failing.",
                    failure.path.display(),
                    failure.source
                ),
                _ => error.to_string(),
            },
            DiskRampError::ConfigError(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            DiskRampError::PersistenceError(_) => {
                "Failed to export the report. Check the output path and permissions.".to_string()
            }
            _ => error.to_string(),
        }
    }

    /// Whether the error means the volume could not sustain the attempted load
    pub fn is_volume_failure(error: &DiskRampError) -> bool {
        matches!(
            error,
            DiskRampError::WriteFailure(_) | DiskRampError::PhaseFailure { .. }
        )
    }
}

// Common types and constants
pub const APP_NAME: &str = "diskramp";
pub const CONFIG_FILE: &str = "diskramp.toml";
/// File written by the single-writer calibration pass
pub const CALIBRATION_FILE: &str = "single_thread";
/// Prefix of the per-writer files of a concurrent phase
pub const THREAD_FILE_PREFIX: &str = "thread";

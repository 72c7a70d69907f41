//! Data models module
//!
//! Phase results, scan outcome and the exported benchmark report.

pub mod result;

// Re-export commonly used types
pub use result::{BenchmarkReport, PhaseResult, ScanOutcome, StopReason, SystemInfo};

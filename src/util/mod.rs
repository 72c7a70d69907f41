//! Utility functions module
//!
//! Timing and unit formatting helpers.

pub mod stopwatch;
pub mod units;

// Re-export commonly used functions
pub use stopwatch::StopWatch;
pub use units::{
    calculate_throughput_mbps, format_bytes, format_duration, format_throughput, parse_bytes,
    parse_duration,
};

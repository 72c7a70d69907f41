//! Units formatting and conversion utilities
//!
//! Human-readable sizes, durations and throughput for benchmark output.

use byte_unit::{Byte, UnitType};
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Format bytes into human-readable size with binary units
///
/// # Examples
/// ```
/// use diskramp::util::units::format_bytes;
///
/// assert!(format_bytes(104_857_600).contains("MiB"));
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary);
    format!("{:.1}", adjusted)
}

/// Parse human-readable size string into bytes
///
/// Accepts plain byte counts and unit suffixes such as `KiB`, `MiB`, `GB`.
///
/// # Examples
/// ```
/// use diskramp::util::units::parse_bytes;
///
/// assert_eq!(parse_bytes("100MiB").unwrap(), 104_857_600);
/// ```
pub fn parse_bytes(input: &str) -> Result<u64, String> {
    let byte: Byte = input
        .trim()
        .parse()
        .map_err(|e| format!("Invalid size '{}': {}", input, e))?;
    Ok(byte.as_u64())
}

/// Format duration into human-readable string at millisecond precision
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use diskramp::util::units::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1s 500ms");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let truncated = Duration::from_millis(duration.as_millis() as u64);
    if truncated.is_zero() {
        return "0ms".to_string();
    }
    humantime::format_duration(truncated).to_string()
}

/// Parse duration string such as `"2s"` or `"1500ms"`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input.trim())
        .map_err(|e| format!("Invalid duration '{}': {}", input, e))
}

/// Calculate throughput in MB/s (1 MB = 1024 * 1024 bytes) from bytes and duration
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use diskramp::util::units::calculate_throughput_mbps;
///
/// let throughput = calculate_throughput_mbps(1048576, Duration::from_secs(1));
/// assert!((throughput - 1.0).abs() < 0.01);
/// ```
pub fn calculate_throughput_mbps(bytes: u64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }

    bytes as f64 / MIB / duration.as_secs_f64()
}

/// Format a MB/s value, switching to GB/s above 1024 MB/s
pub fn format_throughput(mbps: f64) -> String {
    if mbps > 1024.0 {
        format!("{:.2} GB/s", mbps / 1024.0)
    } else {
        format!("{:.2} MB/s", mbps)
    }
}

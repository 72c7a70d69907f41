//! Benchmark result data models
//!
//! Per-phase throughput records, the scan outcome, and the exported report.

use crate::config::BenchmarkConfig;
use crate::util::units::{calculate_throughput_mbps, format_bytes, format_throughput};
use crate::util::StopWatch;
use crate::{DiskRampError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Outcome of one successful write phase with a fixed number of writers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Number of concurrent writers
    pub thread_count: usize,
    /// Elapsed time of each writer, indexed by writer number - 1
    #[serde(with = "duration_vec_serde")]
    pub writer_elapsed: Vec<Duration>,
    /// Sum of writer times divided by the writer count
    #[serde(with = "duration_serde")]
    pub average_elapsed: Duration,
    /// Bytes each writer put on disk
    pub bytes_per_writer: u64,
    /// Aggregate throughput in MB/s
    pub throughput_mbps: f64,
}

impl PhaseResult {
    /// Build a phase result from per-writer timings.
    ///
    /// Throughput is all bytes moved divided by the *average* writer time,
    /// not the phase's wall-clock span.
    pub fn from_writer_times(writer_elapsed: Vec<Duration>, bytes_per_writer: u64) -> Self {
        let thread_count = writer_elapsed.len();
        let average_elapsed = average_duration(&writer_elapsed);
        let throughput_mbps = phase_throughput_mbps(bytes_per_writer, thread_count, average_elapsed);

        Self {
            thread_count,
            writer_elapsed,
            average_elapsed,
            bytes_per_writer,
            throughput_mbps,
        }
    }

    /// `average N ms, speed X MB/s, SIZE per thread`
    pub fn speed_line(&self) -> String {
        format!(
            "average {}, speed {}, {} per thread",
            StopWatch::duration_to_ms_string(self.average_elapsed),
            format_throughput(self.throughput_mbps),
            format_bytes(self.bytes_per_writer)
        )
    }
}

/// `sum / len` at nanosecond precision, zero for an empty slice
pub fn average_duration(durations: &[Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::ZERO;
    }
    let total: u128 = durations.iter().map(|d| d.as_nanos()).sum();
    Duration::from_nanos((total / durations.len() as u128) as u64)
}

/// `(bytes_per_writer * thread_count) / 1024^2 / average_seconds`
pub fn phase_throughput_mbps(bytes_per_writer: u64, thread_count: usize, average: Duration) -> f64 {
    calculate_throughput_mbps(bytes_per_writer * thread_count as u64, average)
}

/// Why the thread-count scan ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    /// Throughput dropped for the configured number of consecutive phases
    Plateau,
    /// A writer failed; the scan stopped at the phase with this many threads
    PhaseFailed { thread_count: usize, message: String },
    /// The configured maximum writer count was reached
    ThreadLimit,
}

impl StopReason {
    pub fn description(&self) -> String {
        match self {
            StopReason::Plateau => "throughput stopped improving".to_string(),
            StopReason::PhaseFailed { thread_count, message } => {
                format!("phase with {} threads failed: {}", thread_count, message)
            }
            StopReason::ThreadLimit => "thread limit reached".to_string(),
        }
    }
}

/// Result of the thread-count scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Highest thread count whose phase is reported
    pub max_thread_count_tested: usize,
    /// Baseline followed by every successful scan phase, in order
    pub phases: Vec<PhaseResult>,
    pub stop_reason: StopReason,
}

impl ScanOutcome {
    /// Phase with the highest throughput
    pub fn best_phase(&self) -> Option<&PhaseResult> {
        self.phases
            .iter()
            .max_by(|a, b| a.throughput_mbps.total_cmp(&b.throughput_mbps))
    }
}

/// Complete benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Timestamp when the benchmark finished
    pub timestamp: DateTime<Utc>,
    /// Configuration used for this benchmark
    pub config: BenchmarkConfig,
    /// Buffer length before calibration
    pub initial_portion_size: usize,
    /// Buffer length used by the scan phases
    pub portion_size: usize,
    pub outcome: ScanOutcome,
    pub system_info: SystemInfo,
}

impl BenchmarkReport {
    pub fn new(
        config: BenchmarkConfig,
        initial_portion_size: usize,
        portion_size: usize,
        outcome: ScanOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            config,
            initial_portion_size,
            portion_size,
            outcome,
            system_info: SystemInfo::detect(),
        }
    }

    /// Whether calibration shrank the workload buffer
    pub fn was_resized(&self) -> bool {
        self.portion_size < self.initial_portion_size
    }

    /// Get a human-readable summary of the benchmark result
    pub fn summary(&self) -> String {
        let best = match self.outcome.best_phase() {
            Some(phase) => format!(
                "best {} with {} threads",
                format_throughput(phase.throughput_mbps),
                phase.thread_count
            ),
            None => "no phases completed".to_string(),
        };
        format!(
            "{} - {} - max threads tested {} ({})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            best,
            self.outcome.max_thread_count_tested,
            self.outcome.stop_reason.description()
        )
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            DiskRampError::PersistenceError(format!(
                "Failed to write report {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// System information captured at benchmark time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system and architecture
    pub os: String,
    /// Hardware threads available to the process
    pub available_parallelism: usize,
}

impl SystemInfo {
    pub fn detect() -> Self {
        Self {
            os: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            available_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

// Durations are stored as nanosecond counts
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_nanos() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos: Vec<u64> = durations.iter().map(|d| d.as_nanos() as u64).collect();
        nanos.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = Vec::<u64>::deserialize(deserializer)?;
        Ok(nanos.into_iter().map(Duration::from_nanos).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MIB: u64 = 1024 * 1024;

    fn phase(thread_count: usize, throughput_mbps: f64) -> PhaseResult {
        PhaseResult {
            thread_count,
            writer_elapsed: vec![Duration::from_secs(1); thread_count],
            average_elapsed: Duration::from_secs(1),
            bytes_per_writer: MIB,
            throughput_mbps,
        }
    }

    #[test]
    fn test_speed_line_includes_data_per_thread() {
        let baseline = PhaseResult::from_writer_times(vec![Duration::from_millis(1500)], 1000 * MIB);
        let line = baseline.speed_line();
        assert!(line.starts_with("average 1500 ms, speed 666.67 MB/s, "));
        assert!(line.contains("1000.0 MiB"));
        assert!(line.ends_with(" per thread"));
    }

    #[test]
    fn test_average_duration() {
        let times = vec![Duration::from_millis(100), Duration::from_millis(300)];
        assert_eq!(average_duration(&times), Duration::from_millis(200));
        assert_eq!(average_duration(&[]), Duration::ZERO);
    }

    #[test]
    fn test_baseline_throughput() {
        // 100 MiB written 10 times in 1.5s
        let result = PhaseResult::from_writer_times(vec![Duration::from_millis(1500)], 100 * MIB * 10);
        assert_eq!(result.thread_count, 1);
        assert!((result.throughput_mbps - 666.666).abs() < 0.01);
    }

    #[test]
    fn test_throughput_uses_average_time() {
        let result = PhaseResult::from_writer_times(
            vec![Duration::from_secs(1), Duration::from_secs(3)],
            100 * MIB,
        );
        assert_eq!(result.average_elapsed, Duration::from_secs(2));
        assert!((result.throughput_mbps - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_halving_average_doubles_throughput() {
        let slow = phase_throughput_mbps(10 * MIB, 4, Duration::from_secs(2));
        let fast = phase_throughput_mbps(10 * MIB, 4, Duration::from_secs(1));
        assert!((fast - 2.0 * slow).abs() < 1e-9);
    }

    #[test]
    fn test_best_phase() {
        let outcome = ScanOutcome {
            max_thread_count_tested: 3,
            phases: vec![phase(1, 100.0), phase(2, 180.0), phase(3, 150.0)],
            stop_reason: StopReason::Plateau,
        };
        assert_eq!(outcome.best_phase().unwrap().thread_count, 2);
    }

    #[test]
    fn test_report_json_export() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("report.json");
        let outcome = ScanOutcome {
            max_thread_count_tested: 2,
            phases: vec![phase(1, 100.0), phase(2, 120.0)],
            stop_reason: StopReason::PhaseFailed {
                thread_count: 3,
                message: "open failed".to_string(),
            },
        };
        let report = BenchmarkReport::new(BenchmarkConfig::default(), 4096, 2048, outcome);
        assert!(report.was_resized());
        assert!(report.summary().contains("max threads tested 2"));

        report.write_json(&path).unwrap();
        let parsed: BenchmarkReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.outcome, report.outcome);
        assert_eq!(parsed.portion_size, 2048);
    }

    #[test]
    fn test_report_export_to_missing_directory_fails() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("missing").join("report.json");
        let outcome = ScanOutcome {
            max_thread_count_tested: 1,
            phases: vec![phase(1, 100.0)],
            stop_reason: StopReason::ThreadLimit,
        };
        let report = BenchmarkReport::new(BenchmarkConfig::default(), 4096, 4096, outcome);
        assert!(matches!(
            report.write_json(&path),
            Err(DiskRampError::PersistenceError(_))
        ));
    }
}

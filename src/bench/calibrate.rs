//! Single-writer calibration pass
//!
//! Measures the 1-thread baseline and shrinks the workload buffer when the
//! pass overran the time budget, so later passes fit it.

use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::bench::writer::FileWriter;
use crate::io::buffer::WorkloadBuffer;
use crate::io::disk::calibration_file_path;
use crate::models::PhaseResult;
use crate::util::{format_bytes, format_duration};
use crate::{DiskRampError, Result};

/// Sized buffer and baseline measurement produced by calibration
#[derive(Debug)]
pub struct Calibration {
    /// Buffer to use for every scan phase
    pub buffer: WorkloadBuffer,
    /// The 1-thread data point, measured with the pre-shrink buffer
    pub baseline: PhaseResult,
    /// Buffer length the pass was run with
    pub initial_portion_size: usize,
}

impl Calibration {
    pub fn was_resized(&self) -> bool {
        self.buffer.len() < self.initial_portion_size
    }
}

/// Portion size that would make a pass taking `elapsed` fit `budget`.
///
/// Returns `size` unchanged when the pass already fit. Never grows the size
/// and never returns less than one byte.
pub fn shrunk_portion_size(size: usize, elapsed: Duration, budget: Duration) -> usize {
    let elapsed_secs = elapsed.as_secs_f64();
    let budget_secs = budget.as_secs_f64();
    if elapsed_secs <= budget_secs {
        return size;
    }

    let preferred = (size as f64 * (budget_secs / elapsed_secs)).floor() as usize;
    preferred.clamp(1, size)
}

/// Runs the calibration pass
pub struct Calibrator {
    writer: FileWriter,
    portion_size: usize,
    portions_count: u32,
    time_budget: Duration,
}

impl Calibrator {
    pub fn new(writer: FileWriter, portion_size: usize, portions_count: u32, time_budget: Duration) -> Self {
        Self {
            writer,
            portion_size,
            portions_count,
            time_budget,
        }
    }

    /// Generate the workload and run one pass against `<target_dir>/single_thread`.
    ///
    /// Write failures propagate unchanged; they abort the benchmark.
    pub async fn calibrate(&self, target_dir: &Path) -> Result<Calibration> {
        let portion_size = self.portion_size;
        let buffer = tokio::task::spawn_blocking(move || WorkloadBuffer::generate_random(portion_size))
            .await
            .map_err(|e| DiskRampError::BenchmarkError(format!("Buffer generation task failed: {}", e)))??;
        self.calibrate_with(target_dir, buffer).await
    }

    /// Run the calibration pass with an already generated buffer
    pub async fn calibrate_with(&self, target_dir: &Path, buffer: WorkloadBuffer) -> Result<Calibration> {
        let path = calibration_file_path(target_dir);
        let writer = self.writer.clone();
        let portions_count = self.portions_count;

        let (mut buffer, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = writer.write_repeated(&path, buffer.as_slice(), portions_count);
            (buffer, outcome)
        })
        .await
        .map_err(|e| DiskRampError::BenchmarkError(format!("Calibration task failed: {}", e)))?;

        let elapsed = outcome.map_err(|e| {
            error!("Calibration pass failed: {}", e);
            e
        })?;

        let initial_portion_size = buffer.len();
        let bytes_written = initial_portion_size as u64 * portions_count as u64;
        let baseline = PhaseResult::from_writer_times(vec![elapsed], bytes_written);

        let preferred = shrunk_portion_size(initial_portion_size, elapsed, self.time_budget);
        if preferred < initial_portion_size {
            buffer.resize_to(preferred);
            info!(
                "Calibration took {} (budget {}), shrinking portion from {} to {}",
                format_duration(elapsed),
                format_duration(self.time_budget),
                format_bytes(initial_portion_size as u64),
                format_bytes(preferred as u64)
            );
        } else {
            info!(
                "Calibration took {}, keeping portion size {}",
                format_duration(elapsed),
                format_bytes(initial_portion_size as u64)
            );
        }

        Ok(Calibration {
            buffer,
            baseline,
            initial_portion_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteStage;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_shrink_halves_when_twice_over_budget() {
        let size = shrunk_portion_size(100_000_000, Duration::from_secs(4), Duration::from_secs(2));
        assert_eq!(size, 50_000_000);
    }

    #[test]
    fn test_no_shrink_within_budget() {
        let budget = Duration::from_secs(2);
        assert_eq!(shrunk_portion_size(1000, Duration::from_millis(1500), budget), 1000);
        assert_eq!(shrunk_portion_size(1000, budget, budget), 1000);
        assert_eq!(shrunk_portion_size(1000, Duration::ZERO, budget), 1000);
    }

    #[test]
    fn test_shrink_never_grows_or_vanishes() {
        let budget = Duration::from_secs(2);
        for elapsed_ms in [2001u64, 2500, 3000, 10_000, 1_000_000_000] {
            let size = shrunk_portion_size(4096, Duration::from_millis(elapsed_ms), budget);
            assert!(size <= 4096);
            assert!(size >= 1);
        }
    }

    #[test]
    fn test_shrink_rounds_down() {
        // 1000 * 2 / 3 = 666.67
        let size = shrunk_portion_size(1000, Duration::from_secs(3), Duration::from_secs(2));
        assert_eq!(size, 666);
    }

    #[tokio::test]
    async fn test_calibration_within_budget_keeps_buffer() {
        let temp_dir = tempdir().unwrap();
        let calibrator = Calibrator::new(FileWriter::platform(), 64 * 1024, 4, Duration::from_secs(60));

        let calibration = calibrator.calibrate(temp_dir.path()).await.unwrap();
        assert!(!calibration.was_resized());
        assert_eq!(calibration.buffer.len(), 64 * 1024);
        assert_eq!(calibration.baseline.thread_count, 1);
        assert_eq!(calibration.baseline.bytes_per_writer, 4 * 64 * 1024);

        let written = fs::metadata(temp_dir.path().join("single_thread")).unwrap().len();
        assert_eq!(written, 4 * 64 * 1024);
    }

    #[tokio::test]
    async fn test_calibration_over_budget_shrinks_but_reports_measured_pass() {
        let temp_dir = tempdir().unwrap();
        // Any real write takes longer than a nanosecond
        let calibrator = Calibrator::new(FileWriter::platform(), 256 * 1024, 2, Duration::from_nanos(1));

        let calibration = calibrator.calibrate(temp_dir.path()).await.unwrap();
        assert!(calibration.was_resized());
        assert!(calibration.buffer.len() < 256 * 1024);
        assert_eq!(calibration.initial_portion_size, 256 * 1024);
        assert_eq!(calibration.baseline.bytes_per_writer, 2 * 256 * 1024);
    }

    #[tokio::test]
    async fn test_calibration_failure_propagates() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        let calibrator = Calibrator::new(FileWriter::platform(), 1024, 1, Duration::from_secs(2));

        match calibrator.calibrate(&missing).await {
            Err(DiskRampError::WriteFailure(failure)) => assert_eq!(failure.stage, WriteStage::Open),
            other => panic!("Expected write failure, got {:?}", other.map(|c| c.buffer.len())),
        }
    }
}

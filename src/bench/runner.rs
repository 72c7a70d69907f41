//! Write scaling benchmark
//!
//! Calibrates a workload on one writer, then scans upward in writer count
//! until throughput plateaus, streaming progress events as it goes.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::bench::calibrate::Calibrator;
use crate::bench::phase::ConcurrentWritePhase;
use crate::bench::plateau::PlateauDetector;
use crate::bench::writer::FileWriter;
use crate::config::BenchmarkConfig;
use crate::io::disk::{DiskIO, PlatformDiskIO};
use crate::models::{BenchmarkReport, PhaseResult};
use crate::util::format_bytes;
use crate::Result;

/// Progress update sent during benchmark execution
#[derive(Debug, Clone)]
pub enum BenchmarkEvent {
    /// The random workload buffer is being generated
    GeneratingData { portion_size: usize },
    /// The single-writer pass finished
    Calibrated {
        baseline: PhaseResult,
        initial_portion_size: usize,
        portion_size: usize,
    },
    /// A phase with this many writers is starting
    PhaseStarted { thread_count: usize },
    /// A phase finished successfully
    PhaseCompleted(PhaseResult),
    /// A phase failed and ended the scan
    PhaseFailed { thread_count: usize, message: String },
    /// The scan ended at this thread count
    Finished { max_thread_count_tested: usize },
}

/// Sequential write scaling benchmark over one target directory
pub struct WriteScalingBenchmark {
    config: BenchmarkConfig,
    disk_io: Arc<dyn DiskIO>,
}

impl WriteScalingBenchmark {
    /// Create a benchmark writing through the real filesystem
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        Self::with_disk_io(config, Arc::new(PlatformDiskIO::new()))
    }

    /// Create a benchmark writing through `disk_io`
    pub fn with_disk_io(config: BenchmarkConfig, disk_io: Arc<dyn DiskIO>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, disk_io })
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Execute the benchmark.
    ///
    /// Calibration errors (allocation, write failures) abort the run; scan
    /// phase failures end the scan and are reported in the outcome. A dropped
    /// event receiver does not stop the benchmark.
    pub async fn run(&self, events: mpsc::Sender<BenchmarkEvent>) -> Result<BenchmarkReport> {
        let writer = FileWriter::new(Arc::clone(&self.disk_io)).with_sync_data(self.config.sync_data);
        let target_dir = self.config.target_dir.clone();

        info!(
            "Benchmarking {} with {} x {} per writer",
            target_dir.display(),
            self.config.portions_count,
            format_bytes(self.config.portion_size as u64)
        );

        let mut detector = PlateauDetector::new(self.config.max_slow_phases, self.config.max_threads);

        let _ = events
            .send(BenchmarkEvent::GeneratingData {
                portion_size: self.config.portion_size,
            })
            .await;
        let calibrator = Calibrator::new(
            writer.clone(),
            self.config.portion_size,
            self.config.portions_count,
            self.config.time_budget,
        );
        let calibration = calibrator.calibrate(&target_dir).await?;
        let initial_portion_size = calibration.initial_portion_size;
        let portion_size = calibration.buffer.len();

        let _ = events
            .send(BenchmarkEvent::Calibrated {
                baseline: calibration.baseline.clone(),
                initial_portion_size,
                portion_size,
            })
            .await;
        detector.begin_scan(calibration.baseline)?;

        let phase = ConcurrentWritePhase::new(
            writer,
            target_dir,
            Arc::new(calibration.buffer),
            self.config.portions_count,
        );
        let outcome = detector.scan(&phase, &events).await?;

        let _ = events
            .send(BenchmarkEvent::Finished {
                max_thread_count_tested: outcome.max_thread_count_tested,
            })
            .await;

        Ok(BenchmarkReport::new(
            self.config.clone(),
            initial_portion_size,
            portion_size,
            outcome,
        ))
    }
}

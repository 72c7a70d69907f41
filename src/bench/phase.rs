//! Concurrent write phase
//!
//! Fans out one blocking writer per thread, each on its own file, waits for
//! all of them, and turns their timings into an aggregate throughput.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bench::plateau::PhaseExecutor;
use crate::bench::writer::FileWriter;
use crate::io::buffer::WorkloadBuffer;
use crate::io::disk::thread_file_path;
use crate::models::PhaseResult;
use crate::util::{format_throughput, StopWatch};
use crate::{DiskRampError, Result};

/// Runs phases of N concurrent writers sharing one read-only buffer
pub struct ConcurrentWritePhase {
    writer: FileWriter,
    target_dir: PathBuf,
    buffer: Arc<WorkloadBuffer>,
    portions_count: u32,
}

impl ConcurrentWritePhase {
    pub fn new(writer: FileWriter, target_dir: PathBuf, buffer: Arc<WorkloadBuffer>, portions_count: u32) -> Self {
        Self {
            writer,
            target_dir,
            buffer,
            portions_count,
        }
    }

    /// Bytes each writer puts on disk per phase
    pub fn bytes_per_writer(&self) -> u64 {
        self.buffer.len() as u64 * self.portions_count as u64
    }

    /// Run `thread_count` writers to `thread1..=thread<N>` and aggregate their timings.
    ///
    /// Every writer is awaited before failures are evaluated; a failing
    /// writer does not cancel its siblings.
    pub async fn run(&self, thread_count: usize) -> Result<PhaseResult> {
        if thread_count == 0 {
            return Err(DiskRampError::BenchmarkError(
                "A write phase needs at least one writer".to_string(),
            ));
        }

        let handles: Vec<JoinHandle<Result<Duration>>> = (1..=thread_count)
            .map(|index| {
                let writer = self.writer.clone();
                let buffer = Arc::clone(&self.buffer);
                let path = thread_file_path(&self.target_dir, index);
                let portions_count = self.portions_count;
                tokio::task::spawn_blocking(move || {
                    writer.write_repeated(&path, buffer.as_slice(), portions_count)
                })
            })
            .collect();

        // One slot per writer, filled only after its task has finished
        let mut slots: Vec<Result<Duration>> = Vec::with_capacity(thread_count);
        for handle in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(DiskRampError::BenchmarkError(format!("Writer task failed: {}", e))),
            };
            slots.push(outcome);
        }

        let mut writer_elapsed = Vec::with_capacity(thread_count);
        let mut failures = Vec::new();
        for (i, slot) in slots.into_iter().enumerate() {
            match slot {
                Ok(elapsed) => {
                    debug!("thread {}: {}", i + 1, StopWatch::duration_to_ms_string(elapsed));
                    writer_elapsed.push(elapsed);
                }
                Err(e) => {
                    warn!("thread {} failed: {}", i + 1, e);
                    failures.push(e);
                }
            }
        }

        if let Some(first) = failures.first() {
            return Err(DiskRampError::PhaseFailure {
                thread_count,
                failed_writers: failures.len(),
                first_error: first.to_string(),
            });
        }

        let result = PhaseResult::from_writer_times(writer_elapsed, self.bytes_per_writer());
        info!(
            "{} threads: average {}, speed {}",
            thread_count,
            StopWatch::duration_to_ms_string(result.average_elapsed),
            format_throughput(result.throughput_mbps)
        );
        Ok(result)
    }
}

impl PhaseExecutor for ConcurrentWritePhase {
    fn run_phase(&self, thread_count: usize) -> impl Future<Output = Result<PhaseResult>> + Send {
        self.run(thread_count)
    }
}

//! Single-file repeated writer
//!
//! Writes one workload buffer to one file a fixed number of times on the
//! same handle and times the whole operation.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::io::disk::{DiskIO, PlatformDiskIO};
use crate::util::StopWatch;
use crate::{Result, WriteFailure, WriteStage};

/// Writes a buffer repeatedly to one target file
#[derive(Clone)]
pub struct FileWriter {
    disk_io: Arc<dyn DiskIO>,
    sync_data: bool,
}

impl FileWriter {
    pub fn new(disk_io: Arc<dyn DiskIO>) -> Self {
        Self {
            disk_io,
            sync_data: false,
        }
    }

    /// Writer backed by the real filesystem
    pub fn platform() -> Self {
        Self::new(Arc::new(PlatformDiskIO::new()))
    }

    /// Flush to stable storage before the timer stops
    pub fn with_sync_data(mut self, sync: bool) -> Self {
        self.sync_data = sync;
        self
    }

    /// Write `buffer` to `target_path` `repeat_count` times back-to-back.
    ///
    /// The file is truncated first. Returns the time spent writing, excluding
    /// the open. Leaves `buffer.len() * repeat_count` bytes on disk on success.
    pub fn write_repeated(&self, target_path: &Path, buffer: &[u8], repeat_count: u32) -> Result<Duration> {
        let fail = |stage, source| WriteFailure {
            path: target_path.to_path_buf(),
            stage,
            source,
        };

        let mut file = self
            .disk_io
            .open_write(target_path)
            .map_err(|e| fail(WriteStage::Open, e))?;

        let watch = StopWatch::new();
        for index in 0..repeat_count {
            match file.write_portion(buffer) {
                Ok(written) if written == buffer.len() => {}
                Ok(written) => {
                    drop(file);
                    let short = io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short write: {} of {} bytes", written, buffer.len()),
                    );
                    return Err(fail(WriteStage::Write { index }, short).into());
                }
                Err(e) => {
                    drop(file);
                    return Err(fail(WriteStage::Write { index }, e).into());
                }
            }
        }

        if self.sync_data {
            if let Err(e) = file.sync_all() {
                drop(file);
                return Err(fail(WriteStage::Sync, e).into());
            }
        }

        let elapsed = watch.stop();
        drop(file);
        debug!(
            "Wrote {} x {} bytes to {} in {}",
            repeat_count,
            buffer.len(),
            target_path.display(),
            StopWatch::duration_to_ms_string(elapsed)
        );
        Ok(elapsed)
    }
}

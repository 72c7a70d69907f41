//! I/O operations module
//!
//! Workload buffer generation, the file-writing seam used by benchmark
//! writers, and the scratch directory holding their files.

pub mod buffer;
pub mod disk;

pub use buffer::WorkloadBuffer;
pub use disk::{
    calibration_file_path, thread_file_path, DiskIO, PlatformDiskIO, ScratchDir, TargetFile,
};

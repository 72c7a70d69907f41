//! Benchmark engine module
//!
//! Calibration, concurrent write phases and the plateau-detecting scan
//! that ties them together.

pub mod calibrate;
pub mod phase;
pub mod plateau;
pub mod runner;
pub mod writer;

// Re-export commonly used types
pub use calibrate::{Calibration, Calibrator};
pub use phase::ConcurrentWritePhase;
pub use plateau::{PhaseExecutor, PlateauDetector, ScanPhase, ScanState};
pub use runner::{BenchmarkEvent, WriteScalingBenchmark};
pub use writer::FileWriter;

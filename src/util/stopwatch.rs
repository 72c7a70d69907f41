//! Elapsed-time measurement for a single timed operation

use std::time::{Duration, Instant};

/// Monotonic stopwatch. Starts implicitly when created.
#[derive(Debug, Clone, Copy)]
pub struct StopWatch {
    started: Instant,
}

impl StopWatch {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Restart the measurement from now
    pub fn start(&mut self) {
        self.started = Instant::now();
    }

    /// Time elapsed since the last start
    pub fn stop(&self) -> Duration {
        self.started.elapsed()
    }

    /// Format a nanosecond count as whole milliseconds, e.g. `"1500 ms"`
    pub fn nanos_to_ms_string(nanos: u128) -> String {
        format!("{} ms", nanos / 1_000_000)
    }

    /// Format a duration as whole milliseconds
    pub fn duration_to_ms_string(duration: Duration) -> String {
        Self::nanos_to_ms_string(duration.as_nanos())
    }
}

impl Default for StopWatch {
    fn default() -> Self {
        Self::new()
    }
}

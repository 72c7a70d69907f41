//! Thread-count scan with plateau detection
//!
//! After calibration, runs write phases with 2, 3, 4, ... writers and stops
//! once throughput has dropped for `max_slow_phases` phases in a row, a phase
//! fails, or the writer limit is reached.

use std::future::Future;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::bench::runner::BenchmarkEvent;
use crate::models::{PhaseResult, ScanOutcome, StopReason};
use crate::util::format_throughput;
use crate::{DiskRampError, Result};

/// Something that can run one write phase with a given number of writers
pub trait PhaseExecutor {
    fn run_phase(&self, thread_count: usize) -> impl Future<Output = Result<PhaseResult>> + Send;
}

/// Lifecycle of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Calibrating,
    Scanning,
    Done,
}

/// Running state of the scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanState {
    /// Throughput of the immediately preceding phase
    pub last_speed: f64,
    /// Consecutive phases slower than their predecessor
    pub slow_phases: u8,
    /// Thread count of the next (or current) phase
    pub thread_count: usize,
}

/// Drives the scan over increasing thread counts
#[derive(Debug)]
pub struct PlateauDetector {
    max_slow_phases: u8,
    max_threads: usize,
    phase: ScanPhase,
    state: ScanState,
    phases: Vec<PhaseResult>,
}

impl PlateauDetector {
    pub fn new(max_slow_phases: u8, max_threads: usize) -> Self {
        Self {
            max_slow_phases,
            max_threads,
            phase: ScanPhase::Calibrating,
            state: ScanState {
                last_speed: 0.0,
                slow_phases: 0,
                thread_count: 1,
            },
            phases: Vec::new(),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Leave calibration with the 1-thread baseline; the scan starts at 2 threads
    pub fn begin_scan(&mut self, baseline: PhaseResult) -> Result<()> {
        if self.phase != ScanPhase::Calibrating {
            return Err(DiskRampError::BenchmarkError(format!(
                "Cannot start a scan from {:?}",
                self.phase
            )));
        }

        self.state = ScanState {
            last_speed: baseline.throughput_mbps,
            slow_phases: 0,
            thread_count: 2,
        };
        self.phases.push(baseline);
        self.phase = ScanPhase::Scanning;
        Ok(())
    }

    /// Feed one phase's throughput into the stopping rule.
    ///
    /// Compares against the previous phase only (not the best so far) and
    /// returns true once the slow-phase limit is reached.
    pub fn observe(&mut self, current_speed: f64) -> bool {
        if current_speed < self.state.last_speed {
            self.state.slow_phases = self.state.slow_phases.saturating_add(1);
        } else {
            self.state.slow_phases = 0;
        }
        self.state.last_speed = current_speed;
        self.state.slow_phases >= self.max_slow_phases
    }

    /// Run phases until the scan stops. Phase failures end the scan with the
    /// results gathered so far instead of failing it.
    pub async fn scan<E: PhaseExecutor>(
        &mut self,
        executor: &E,
        events: &mpsc::Sender<BenchmarkEvent>,
    ) -> Result<ScanOutcome> {
        if self.phase != ScanPhase::Scanning {
            return Err(DiskRampError::BenchmarkError(format!(
                "Cannot scan from {:?}",
                self.phase
            )));
        }

        if self.state.thread_count > self.max_threads {
            return Ok(self.finish(self.state.thread_count - 1, StopReason::ThreadLimit));
        }

        loop {
            let thread_count = self.state.thread_count;
            let _ = events.send(BenchmarkEvent::PhaseStarted { thread_count }).await;

            let result = match executor.run_phase(thread_count).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Stopping scan: {}", e);
                    let message = e.to_string();
                    let _ = events
                        .send(BenchmarkEvent::PhaseFailed {
                            thread_count,
                            message: message.clone(),
                        })
                        .await;
                    return Ok(self.finish(
                        thread_count - 1,
                        StopReason::PhaseFailed {
                            thread_count,
                            message,
                        },
                    ));
                }
            };

            let plateau = self.observe(result.throughput_mbps);
            if self.state.slow_phases > 0 {
                info!(
                    "{} threads slower than previous phase ({}), slow phases: {}",
                    thread_count,
                    format_throughput(result.throughput_mbps),
                    self.state.slow_phases
                );
            }
            let _ = events.send(BenchmarkEvent::PhaseCompleted(result.clone())).await;
            self.phases.push(result);

            if plateau {
                return Ok(self.finish(thread_count, StopReason::Plateau));
            }
            if thread_count >= self.max_threads {
                return Ok(self.finish(thread_count, StopReason::ThreadLimit));
            }
            self.state.thread_count += 1;
        }
    }

    fn finish(&mut self, max_thread_count_tested: usize, stop_reason: StopReason) -> ScanOutcome {
        self.phase = ScanPhase::Done;
        info!(
            "Scan finished at {} threads: {}",
            max_thread_count_tested,
            stop_reason.description()
        );
        ScanOutcome {
            max_thread_count_tested,
            phases: std::mem::take(&mut self.phases),
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    fn phase_with_speed(thread_count: usize, throughput_mbps: f64) -> PhaseResult {
        PhaseResult {
            thread_count,
            writer_elapsed: vec![Duration::from_secs(1); thread_count],
            average_elapsed: Duration::from_secs(1),
            bytes_per_writer: 1024,
            throughput_mbps,
        }
    }

    /// Replays a fixed throughput per thread count; missing counts fail
    struct ScriptedExecutor {
        speeds: HashMap<usize, f64>,
        calls: Mutex<Vec<usize>>,
    }

    impl ScriptedExecutor {
        fn new(speeds: &[(usize, f64)]) -> Self {
            Self {
                speeds: speeds.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PhaseExecutor for ScriptedExecutor {
        fn run_phase(&self, thread_count: usize) -> impl Future<Output = Result<PhaseResult>> + Send {
            self.calls.lock().unwrap().push(thread_count);
            let outcome = match self.speeds.get(&thread_count) {
                Some(&speed) => Ok(phase_with_speed(thread_count, speed)),
                None => Err(DiskRampError::PhaseFailure {
                    thread_count,
                    failed_writers: 1,
                    first_error: "scripted failure".to_string(),
                }),
            };
            async move { outcome }
        }
    }

    fn scanning_detector(baseline_speed: f64) -> PlateauDetector {
        let mut detector = PlateauDetector::new(2, 64);
        detector.begin_scan(phase_with_speed(1, baseline_speed)).unwrap();
        detector
    }

    #[test]
    fn test_begin_scan_transitions() {
        let mut detector = PlateauDetector::new(2, 64);
        assert_eq!(detector.phase(), ScanPhase::Calibrating);

        detector.begin_scan(phase_with_speed(1, 500.0)).unwrap();
        assert_eq!(detector.phase(), ScanPhase::Scanning);
        assert_eq!(detector.state().thread_count, 2);
        assert_eq!(detector.state().last_speed, 500.0);

        assert!(detector.begin_scan(phase_with_speed(1, 500.0)).is_err());
    }

    #[test]
    fn test_isolated_dip_resets() {
        let mut detector = scanning_detector(100.0);
        assert!(!detector.observe(90.0));
        assert_eq!(detector.state().slow_phases, 1);
        assert!(!detector.observe(95.0));
        assert_eq!(detector.state().slow_phases, 0);
        assert!(!detector.observe(80.0));
        assert!(detector.observe(70.0));
    }

    #[test]
    fn test_compares_against_previous_not_best() {
        let mut detector = scanning_detector(100.0);
        assert!(!detector.observe(50.0));
        // Above the previous phase but still below the best: counts as improvement
        assert!(!detector.observe(60.0));
        assert_eq!(detector.state().slow_phases, 0);
        assert_eq!(detector.state().last_speed, 60.0);
    }

    #[test]
    fn test_equal_speed_is_not_slow() {
        let mut detector = scanning_detector(100.0);
        assert!(!detector.observe(100.0));
        assert_eq!(detector.state().slow_phases, 0);
    }

    #[tokio::test]
    async fn test_scan_stops_after_two_slow_phases() {
        let executor = ScriptedExecutor::new(&[(2, 700.0), (3, 720.0), (4, 650.0), (5, 600.0), (6, 900.0)]);
        let mut detector = scanning_detector(667.0);
        let (tx, _rx) = mpsc::channel(64);

        let outcome = detector.scan(&executor, &tx).await.unwrap();
        assert_eq!(outcome.max_thread_count_tested, 5);
        assert_eq!(outcome.stop_reason, StopReason::Plateau);
        assert_eq!(executor.calls(), vec![2, 3, 4, 5]);
        let counts: Vec<usize> = outcome.phases.iter().map(|p| p.thread_count).collect();
        assert_eq!(counts, vec![1, 2, 3, 4, 5]);
        assert_eq!(detector.phase(), ScanPhase::Done);
    }

    #[tokio::test]
    async fn test_scan_failure_reports_last_successful_count() {
        let executor = ScriptedExecutor::new(&[(2, 700.0)]);
        let mut detector = scanning_detector(667.0);
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = detector.scan(&executor, &tx).await.unwrap();
        assert_eq!(outcome.max_thread_count_tested, 2);
        assert!(matches!(
            outcome.stop_reason,
            StopReason::PhaseFailed { thread_count: 3, .. }
        ));
        assert_eq!(outcome.phases.len(), 2);

        drop(tx);
        let mut saw_failure = false;
        while let Some(event) = rx.recv().await {
            if let BenchmarkEvent::PhaseFailed { thread_count, .. } = event {
                assert_eq!(thread_count, 3);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_scan_respects_thread_limit() {
        let speeds: Vec<(usize, f64)> = (2..=10).map(|n| (n, 100.0 * n as f64)).collect();
        let executor = ScriptedExecutor::new(&speeds);
        let mut detector = PlateauDetector::new(2, 4);
        detector.begin_scan(phase_with_speed(1, 100.0)).unwrap();
        let (tx, _rx) = mpsc::channel(64);

        let outcome = detector.scan(&executor, &tx).await.unwrap();
        assert_eq!(outcome.max_thread_count_tested, 4);
        assert_eq!(outcome.stop_reason, StopReason::ThreadLimit);
        assert_eq!(executor.calls(), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_scan_with_dropped_receiver_still_completes() {
        let executor = ScriptedExecutor::new(&[(2, 50.0), (3, 40.0)]);
        let mut detector = scanning_detector(100.0);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let outcome = detector.scan(&executor, &tx).await.unwrap();
        assert_eq!(outcome.max_thread_count_tested, 3);
    }

    #[tokio::test]
    async fn test_scan_requires_baseline() {
        let executor = ScriptedExecutor::new(&[]);
        let mut detector = PlateauDetector::new(2, 64);
        let (tx, _rx) = mpsc::channel(1);
        assert!(detector.scan(&executor, &tx).await.is_err());
        assert!(executor.calls().is_empty());
    }
}

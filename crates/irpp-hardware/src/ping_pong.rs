//! Software bidirectional sweep ("ping-pong").
//!
//! Some MIRcat firmware accepts the bidirectional flag on a sweep but then
//! retraces in the same direction. When that happens the controller stops the
//! native scan and hands the sweep to a background task that alternates
//! one-shot forward (start→end) and reverse (end→start) sweeps.
//!
//! # Segment loop
//!
//! ```text
//! for each cycle (num_scans, or forever when num_scans <= 0):
//!     forward segment, then reverse segment:
//!         check cancel flag
//!         start one-shot sweep
//!         every poll interval:
//!             cancel flag set      -> stop scan, exit Cancelled
//!             scan not in progress -> next segment
//!             safety timeout hit   -> stop scan, exit SafetyTimeout
//! ```
//!
//! The task only touches the link and its own atomics. The controller owns the
//! [`PingPongHandle`] and joins it with a bounded timeout before any other
//! scan operation proceeds.

use irpp_core::capabilities::HardwareLink;
use irpp_core::error::DriverError;
use irpp_core::scan::SweepParams;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What the task sweeps and how it waits.
#[derive(Debug, Clone, PartialEq)]
pub struct PingPongPlan {
    /// Forward segments start here, cm⁻¹.
    pub start_wavenumber: f64,
    /// Forward segments end here, cm⁻¹.
    pub end_wavenumber: f64,
    /// cm⁻¹ per second.
    pub speed: f64,
    /// Forward+reverse cycles; `<= 0` runs until cancelled.
    pub num_scans: i32,
    /// Preferred chip.
    pub qcl: u8,
    /// Scan-in-progress poll interval while a segment runs.
    pub poll_interval: Duration,
    /// Per-segment bound after which the scan is force-stopped.
    pub segment_timeout: Duration,
}

impl PingPongPlan {
    fn segment(&self, forward: bool) -> SweepParams {
        let (start, end) = if forward {
            (self.start_wavenumber, self.end_wavenumber)
        } else {
            (self.end_wavenumber, self.start_wavenumber)
        };
        SweepParams {
            start_wavenumber: start,
            end_wavenumber: end,
            speed: self.speed,
            num_scans: 1,
            bidirectional: false,
            qcl: self.qcl,
        }
    }

    fn is_indefinite(&self) -> bool {
        self.num_scans <= 0
    }
}

/// Why the task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PingPongExit {
    /// Every requested cycle ran.
    Completed {
        /// Cycles finished.
        cycles: u32,
    },
    /// The owner cancelled the task.
    Cancelled {
        /// Segments issued before cancellation.
        segments: u32,
    },
    /// A segment outlived its safety timeout and was force-stopped.
    SafetyTimeout {
        /// 1-based number of the offending segment.
        segment: u32,
    },
    /// A link call failed; the scan was stopped best-effort.
    Failed(DriverError),
}

/// Counters shared between the task and the controller.
#[derive(Debug, Default)]
pub struct PingPongProgress {
    segments_started: AtomicU32,
    cycles_completed: AtomicU32,
    forward: AtomicBool,
}

impl PingPongProgress {
    /// Segments issued so far.
    pub fn segments_started(&self) -> u32 {
        self.segments_started.load(Ordering::Acquire)
    }

    /// Forward and reverse pairs finished.
    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed.load(Ordering::Acquire)
    }

    /// Direction of the most recent segment.
    pub fn is_forward(&self) -> bool {
        self.forward.load(Ordering::Acquire)
    }
}

/// Owner side of a running ping-pong task.
#[derive(Debug)]
pub struct PingPongHandle {
    cancel: Arc<AtomicBool>,
    progress: Arc<PingPongProgress>,
    task: JoinHandle<PingPongExit>,
}

impl PingPongHandle {
    /// Live counters of the task.
    pub fn progress(&self) -> &PingPongProgress {
        &self.progress
    }

    /// `true` once the task has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request cooperative cancellation without waiting.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Cancel and join, aborting the task if it does not exit within `join_timeout`.
    ///
    /// Returns `None` when the task had to be aborted or panicked.
    pub async fn shutdown(mut self, join_timeout: Duration) -> Option<PingPongExit> {
        self.cancel();
        match tokio::time::timeout(join_timeout, &mut self.task).await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(e)) => {
                warn!(error = %e, "Ping-pong task failed to join");
                None
            }
            Err(_) => {
                warn!(?join_timeout, "Ping-pong task did not stop in time, aborting");
                self.task.abort();
                None
            }
        }
    }

    /// Collect the exit of a task that already finished.
    pub async fn reap(mut self) -> Option<PingPongExit> {
        (&mut self.task).await.ok()
    }
}

impl Drop for PingPongHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawn the ping-pong task on the current runtime.
pub fn spawn(link: Arc<dyn HardwareLink>, plan: PingPongPlan) -> PingPongHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let progress = Arc::new(PingPongProgress::default());
    let task = tokio::spawn(run(link, plan, cancel.clone(), progress.clone()));
    PingPongHandle {
        cancel,
        progress,
        task,
    }
}

enum SegmentEnd {
    Done,
    Cancelled,
    TimedOut,
    Failed(DriverError),
}

async fn run(
    link: Arc<dyn HardwareLink>,
    plan: PingPongPlan,
    cancel: Arc<AtomicBool>,
    progress: Arc<PingPongProgress>,
) -> PingPongExit {
    info!(
        start = plan.start_wavenumber,
        end = plan.end_wavenumber,
        speed = plan.speed,
        num_scans = plan.num_scans,
        "Ping-pong sweep started"
    );

    let mut cycles: u32 = 0;
    loop {
        if !plan.is_indefinite() && i64::from(cycles) >= i64::from(plan.num_scans) {
            info!(cycles, "Ping-pong sweep completed");
            return PingPongExit::Completed { cycles };
        }

        for forward in [true, false] {
            if cancel.load(Ordering::Acquire) {
                return cancelled(&progress);
            }

            let segment = plan.segment(forward);
            if let Err(e) = link.start_sweep(&segment).await {
                warn!(error = %e, "Ping-pong segment failed to start");
                return PingPongExit::Failed(e);
            }
            let number = progress.segments_started.fetch_add(1, Ordering::AcqRel) + 1;
            progress.forward.store(forward, Ordering::Release);
            debug!(
                segment = number,
                from = segment.start_wavenumber,
                to = segment.end_wavenumber,
                "Ping-pong segment started"
            );

            match wait_segment(link.as_ref(), &plan, &cancel).await {
                SegmentEnd::Done => {}
                SegmentEnd::Cancelled => {
                    stop_best_effort(link.as_ref()).await;
                    return cancelled(&progress);
                }
                SegmentEnd::TimedOut => {
                    warn!(
                        segment = number,
                        timeout = ?plan.segment_timeout,
                        "Ping-pong segment exceeded safety timeout, forcing stop"
                    );
                    stop_best_effort(link.as_ref()).await;
                    return PingPongExit::SafetyTimeout { segment: number };
                }
                SegmentEnd::Failed(e) => {
                    warn!(error = %e, "Ping-pong status poll failed");
                    stop_best_effort(link.as_ref()).await;
                    return PingPongExit::Failed(e);
                }
            }
        }

        cycles += 1;
        progress.cycles_completed.store(cycles, Ordering::Release);
    }
}

async fn wait_segment(
    link: &dyn HardwareLink,
    plan: &PingPongPlan,
    cancel: &AtomicBool,
) -> SegmentEnd {
    let started = Instant::now();
    loop {
        tokio::time::sleep(plan.poll_interval).await;
        if cancel.load(Ordering::Acquire) {
            return SegmentEnd::Cancelled;
        }
        match link.scan_status().await {
            Ok(status) if !status.in_progress => return SegmentEnd::Done,
            Ok(_) => {}
            Err(e) => return SegmentEnd::Failed(e),
        }
        if started.elapsed() >= plan.segment_timeout {
            return SegmentEnd::TimedOut;
        }
    }
}

async fn stop_best_effort(link: &dyn HardwareLink) {
    if let Err(e) = link.stop_scan().await {
        warn!(error = %e, "Failed to stop scan after ping-pong segment");
    }
}

fn cancelled(progress: &PingPongProgress) -> PingPongExit {
    let segments = progress.segments_started();
    info!(segments, "Ping-pong sweep cancelled");
    PingPongExit::Cancelled { segments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irpp_driver_mock::{LinkCommand, MockQclConfig, SimulatedQcl};

    async fn armed_qcl() -> Arc<SimulatedQcl> {
        let qcl = Arc::new(SimulatedQcl::new(MockQclConfig {
            arm_delay_ms: 0,
            honor_bidirectional: false,
            ..Default::default()
        }));
        qcl.initialize().await.unwrap();
        qcl.arm().await.unwrap();
        qcl.clear_log();
        qcl
    }

    fn plan(num_scans: i32) -> PingPongPlan {
        PingPongPlan {
            start_wavenumber: 1800.0,
            end_wavenumber: 1850.0,
            speed: 10.0,
            num_scans,
            qcl: 1,
            poll_interval: Duration::from_millis(100),
            segment_timeout: Duration::from_secs(20),
        }
    }

    fn sweeps(commands: &[LinkCommand]) -> Vec<(f64, f64)> {
        commands
            .iter()
            .filter_map(|c| match c {
                LinkCommand::StartSweep(p) => Some((p.start_wavenumber, p.end_wavenumber)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_cycle_issues_forward_then_reverse() {
        let qcl = armed_qcl().await;
        let handle = spawn(qcl.clone(), plan(1));

        let exit = handle.reap().await;
        assert_eq!(exit, Some(PingPongExit::Completed { cycles: 1 }));
        assert_eq!(sweeps(&qcl.commands()), vec![(1800.0, 1850.0), (1850.0, 1800.0)]);

        for command in qcl.commands() {
            if let LinkCommand::StartSweep(p) = command {
                assert_eq!(p.num_scans, 1);
                assert!(!p.bidirectional);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_indefinite_runs_until_cancelled() {
        let qcl = armed_qcl().await;
        let mut handle = spawn(qcl.clone(), plan(0));

        // 12.05 s covers two full segments and part of a third
        tokio::time::sleep(Duration::from_millis(12_050)).await;
        assert!(!handle.is_finished());
        assert_eq!(handle.progress().segments_started(), 3);
        assert_eq!(handle.progress().cycles_completed(), 1);
        assert!(handle.progress().is_forward());

        handle.cancel();
        let exit = tokio::time::timeout(Duration::from_millis(100), &mut handle.task)
            .await
            .expect("task exits within one poll interval")
            .unwrap();
        assert_eq!(exit, PingPongExit::Cancelled { segments: 3 });
        assert_eq!(qcl.commands().last(), Some(&LinkCommand::StopScan));
        assert!(!qcl.scan_status().await.unwrap().in_progress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_timeout_force_stops() {
        let qcl = armed_qcl().await;
        let mut stuck = plan(1);
        // far shorter than the 5 s segment
        stuck.segment_timeout = Duration::from_millis(50);
        let handle = spawn(qcl.clone(), stuck);

        let exit = handle.reap().await;
        assert_eq!(exit, Some(PingPongExit::SafetyTimeout { segment: 1 }));
        assert_eq!(sweeps(&qcl.commands()).len(), 1);
        assert_eq!(qcl.commands().last(), Some(&LinkCommand::StopScan));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_joins_task() {
        let qcl = armed_qcl().await;
        let handle = spawn(qcl.clone(), plan(-1));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let exit = handle.shutdown(Duration::from_secs(2)).await;
        assert_eq!(exit, Some(PingPongExit::Cancelled { segments: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_ends_task() {
        let qcl = Arc::new(SimulatedQcl::new(MockQclConfig::default()));
        qcl.initialize().await.unwrap();
        // not armed: the simulator refuses to scan
        let exit = spawn(qcl.clone(), plan(1)).reap().await;
        assert!(matches!(exit, Some(PingPongExit::Failed(_))));
    }
}

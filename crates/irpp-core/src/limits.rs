//! Shared time limits.

use std::time::Duration;

/// Default bound on joining a background scan task before it is aborted.
///
/// Used when a new scan request or a stop supersedes a running ping-pong task.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Default interval between scan-in-progress checks while a ping-pong
/// segment runs.
pub const SEGMENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Slowest accepted sweep speed in cm⁻¹/s.
pub const MIN_SWEEP_SPEED: f64 = 0.001;

/// Capacity of the status broadcast channel. Slow subscribers skip reports.
pub const STATUS_CHANNEL_CAPACITY: usize = 64;

//! Bounded polling of hardware predicates.
//!
//! Commands like "arm" or "tune" return as soon as the SDK accepted them.
//! The physical transition is confirmed by polling a boolean query until it
//! turns true. Each call site brings its own [`PollPolicy`] sized to the
//! settling time of that subsystem.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Interval and attempt budget for one polling wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Sleep between two predicate evaluations, in milliseconds.
    pub interval_ms: u64,
    /// Maximum number of predicate evaluations. `0` is treated as `1`.
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Policy of `max_attempts` evaluations `interval_ms` apart.
    pub const fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    /// Sleep between evaluations.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Attempts actually performed.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn budget(&self) -> Duration {
        self.interval() * (self.attempts() - 1)
    }
}

/// Result of a polling wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Predicate returned `true` on attempt number `attempts`.
    Ready {
        /// 1-based attempt that succeeded.
        attempts: u32,
    },
    /// Predicate was `false` on every one of `attempts` evaluations.
    TimedOut {
        /// Evaluations performed.
        attempts: u32,
    },
}

impl PollOutcome {
    /// `true` for [`PollOutcome::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }
}

/// Evaluate `predicate` until it returns `true` or the budget is exhausted.
///
/// The predicate runs at most `policy.attempts()` times with a fixed sleep
/// between evaluations and no sleep after the last one. An `Err` from the
/// predicate ends the wait immediately and is returned unchanged.
pub async fn poll_until<F, Fut, E>(policy: PollPolicy, mut predicate: F) -> Result<PollOutcome, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let attempts = policy.attempts();
    for attempt in 1..=attempts {
        if predicate().await? {
            debug!(attempt, "poll condition met");
            return Ok(PollOutcome::Ready { attempts: attempt });
        }
        if attempt < attempts {
            tokio::time::sleep(policy.interval()).await;
        }
    }
    debug!(attempts, "poll budget exhausted");
    Ok(PollOutcome::TimedOut { attempts })
}

//! Publish scheduler for the heartbeat.
//!
//! Pure logic with no I/O: the control loop asks [`HeartbeatTimer::is_due`]
//! once per tick and publishes when it says so.

use core::time::Duration;

use crate::time::Instant;

/// Default heartbeat cadence.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

/// Fires once per `period` on a monotonic timeline.
///
/// The reference point moves to the tick at which the timer fired, not to
/// `last_fire + period`. A late tick therefore delays the following heartbeat
/// instead of producing a burst of catch-up publishes.
///
/// # Examples
///
/// ```rust
/// use core::time::Duration;
/// use picolink::scheduler::HeartbeatTimer;
/// use picolink::time::Instant;
///
/// let mut timer = HeartbeatTimer::new(Duration::from_secs(5), Instant::ZERO);
///
/// assert!(!timer.is_due(Instant::from_secs(4)));
/// assert!(timer.is_due(Instant::from_secs(5)));
/// assert!(!timer.is_due(Instant::from_secs(6)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatTimer {
    last_fire: Instant,
    period: Duration,
}

impl HeartbeatTimer {
    /// Create a timer whose first firing is one `period` after `start`.
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            last_fire: start,
            period,
        }
    }

    /// Returns `true` and re-arms if at least one period elapsed since the last fire.
    pub fn is_due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_fire) >= self.period {
            self.last_fire = now;
            true
        } else {
            false
        }
    }

    /// The instant the timer last fired (or was started).
    pub fn last_fire(&self) -> Instant {
        self.last_fire
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Restart the period from `now` without firing.
    pub fn reset(&mut self, now: Instant) {
        self.last_fire = now;
    }
}

impl Default for HeartbeatTimer {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD, Instant::ZERO)
    }
}

//! Monotonic time for the control loop.
//!
//! All scheduling in the crate is done against a tick counter that only moves
//! forward. Calendar time never enters the picture, so wall-clock adjustments
//! (SNTP, RTC writes) cannot make the heartbeat double-fire or starve.

use core::ops::Add;
use core::time::Duration;

/// A point on the monotonic timeline, in milliseconds since an arbitrary epoch
/// (usually boot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(u64);

impl Instant {
    /// The epoch.
    pub const ZERO: Instant = Instant(0);

    /// Build an instant from a millisecond tick count.
    pub const fn from_millis(millis: u64) -> Self {
        Instant(millis)
    }

    /// Build an instant from a second tick count.
    pub const fn from_secs(secs: u64) -> Self {
        Instant(secs * 1_000)
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Instant(self.0.saturating_add(millis))
    }
}

/// A monotonic tick source.
pub trait Clock {
    /// The current instant. Successive calls never go backwards.
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

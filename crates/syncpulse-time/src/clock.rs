//! Clock implementations for SyncPulse

use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;
use syncpulse_core::Offset;

/// Monotonic time source driving a run
///
/// INVARIANT: `now()` MUST never decrease between calls.
pub trait Clock {
    /// Time elapsed since the clock's own origin
    fn now(&self) -> Duration;

    /// Passive wait. No polling happens while sleeping.
    fn sleep(&self, duration: Duration);

    /// Offset of the current instant relative to `origin` (a value
    /// previously returned by `now()`)
    fn offset_from(&self, origin: Duration) -> Offset {
        Offset::from_duration(self.now().saturating_sub(origin))
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Host monotonic clock backed by `Instant`
pub struct MonotonicClock {
    /// Clock origin
    reference: Instant,
    /// Sleeper that spins the last stretch of a passive wait, so the
    /// trailing settle time is not stretched by scheduler granularity
    sleeper: SpinSleeper,
}

impl MonotonicClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        MonotonicClock {
            reference: Instant::now(),
            sleeper: SpinSleeper::default(),
        }
    }

    /// Use a custom sleeper (e.g. a different native accuracy)
    pub fn with_sleeper(sleeper: SpinSleeper) -> Self {
        MonotonicClock {
            reference: Instant::now(),
            sleeper,
        }
    }

    /// The `Instant` all readings are relative to
    pub fn reference(&self) -> Instant {
        self.reference
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Duration {
        self.reference.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            self.sleeper.sleep(duration);
        }
    }
}

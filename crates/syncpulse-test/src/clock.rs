//! Virtual clock for simulated runs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use syncpulse_time::Clock;

/// Manually driven monotonic clock
///
/// Clones share the same time, so a scheduler and a simulated device can
/// observe one timeline. Time moves only through `advance`, `sleep`, and
/// the optional per-reading `auto_step`.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    /// Current time in nanoseconds
    nanos: Arc<AtomicU64>,
    /// Added after every `now()` reading
    auto_step: u64,
}

impl ManualClock {
    /// Clock frozen at zero until advanced
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that moves forward by `step` on every reading, so a spin loop
    /// that does no I/O still terminates
    pub fn with_auto_step(step: Duration) -> Self {
        ManualClock {
            nanos: Arc::new(AtomicU64::new(0)),
            auto_step: duration_nanos(step),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }

    /// Current time, without the auto step
    pub fn peek(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.fetch_add(self.auto_step, Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

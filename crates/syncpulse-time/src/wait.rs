//! Wait strategies - reaching a deadline while polling the device
//!
//! The scheduler never sleeps while waiting for an onset or while a pulse
//! is high: every iteration runs the poll action so input changes are seen
//! as early as possible. How the time between polls is spent is up to the
//! strategy.

use std::str::FromStr;
use std::time::Duration;

use syncpulse_core::{SyncError, SyncResult};

use crate::Clock;

/// Waits until `clock.now() >= deadline`, running `poll` while waiting
pub trait WaitStrategy {
    /// Returns as soon as the deadline is reached, or with the first error
    /// `poll` produces. `poll` is never called once the deadline has passed.
    fn wait_until<C, F>(&self, clock: &C, deadline: Duration, poll: F) -> SyncResult<()>
    where
        C: Clock + ?Sized,
        F: FnMut() -> SyncResult<()>;
}

/// Unthrottled spin: poll, read the clock, repeat
///
/// Burns a full core for the whole wait in exchange for the lowest
/// detection latency and onset jitter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpinWait;

impl WaitStrategy for SpinWait {
    #[inline]
    fn wait_until<C, F>(&self, clock: &C, deadline: Duration, mut poll: F) -> SyncResult<()>
    where
        C: Clock + ?Sized,
        F: FnMut() -> SyncResult<()>,
    {
        while clock.now() < deadline {
            poll()?;
            std::hint::spin_loop();
        }
        Ok(())
    }
}

/// Sleep through the slack, spin the final stretch
///
/// Between polls, the part of the remaining time that lies before the last
/// `spin_window` is slept away in slices of at most `max_slice`. Within
/// `spin_window` of the deadline it behaves exactly like `SpinWait`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HybridWait {
    /// Final stretch before the deadline that is always spun
    pub spin_window: Duration,
    /// Longest single sleep between two polls
    pub max_slice: Duration,
}

impl Default for HybridWait {
    fn default() -> Self {
        HybridWait {
            spin_window: Duration::from_millis(2),
            max_slice: Duration::from_millis(1),
        }
    }
}

impl HybridWait {
    pub fn new(spin_window: Duration, max_slice: Duration) -> Self {
        HybridWait {
            spin_window,
            max_slice,
        }
    }

    /// How long to sleep after a poll, given the time left
    fn slice_for(&self, remaining: Duration) -> Duration {
        remaining
            .saturating_sub(self.spin_window)
            .min(self.max_slice)
    }
}

impl WaitStrategy for HybridWait {
    fn wait_until<C, F>(&self, clock: &C, deadline: Duration, mut poll: F) -> SyncResult<()>
    where
        C: Clock + ?Sized,
        F: FnMut() -> SyncResult<()>,
    {
        loop {
            let now = clock.now();
            if now >= deadline {
                return Ok(());
            }
            poll()?;

            let slice = self.slice_for(deadline - now);
            if slice.is_zero() {
                std::hint::spin_loop();
            } else {
                clock.sleep(slice);
            }
        }
    }
}

/// Strategy chosen at runtime from configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitMode {
    Spin(SpinWait),
    Hybrid(HybridWait),
}

impl Default for WaitMode {
    fn default() -> Self {
        WaitMode::Spin(SpinWait)
    }
}

impl WaitMode {
    pub fn name(&self) -> &'static str {
        match self {
            WaitMode::Spin(_) => "spin",
            WaitMode::Hybrid(_) => "hybrid",
        }
    }
}

impl FromStr for WaitMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spin" => Ok(WaitMode::Spin(SpinWait)),
            "hybrid" => Ok(WaitMode::Hybrid(HybridWait::default())),
            other => Err(SyncError::Config(format!(
                "unknown wait strategy '{}' (expected 'spin' or 'hybrid')",
                other
            ))),
        }
    }
}

impl WaitStrategy for WaitMode {
    fn wait_until<C, F>(&self, clock: &C, deadline: Duration, poll: F) -> SyncResult<()>
    where
        C: Clock + ?Sized,
        F: FnMut() -> SyncResult<()>,
    {
        match self {
            WaitMode::Spin(w) => w.wait_until(clock, deadline, poll),
            WaitMode::Hybrid(w) => w.wait_until(clock, deadline, poll),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Clock that advances by `step` on every reading
    struct SteppingClock {
        now: Cell<Duration>,
        step: Duration,
        slept: Cell<Duration>,
    }

    impl SteppingClock {
        fn new(step: Duration) -> Self {
            SteppingClock {
                now: Cell::new(Duration::ZERO),
                step,
                slept: Cell::new(Duration::ZERO),
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Duration {
            let t = self.now.get();
            self.now.set(t + self.step);
            t
        }

        fn sleep(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
            self.slept.set(self.slept.get() + duration);
        }
    }

    #[test]
    fn test_spin_polls_until_deadline() {
        let clock = SteppingClock::new(Duration::from_micros(100));
        let mut polls = 0;

        SpinWait
            .wait_until(&clock, Duration::from_millis(1), || {
                polls += 1;
                Ok(())
            })
            .unwrap();

        // Readings at 0, 100, ..., 900us are before the deadline
        assert_eq!(polls, 10);
        assert!(clock.now() >= Duration::from_millis(1));
    }

    #[test]
    fn test_spin_past_deadline_does_not_poll() {
        let clock = SteppingClock::new(Duration::from_micros(100));
        clock.sleep(Duration::from_millis(5));

        let mut polls = 0;
        SpinWait
            .wait_until(&clock, Duration::from_millis(1), || {
                polls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(polls, 0);
    }

    #[test]
    fn test_poll_error_aborts_wait() {
        let clock = SteppingClock::new(Duration::from_micros(100));
        let mut polls = 0;

        let result = SpinWait.wait_until(&clock, Duration::from_secs(1), || {
            polls += 1;
            if polls == 3 {
                Err(SyncError::Device("unplugged".into()))
            } else {
                Ok(())
            }
        });

        assert!(result.unwrap_err().is_device());
        assert_eq!(polls, 3);
    }

    #[test]
    fn test_hybrid_sleeps_outside_spin_window() {
        let clock = SteppingClock::new(Duration::from_micros(10));
        let wait = HybridWait::new(Duration::from_millis(2), Duration::from_millis(1));
        let mut polls = 0;

        wait.wait_until(&clock, Duration::from_millis(10), || {
            polls += 1;
            Ok(())
        })
        .unwrap();

        // Roughly 8ms slept in 1ms slices, the last 2ms spun in 10us steps
        assert!(clock.slept.get() >= Duration::from_millis(7));
        assert!(clock.slept.get() <= Duration::from_millis(8));
        assert!(polls > 100);
    }

    #[test]
    fn test_hybrid_slice_is_bounded() {
        let wait = HybridWait::default();
        assert_eq!(wait.slice_for(Duration::from_secs(1)), Duration::from_millis(1));
        assert_eq!(wait.slice_for(Duration::from_micros(2500)), Duration::from_micros(500));
        assert_eq!(wait.slice_for(Duration::from_millis(1)), Duration::ZERO);
    }

    #[test]
    fn test_wait_mode_parse() {
        assert_eq!("spin".parse::<WaitMode>().unwrap(), WaitMode::Spin(SpinWait));
        assert_eq!("Hybrid".parse::<WaitMode>().unwrap().name(), "hybrid");
        assert!("sleepy".parse::<WaitMode>().unwrap_err().is_config());
    }
}

//! Time primitives for SyncPulse
//!
//! Every timestamp recorded during a run is an `Offset` from the run
//! origin (t0), captured once from a monotonic clock and never reset.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Offset from the run origin
/// Represented as nanoseconds since t0. Offsets are never negative.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Offset(pub u64);

impl Offset {
    pub const ZERO: Offset = Offset(0);
    pub const MAX: Offset = Offset(u64::MAX);

    #[inline]
    pub fn from_nanos(nanos: u64) -> Self {
        Offset(nanos)
    }

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        Offset(micros.saturating_mul(1_000))
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        Offset(millis.saturating_mul(1_000_000))
    }

    /// Negative and NaN inputs clamp to zero
    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            return Offset::ZERO;
        }
        Offset((secs * 1_000_000_000.0).min(u64::MAX as f64) as u64)
    }

    /// Saturates at `Offset::MAX` for durations beyond ~584 years
    #[inline]
    pub fn from_duration(d: Duration) -> Self {
        Offset(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0 / 1_000
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    #[inline]
    pub fn as_duration(self) -> Duration {
        Duration::from_nanos(self.0)
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        Offset(self.0.saturating_add(Offset::from_duration(duration).0))
    }

    /// Distance from `earlier` to `self`, zero if `earlier` is later
    #[inline]
    pub fn saturating_sub(self, earlier: Offset) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Offset {
    type Output = Offset;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Offset> for Offset {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Offset) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl From<Duration> for Offset {
    fn from(d: Duration) -> Self {
        Offset::from_duration(d)
    }
}

impl std::fmt::Debug for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t0+{:.6}s", self.as_secs_f64())
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}", self.as_secs_f64())
    }
}

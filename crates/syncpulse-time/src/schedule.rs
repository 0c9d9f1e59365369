//! Onset schedule - when each pulse is due, relative to t0

use std::time::Duration;

use syncpulse_core::{Offset, PulseConfig};

/// Immutable sequence of scheduled onsets, `i * period` for `i` in `[0, N)`
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Schedule {
    period: Duration,
    onsets: Vec<Offset>,
}

impl Schedule {
    /// Compute `count` equally spaced onsets starting at t0
    pub fn new(period: Duration, count: u32) -> Self {
        let onsets = (0..count)
            .map(|i| Offset::from_duration(period.saturating_mul(i)))
            .collect();
        Schedule { period, onsets }
    }

    /// Schedule for a pulse train configuration
    pub fn for_config(config: &PulseConfig) -> Self {
        Self::new(config.period(), config.pulse_count)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn len(&self) -> usize {
        self.onsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Offset> {
        self.onsets.get(index).copied()
    }

    /// Last scheduled onset, if any
    pub fn last(&self) -> Option<Offset> {
        self.onsets.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Offset> + '_ {
        self.onsets.iter().copied()
    }

    pub fn as_slice(&self) -> &[Offset] {
        &self.onsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_schedule() {
        // 1s high + 4s low, 10 periods
        let config = PulseConfig::new(Duration::from_secs(1), Duration::from_secs(4), 10);
        let schedule = Schedule::for_config(&config);

        let expected: Vec<Offset> = (0..10).map(|i| Offset::from_millis(i * 5000)).collect();
        assert_eq!(schedule.as_slice(), expected.as_slice());
        assert_eq!(schedule.last(), Some(Offset::from_millis(45_000)));
        assert_eq!(schedule.period(), Duration::from_secs(5));
    }

    #[test]
    fn test_empty_schedule() {
        let schedule = Schedule::new(Duration::from_secs(1), 0);
        assert!(schedule.is_empty());
        assert_eq!(schedule.last(), None);
        assert_eq!(schedule.get(0), None);
    }

    proptest! {
        #[test]
        fn prop_onsets_are_multiples_of_period(period_us in 1u64..10_000_000, count in 0u32..200) {
            let period = Duration::from_micros(period_us);
            let schedule = Schedule::new(period, count);

            prop_assert_eq!(schedule.len(), count as usize);
            for (i, onset) in schedule.iter().enumerate() {
                prop_assert_eq!(onset.as_duration(), period * i as u32);
            }
        }

        #[test]
        fn prop_onsets_strictly_increase(period_us in 1u64..10_000_000, count in 2u32..200) {
            let schedule = Schedule::new(Duration::from_micros(period_us), count);
            for pair in schedule.as_slice().windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}

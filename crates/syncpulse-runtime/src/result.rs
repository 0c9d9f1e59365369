//! Outcome of a completed run

use std::time::Duration;

use syncpulse_core::{InputEvent, Offset};
use syncpulse_time::Schedule;

/// Everything measured during a successful run, relative to t0
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunResult {
    /// When each pulse was due
    pub schedule: Schedule,
    /// When each pulse actually started; one per schedule entry
    pub actual_onsets: Vec<Offset>,
    /// Changes seen on the input line, in order
    pub input_events: Vec<InputEvent>,
    /// Time from t0 to the end of the settle wait
    pub total_elapsed: Offset,
}

impl RunResult {
    pub fn pulse_count(&self) -> usize {
        self.actual_onsets.len()
    }

    /// Offsets of the input events, without their states
    pub fn event_offsets(&self) -> Vec<Offset> {
        self.input_events.iter().map(|e| e.offset).collect()
    }

    /// How late each pulse started relative to its scheduled onset
    pub fn onset_lateness(&self) -> Vec<Duration> {
        self.schedule
            .iter()
            .zip(&self.actual_onsets)
            .map(|(scheduled, actual)| *actual - scheduled)
            .collect()
    }

    /// Worst onset lateness, `None` for an empty run
    pub fn max_lateness(&self) -> Option<Duration> {
        self.onset_lateness().into_iter().max()
    }

    /// Average onset lateness, `None` for an empty run
    pub fn mean_lateness(&self) -> Option<Duration> {
        let lateness = self.onset_lateness();
        if lateness.is_empty() {
            return None;
        }
        let total: Duration = lateness.iter().sum();
        Some(total / lateness.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncpulse_core::LineState;

    fn result() -> RunResult {
        RunResult {
            schedule: Schedule::new(Duration::from_secs(1), 3),
            actual_onsets: vec![
                Offset::from_micros(10),
                Offset::from_micros(1_000_030),
                Offset::from_micros(2_000_020),
            ],
            input_events: vec![InputEvent::new(Offset::from_millis(1500), LineState::from(&b"1"[..]))],
            total_elapsed: Offset::from_secs_f64(3.5),
        }
    }

    #[test]
    fn test_onset_lateness() {
        let r = result();
        assert_eq!(
            r.onset_lateness(),
            vec![
                Duration::from_micros(10),
                Duration::from_micros(30),
                Duration::from_micros(20)
            ]
        );
        assert_eq!(r.max_lateness(), Some(Duration::from_micros(30)));
        assert_eq!(r.mean_lateness(), Some(Duration::from_micros(20)));
    }

    #[test]
    fn test_empty_result() {
        let r = RunResult::default();
        assert_eq!(r.pulse_count(), 0);
        assert_eq!(r.max_lateness(), None);
        assert_eq!(r.mean_lateness(), None);
    }

    #[test]
    fn test_event_offsets() {
        assert_eq!(result().event_offsets(), vec![Offset::from_millis(1500)]);
    }
}

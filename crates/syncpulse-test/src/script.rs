//! Scripted input-line waveforms
//!
//! A script maps simulated time to the bytes the controller would answer
//! for a read of the input line.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use syncpulse_core::LineState;

/// Answer for a low line
pub const LOW: &[u8] = b"0";
/// Answer for a high line
pub const HIGH: &[u8] = b"1";

/// Piecewise-constant line state over time
#[derive(Clone, Debug)]
pub struct LineScript {
    /// State before the first transition
    initial: LineState,
    /// Transitions, sorted by time
    transitions: Vec<(Duration, LineState)>,
}

impl LineScript {
    /// Line that starts in `initial` and never changes
    pub fn constant(initial: impl Into<LineState>) -> Self {
        LineScript {
            initial: initial.into(),
            transitions: Vec::new(),
        }
    }

    /// Line that stays low
    pub fn low() -> Self {
        Self::constant(LOW)
    }

    /// Add a transition. Transitions may be added in any order.
    pub fn then_at(mut self, at: Duration, state: impl Into<LineState>) -> Self {
        let state = state.into();
        let pos = self
            .transitions
            .binary_search_by(|(t, _)| t.cmp(&at))
            .unwrap_or_else(|p| p);
        self.transitions.insert(pos, (at, state));
        self
    }

    /// Low line toggling at each of the given times
    pub fn toggles(times: &[Duration]) -> Self {
        let mut script = Self::low();
        for (i, &at) in times.iter().enumerate() {
            let state = if i % 2 == 0 { HIGH } else { LOW };
            script = script.then_at(at, state);
        }
        script
    }

    /// Low line that goes high at `at` with contact bounce: `bounces`
    /// extra high/low pairs precede the final rise, consecutive
    /// transitions being `min_gap..2*min_gap` apart
    pub fn bouncing(at: Duration, bounces: u32, min_gap: Duration, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let gap_us = min_gap.as_micros().max(1) as u64;

        let mut times = Vec::with_capacity(2 * bounces as usize + 1);
        let mut t = at;
        for _ in 0..(2 * bounces + 1) {
            times.push(t);
            t += Duration::from_micros(rng.gen_range(gap_us..2 * gap_us));
        }
        Self::toggles(&times)
    }

    /// State of the line at time `t`
    pub fn state_at(&self, t: Duration) -> &LineState {
        let idx = self.transitions.partition_point(|(at, _)| *at <= t);
        if idx == 0 {
            &self.initial
        } else {
            &self.transitions[idx - 1].1
        }
    }

    pub fn initial(&self) -> &LineState {
        &self.initial
    }

    pub fn transitions(&self) -> &[(Duration, LineState)] {
        &self.transitions
    }

    /// Number of transitions that actually change the state
    pub fn change_count(&self) -> usize {
        let mut current = &self.initial;
        let mut changes = 0;
        for (_, state) in &self.transitions {
            if state != current {
                changes += 1;
                current = state;
            }
        }
        changes
    }
}

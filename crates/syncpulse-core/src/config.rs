//! Pulse train configuration
//!
//! Validation happens before the run clock starts so that an invalid
//! request never touches the device.

use std::time::Duration;

use crate::{Line, SyncError, SyncResult};

/// Pulse train parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PulseConfig {
    /// How long the output line stays asserted per cycle (> 0)
    pub pulse_duration: Duration,
    /// Rest time between the end of a pulse and the next onset
    pub inter_pulse_gap: Duration,
    /// Number of pulses to emit
    pub pulse_count: u32,
    /// Line driven with the square wave
    pub output_line: Line,
    /// Line polled for state changes
    pub input_line: Line,
}

impl Default for PulseConfig {
    fn default() -> Self {
        // 1s high, 4s low, 10 periods
        PulseConfig {
            pulse_duration: Duration::from_secs(1),
            inter_pulse_gap: Duration::from_secs(4),
            pulse_count: 10,
            output_line: Line::ONE,
            input_line: Line::TWO,
        }
    }
}

impl PulseConfig {
    pub fn new(pulse_duration: Duration, inter_pulse_gap: Duration, pulse_count: u32) -> Self {
        PulseConfig {
            pulse_duration,
            inter_pulse_gap,
            pulse_count,
            ..Default::default()
        }
    }

    /// Build from raw numbers as found in config files and on the command line
    pub fn from_secs(pulse_duration: f64, inter_pulse_gap: f64, pulse_count: i64) -> SyncResult<Self> {
        if !pulse_duration.is_finite() || pulse_duration <= 0.0 {
            return Err(SyncError::Config(format!(
                "pulse_duration must be a positive number of seconds, got {}",
                pulse_duration
            )));
        }
        if !inter_pulse_gap.is_finite() || inter_pulse_gap < 0.0 {
            return Err(SyncError::Config(format!(
                "inter_pulse_gap must be zero or a positive number of seconds, got {}",
                inter_pulse_gap
            )));
        }
        let pulse_count = u32::try_from(pulse_count).map_err(|_| {
            SyncError::Config(format!(
                "pulse_count must be between 0 and {}, got {}",
                u32::MAX,
                pulse_count
            ))
        })?;

        let config = PulseConfig::new(
            Duration::from_secs_f64(pulse_duration),
            Duration::from_secs_f64(inter_pulse_gap),
            pulse_count,
        );
        config.validate()?;
        Ok(config)
    }

    pub fn with_lines(mut self, output_line: Line, input_line: Line) -> Self {
        self.output_line = output_line;
        self.input_line = input_line;
        self
    }

    /// Spacing between consecutive onsets
    pub fn period(&self) -> Duration {
        self.pulse_duration.saturating_add(self.inter_pulse_gap)
    }

    /// Check every parameter. Performs no I/O.
    pub fn validate(&self) -> SyncResult<()> {
        if self.pulse_duration.is_zero() {
            return Err(SyncError::Config("pulse_duration must be greater than zero".into()));
        }
        if self.output_line == self.input_line {
            return Err(SyncError::Config(format!(
                "output and input must be different lines (both are {})",
                self.output_line
            )));
        }
        let span = self
            .pulse_duration
            .checked_add(self.inter_pulse_gap)
            .and_then(|period| period.checked_mul(self.pulse_count));
        if span.is_none() {
            return Err(SyncError::Config(format!(
                "{} periods of {:?} overflow the run clock",
                self.pulse_count,
                self.period()
            )));
        }
        Ok(())
    }

    /// Time from t0 until the output line falls for the last time
    pub fn active_span(&self) -> Duration {
        match self.pulse_count {
            0 => Duration::ZERO,
            n => self
                .period()
                .saturating_mul(n - 1)
                .saturating_add(self.pulse_duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PulseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.period(), Duration::from_secs(5));
        assert_eq!(config.active_span(), Duration::from_secs(46));
    }

    #[test]
    fn test_from_secs_rejects_bad_values() {
        assert!(PulseConfig::from_secs(0.0, 1.0, 1).unwrap_err().is_config());
        assert!(PulseConfig::from_secs(-1.0, 1.0, 1).is_err());
        assert!(PulseConfig::from_secs(f64::NAN, 1.0, 1).is_err());
        assert!(PulseConfig::from_secs(1.0, -0.5, 1).is_err());
        assert!(PulseConfig::from_secs(1.0, f64::INFINITY, 1).is_err());
        assert!(PulseConfig::from_secs(1.0, 1.0, -1).is_err());
    }

    #[test]
    fn test_from_secs_accepts_zero_gap_and_count() {
        let config = PulseConfig::from_secs(0.25, 0.0, 0).unwrap();
        assert_eq!(config.pulse_count, 0);
        assert_eq!(config.period(), Duration::from_millis(250));
        assert_eq!(config.active_span(), Duration::ZERO);
    }

    #[test]
    fn test_same_line_rejected() {
        let config = PulseConfig::default().with_lines(Line::ONE, Line::ONE);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overflowing_schedule_rejected() {
        let config = PulseConfig::new(Duration::MAX, Duration::ZERO, 2);
        assert!(config.validate().is_err());
    }
}

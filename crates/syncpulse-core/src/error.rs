//! Error types for SyncPulse

use thiserror::Error;

/// Core SyncPulse errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// The channel could not be opened, or a read/write failed at the
    /// transport level. Never retried.
    #[error("Device error: {0}")]
    Device(String),

    /// Invalid run parameters, detected before any device interaction.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Run cancelled after {completed} of {requested} pulses")]
    Cancelled { completed: u32, requested: u32 },
}

impl SyncError {
    /// Shorthand for wrapping a transport-level failure
    pub fn device(err: impl std::fmt::Display) -> Self {
        SyncError::Device(err.to_string())
    }

    pub fn is_device(&self) -> bool {
        matches!(self, SyncError::Device(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, SyncError::Config(_))
    }
}

/// Result type for SyncPulse operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::device("port /dev/ttyUSB0 not found");
        assert_eq!(err.to_string(), "Device error: port /dev/ttyUSB0 not found");
        assert!(err.is_device());

        let err = SyncError::Cancelled {
            completed: 3,
            requested: 10,
        };
        assert_eq!(err.to_string(), "Run cancelled after 3 of 10 pulses");
        assert!(!err.is_config());
    }
}

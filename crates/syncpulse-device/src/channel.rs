//! Device channel abstraction
//!
//! The scheduler only ever writes single command bytes and reads short
//! answers with a timeout. Anything that can do that, a serial port or a
//! simulated controller, is a `DeviceChannel`.

use std::time::Duration;

use syncpulse_core::{SyncError, SyncResult};

use crate::{Command, ReturnMode, PING_REPLY};

/// Byte-oriented channel to the I/O controller
pub trait DeviceChannel {
    /// Send one command byte
    fn write(&mut self, command: Command) -> SyncResult<()>;

    /// Read up to `max_bytes`. Returns an empty buffer when nothing arrived
    /// within the channel's read timeout.
    fn read(&mut self, max_bytes: usize) -> SyncResult<Vec<u8>>;

    /// Release the channel. Further I/O fails with a device error.
    fn close(&mut self) -> SyncResult<()>;

    /// Check that a controller is listening
    fn ping(&mut self) -> SyncResult<bool> {
        self.write(Command::Ping)?;
        let reply = self.read(8)?;
        Ok(reply.first() == Some(&PING_REPLY))
    }
}

impl<D: DeviceChannel + ?Sized> DeviceChannel for &mut D {
    fn write(&mut self, command: Command) -> SyncResult<()> {
        (**self).write(command)
    }

    fn read(&mut self, max_bytes: usize) -> SyncResult<Vec<u8>> {
        (**self).read(max_bytes)
    }

    fn close(&mut self) -> SyncResult<()> {
        (**self).close()
    }

    fn ping(&mut self) -> SyncResult<bool> {
        (**self).ping()
    }
}

impl<D: DeviceChannel + ?Sized> DeviceChannel for Box<D> {
    fn write(&mut self, command: Command) -> SyncResult<()> {
        (**self).write(command)
    }

    fn read(&mut self, max_bytes: usize) -> SyncResult<Vec<u8>> {
        (**self).read(max_bytes)
    }

    fn close(&mut self) -> SyncResult<()> {
        (**self).close()
    }

    fn ping(&mut self) -> SyncResult<bool> {
        (**self).ping()
    }
}

/// Something that can open a ready-to-use channel
pub trait ChannelOpener {
    type Channel: DeviceChannel;

    /// Open the channel. Fails with `SyncError::Device` when the controller
    /// is unreachable or does not pass the handshake.
    fn open(&self) -> SyncResult<Self::Channel>;
}

/// Serial connection parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Port identifier (e.g. /dev/ttyUSB0, COM3)
    pub port: String,
    /// Transmission speed in bits/s
    pub baud_rate: u32,
    /// Per-read timeout
    pub read_timeout: Duration,
    /// Require a ping answer right after opening
    pub ping_on_open: bool,
    /// Switch the answer format after opening; `None` leaves the device as is
    pub return_mode: Option<ReturnMode>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(100),
            ping_on_open: false,
            return_mode: None,
        }
    }
}

impl DeviceConfig {
    pub fn new(port: impl Into<String>) -> Self {
        DeviceConfig {
            port: port.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.port.trim().is_empty() {
            return Err(SyncError::Config("port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(SyncError::Config("baud_rate must be greater than zero".into()));
        }
        if self.read_timeout.is_zero() {
            return Err(SyncError::Config("read_timeout must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Post-open handshake shared by every opener
pub fn prepare_channel<D: DeviceChannel>(channel: &mut D, config: &DeviceConfig) -> SyncResult<()> {
    if config.ping_on_open && !channel.ping()? {
        return Err(SyncError::Device(format!(
            "no controller answered the ping on {}",
            config.port
        )));
    }
    if let Some(mode) = config.return_mode {
        channel.write(mode.command())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Channel answering from a queue of canned replies
    #[derive(Default)]
    struct CannedChannel {
        written: Vec<Command>,
        replies: VecDeque<Vec<u8>>,
    }

    impl DeviceChannel for CannedChannel {
        fn write(&mut self, command: Command) -> SyncResult<()> {
            self.written.push(command);
            Ok(())
        }

        fn read(&mut self, _max_bytes: usize) -> SyncResult<Vec<u8>> {
            Ok(self.replies.pop_front().unwrap_or_default())
        }

        fn close(&mut self) -> SyncResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_ping() {
        let mut channel = CannedChannel::default();
        channel.replies.push_back(vec![b'Q']);
        assert!(channel.ping().unwrap());

        // Silence is not an answer
        assert!(!channel.ping().unwrap());
        assert_eq!(channel.written, vec![Command::Ping, Command::Ping]);
    }

    #[test]
    fn test_prepare_requires_ping_answer() {
        let mut channel = CannedChannel::default();
        let config = DeviceConfig {
            ping_on_open: true,
            ..Default::default()
        };
        assert!(prepare_channel(&mut channel, &config).unwrap_err().is_device());
    }

    #[test]
    fn test_prepare_sets_return_mode() {
        let mut channel = CannedChannel::default();
        channel.replies.push_back(vec![b'Q']);
        let config = DeviceConfig {
            ping_on_open: true,
            return_mode: Some(ReturnMode::Binary),
            ..Default::default()
        };

        prepare_channel(&mut channel, &config).unwrap();
        assert_eq!(channel.written, vec![Command::Ping, Command::BinaryMode]);
    }

    #[test]
    fn test_device_config_validate() {
        assert!(DeviceConfig::default().validate().is_ok());
        assert!(DeviceConfig::new("  ").validate().is_err());

        let config = DeviceConfig {
            read_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_config());
    }
}

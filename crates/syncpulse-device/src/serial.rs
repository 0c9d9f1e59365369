//! Serial port channel implementation

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use syncpulse_core::{SyncError, SyncResult};

use crate::{prepare_channel, ChannelOpener, Command, DeviceChannel, DeviceConfig};

/// Device channel over a serial (USB CDC / FTDI) port
pub struct SerialChannel {
    /// Open port, `None` once closed
    port: Option<Box<dyn SerialPort>>,
    /// Port identifier, kept for error messages
    name: String,
    /// Budget for one `read` call, however many chunks the answer arrives in
    read_timeout: Duration,
    /// Scratch buffer reused across reads
    buf: Vec<u8>,
}

impl SerialChannel {
    /// Open the port described by `config` (8 data bits, no parity, one
    /// stop bit) and run the configured handshake
    pub fn open(config: &DeviceConfig) -> SyncResult<Self> {
        config.validate()?;

        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| {
                SyncError::Device(format!(
                    "cannot open {} at {} bps: {}",
                    config.port, config.baud_rate, e
                ))
            })?;

        // Drop anything left over from a previous session
        if let Err(e) = port.clear(ClearBuffer::All) {
            tracing::warn!(port = %config.port, "failed to clear serial buffers: {}", e);
        }

        let mut channel = SerialChannel::from_port(port, config.port.clone(), config.read_timeout);
        prepare_channel(&mut channel, config)?;

        tracing::info!(
            port = %config.port,
            baud_rate = config.baud_rate,
            read_timeout = ?config.read_timeout,
            "serial channel open"
        );
        Ok(channel)
    }

    /// Wrap an already configured port; no handshake is run
    pub fn from_port(port: Box<dyn SerialPort>, name: impl Into<String>, read_timeout: Duration) -> Self {
        SerialChannel {
            port: Some(port),
            name: name.into(),
            read_timeout,
            buf: Vec::new(),
        }
    }

    /// Port identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_mut(&mut self) -> SyncResult<&mut Box<dyn SerialPort>> {
        let name = &self.name;
        self.port
            .as_mut()
            .ok_or_else(|| SyncError::Device(format!("{} is closed", name)))
    }
}

impl DeviceChannel for SerialChannel {
    fn write(&mut self, command: Command) -> SyncResult<()> {
        let port = self.port_mut()?;
        port.write_all(&[command.byte()])
            .map_err(|e| SyncError::Device(format!("write {:?} failed: {}", command, e)))
    }

    /// Collects up to `max_bytes`, waiting at most `read_timeout` from the
    /// first call for the rest of a reply that arrives in several chunks
    fn read(&mut self, max_bytes: usize) -> SyncResult<Vec<u8>> {
        let read_timeout = self.read_timeout;
        let deadline = Instant::now() + read_timeout;
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        buf.resize(max_bytes, 0);

        let port = self.port_mut()?;
        let mut filled = 0;
        let mut shortened = false;
        let mut outcome = Ok(());

        while filled < max_bytes {
            if filled > 0 {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                if let Err(e) = port.set_timeout(remaining) {
                    outcome = Err(SyncError::Device(format!("cannot set read timeout: {}", e)));
                    break;
                }
                shortened = true;
            }

            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Nothing more arrived within the timeout
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => {
                    outcome = Err(SyncError::Device(format!("read failed: {}", e)));
                    break;
                }
            }
        }

        if shortened {
            if let Err(e) = port.set_timeout(read_timeout) {
                tracing::warn!("cannot restore read timeout: {}", e);
            }
        }

        let out = outcome.map(|()| buf[..filled].to_vec());
        self.buf = buf;
        out
    }

    fn close(&mut self) -> SyncResult<()> {
        if let Some(mut port) = self.port.take() {
            port.flush()
                .map_err(|e| SyncError::Device(format!("flush on close failed: {}", e)))?;
            tracing::debug!(port = %self.name, "serial channel closed");
        }
        Ok(())
    }
}

impl ChannelOpener for DeviceConfig {
    type Channel = SerialChannel;

    fn open(&self) -> SyncResult<SerialChannel> {
        SerialChannel::open(self)
    }
}

/// A serial port found on the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// Enumerate the serial ports on this host
pub fn list_ports() -> SyncResult<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(SyncError::device)?;

    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(usb) => {
                    let product = usb.product.unwrap_or_else(|| "USB serial".to_string());
                    format!("{} [{:04x}:{:04x}]", product, usb.vid, usb.pid)
                }
                SerialPortType::PciPort => "PCI serial".to_string(),
                SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
                SerialPortType::Unknown => "unknown".to_string(),
            };
            PortInfo {
                name: p.port_name,
                description,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_is_device_error() {
        let config = DeviceConfig::new("/dev/syncpulse-no-such-port");
        let err = SerialChannel::open(&config).err().unwrap();
        assert!(err.is_device());
        assert!(err.to_string().contains("/dev/syncpulse-no-such-port"));
    }

    #[cfg(unix)]
    fn pty_channel(read_timeout: Duration) -> (serialport::TTYPort, SerialChannel) {
        let (controller, port) = serialport::TTYPort::pair().unwrap();
        let channel = SerialChannel::from_port(Box::new(port), "pty", read_timeout);
        (controller, channel)
    }

    #[cfg(unix)]
    #[test]
    fn test_read_joins_reply_split_across_chunks() {
        let (mut controller, mut channel) = pty_channel(Duration::from_millis(200));

        let writer = std::thread::spawn(move || {
            controller.write_all(b"0").unwrap();
            std::thread::sleep(Duration::from_millis(10));
            controller.write_all(b"\n\r").unwrap();
            controller
        });

        assert_eq!(channel.read(3).unwrap(), b"0\n\r");
        let _controller = writer.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_read_returns_partial_reply_on_timeout() {
        let (mut controller, mut channel) = pty_channel(Duration::from_millis(50));

        controller.write_all(b"1").unwrap();
        let started = Instant::now();
        assert_eq!(channel.read(3).unwrap(), b"1");
        assert!(started.elapsed() < Duration::from_secs(1));

        // Silence reads as empty
        assert!(channel.read(3).unwrap().is_empty());
    }

    #[test]
    fn test_open_rejects_invalid_config_first() {
        let config = DeviceConfig {
            baud_rate: 0,
            ..DeviceConfig::new("/dev/syncpulse-no-such-port")
        };
        assert!(config.open().err().unwrap().is_config());
    }
}

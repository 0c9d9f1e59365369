//! SyncPulse Device Layer - talking to the I/O controller
//!
//! This crate provides:
//! - The single-byte command alphabet of the controller
//! - The `DeviceChannel` abstraction the scheduler drives
//! - A serial port implementation and port discovery

pub mod command;
pub mod channel;
pub mod serial;

pub use command::*;
pub use channel::*;
pub use serial::{list_ports, PortInfo, SerialChannel};

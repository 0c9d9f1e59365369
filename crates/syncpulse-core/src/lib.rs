//! SyncPulse Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every SyncPulse crate:
//! - Time offsets relative to a run origin (Offset)
//! - Digital I/O lines and observed line states (Line, LineState, InputEvent)
//! - Pulse train configuration and its validation (PulseConfig)
//! - The error taxonomy (SyncError)

pub mod time;
pub mod line;
pub mod config;
pub mod error;

pub use time::*;
pub use line::*;
pub use config::*;
pub use error::*;

//! SyncPulse Time - Clocks, schedules and wait strategies
//!
//! This crate implements the timing side of a run:
//! - A monotonic clock abstraction (real or simulated)
//! - Onset schedules (i * period)
//! - Waiting for a deadline while polling, either by pure spinning or by
//!   sleeping through the slack and spinning the final stretch

pub mod clock;
pub mod schedule;
pub mod wait;

pub use clock::*;
pub use schedule::*;
pub use wait::*;

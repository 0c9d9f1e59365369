//! SyncPulse Test Harness - Deterministic simulation of a run
//!
//! This crate provides:
//! - A virtual monotonic clock shared between scheduler and device
//! - Scripted input-line waveforms, including contact bounce
//! - A simulated I/O controller with I/O latency, jitter, dropped
//!   replies and injected transport failures
//! - A command log to check the emitted output waveform

pub mod clock;
pub mod script;
pub mod device;

pub use clock::*;
pub use script::*;
pub use device::*;

//! SyncPulse Runtime - The pulse-and-poll loop
//!
//! One run goes through these phases for every scheduled pulse:
//! 1. Wait: poll the input line until the onset is due
//! 2. Rise: record the onset, assert the output line
//! 3. High: keep polling for the pulse duration
//! 4. Fall: deassert the output line
//!
//! followed by a passive settle wait of one inter-pulse gap. Every input
//! change seen while polling is timestamped against the same origin as
//! the onsets.

pub mod cancel;
pub mod observe;
pub mod result;
pub mod scheduler;
pub mod report;

pub use cancel::*;
pub use observe::*;
pub use result::*;
pub use scheduler::*;
pub use report::*;

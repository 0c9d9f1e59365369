//! Digital I/O lines and observed line states
//!
//! The controller exposes eight numbered lines. A run drives one of them
//! as output and polls another one as input. What the device answers to a
//! read request is kept as an opaque byte snapshot and compared by value.

use std::fmt;

use bytes::Bytes;

use crate::{Offset, SyncError, SyncResult};

/// Digital I/O line number (1-based, as printed on the device)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Line(u8);

impl Line {
    pub const COUNT: u8 = 8;

    /// Default output line
    pub const ONE: Line = Line(1);
    /// Default input line
    pub const TWO: Line = Line(2);

    /// Create a line, rejecting numbers outside 1..=8
    pub fn new(number: u8) -> SyncResult<Self> {
        if (1..=Self::COUNT).contains(&number) {
            Ok(Line(number))
        } else {
            Err(SyncError::Config(format!(
                "line {} out of range 1..={}",
                number,
                Self::COUNT
            )))
        }
    }

    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based position, for command table lookups
    #[inline]
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line({})", self.0)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of the bytes returned by one read of the input line
///
/// Equality is exact byte equality, so a length difference is a change.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct LineState(Bytes);

impl LineState {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        LineState(bytes.into())
    }

    pub fn empty() -> Self {
        LineState(Bytes::new())
    }

    /// An empty read means "nothing arrived", not a state
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<u8>> for LineState {
    fn from(v: Vec<u8>) -> Self {
        LineState(Bytes::from(v))
    }
}

impl From<&'static [u8]> for LineState {
    fn from(v: &'static [u8]) -> Self {
        LineState(Bytes::from_static(v))
    }
}

impl fmt::Debug for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineState({:?})", self.0)
    }
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ASCII mode answers are printable, binary mode ones are not
        if self.0.iter().all(|b| b.is_ascii_graphic()) {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "{:02x?}", self.0.as_ref())
        }
    }
}

/// A state change observed on the input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputEvent {
    /// When the change was observed, relative to t0
    pub offset: Offset,
    /// The newly observed state
    pub state: LineState,
}

impl InputEvent {
    pub fn new(offset: Offset, state: LineState) -> Self {
        InputEvent { offset, state }
    }
}

//! Input-line change detection

use syncpulse_core::LineState;

/// Last two distinct states seen on the input line
///
/// `current` is what the last non-empty read returned; `previous` is the
/// state it replaced. Empty reads never enter either slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservedState {
    previous: Option<LineState>,
    current: LineState,
}

impl ObservedState {
    /// Start from the answer of the priming read (possibly empty)
    pub fn primed(initial: LineState) -> Self {
        ObservedState {
            previous: None,
            current: initial,
        }
    }

    /// Feed a fresh read. Returns true if it is a change.
    pub fn observe(&mut self, state: LineState) -> bool {
        if state.is_empty() || state == self.current {
            return false;
        }
        self.previous = Some(std::mem::replace(&mut self.current, state));
        true
    }

    pub fn current(&self) -> &LineState {
        &self.current
    }

    pub fn previous(&self) -> Option<&LineState> {
        self.previous.as_ref()
    }
}

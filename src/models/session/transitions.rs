use anyhow::{bail, Result};

use super::types::SessionState;

impl SessionState {
    /// Check if moving from the current state to `new_state` is valid.
    ///
    /// Valid transitions:
    /// - `NotInSession` -> `Transitioning` | `Stopped` | `Unrecoverable`
    /// - `Transitioning` -> `NotInSession` | `InSession` | `Stopped` | `Unrecoverable`
    /// - `InSession` -> `Transitioning` | `NotInSession` | `Stopped` | `Unrecoverable`
    ///
    /// `Stopped` and `Unrecoverable` are terminal.
    pub fn can_transition_to(&self, new_state: &SessionState) -> bool {
        if self == new_state {
            return true;
        }

        match self {
            SessionState::NotInSession => matches!(
                new_state,
                SessionState::Transitioning | SessionState::Stopped | SessionState::Unrecoverable
            ),
            SessionState::Transitioning => !matches!(new_state, SessionState::Transitioning),
            SessionState::InSession => matches!(
                new_state,
                SessionState::Transitioning
                    | SessionState::NotInSession
                    | SessionState::Stopped
                    | SessionState::Unrecoverable
            ),
            SessionState::Stopped | SessionState::Unrecoverable => false,
        }
    }

    /// Attempt to move to `new_state`, returning an error if invalid.
    pub fn try_transition(&self, new_state: SessionState) -> Result<SessionState> {
        if self.can_transition_to(&new_state) {
            Ok(new_state)
        } else {
            bail!("Invalid session state transition: {self} -> {new_state}")
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Unrecoverable)
    }
}

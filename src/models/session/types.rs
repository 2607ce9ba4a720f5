use serde::{Deserialize, Serialize};

/// Where the supervisor's client currently is, as far as the supervisor knows.
///
/// Owned by the supervisor control loop and changed only at its transition
/// points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// In menus, character selection or the lobby.
    #[default]
    NotInSession,
    /// Between screens: navigating menus or leaving a session.
    Transitioning,
    /// Playing a session.
    InSession,
    /// Stopped on request. The supervisor will not continue.
    Stopped,
    /// The client needs a full restart.
    Unrecoverable,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NotInSession => write!(f, "NotInSession"),
            SessionState::Transitioning => write!(f, "Transitioning"),
            SessionState::InSession => write!(f, "InSession"),
            SessionState::Stopped => write!(f, "Stopped"),
            SessionState::Unrecoverable => write!(f, "Unrecoverable"),
        }
    }
}

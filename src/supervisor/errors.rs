//! Error taxonomy of the supervisor.
//!
//! - [`MenuError`]: outcome of one menu navigator step.
//! - [`RunError`]: how the gameplay executor ended a session.
//! - [`SupervisorError`]: why [`super::Supervisor::start`] gave up.
//!
//! [`Termination`] is the caller-facing view: retry, stopped on purpose, or
//! restart the client.

use crate::context::CancelReason;

/// What the caller of the supervisor should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Try again without touching the client.
    Retryable,
    /// Stopped on request or by configuration. Nothing to do.
    Stop,
    /// Kill and relaunch the client.
    Restart,
}

/// Menu conditions that resolve themselves. Never counted as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Loading,
    Idle,
    Noop,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientKind::Loading => write!(f, "loading screen"),
            TransientKind::Idle => write!(f, "idle"),
            TransientKind::Noop => write!(f, "no-op"),
        }
    }
}

/// Outcome of a failed menu navigator step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MenuError {
    #[error("{0}")]
    Transient(TransientKind),
    #[error("[Menu Flow]: {reason}")]
    Retryable { reason: String },
    #[error("unrecoverable client state: {reason}")]
    Unrecoverable { reason: String },
}

impl MenuError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        MenuError::Retryable {
            reason: reason.into(),
        }
    }

    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        MenuError::Unrecoverable {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> Termination {
        match self {
            MenuError::Transient(_) | MenuError::Retryable { .. } => Termination::Retryable,
            MenuError::Unrecoverable { .. } => Termination::Restart,
        }
    }
}

/// Why a gameplay session ended early.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("player chicken")]
    Chicken,
    #[error("mercenary chicken")]
    MercChicken,
    #[error("player died")]
    Died,
    #[error("session interrupted: {0}")]
    Cancelled(CancelReason),
    #[error("{0}")]
    Other(String),
}

impl RunError {
    /// Player or mercenary emergency retreat.
    pub fn is_emergency_retreat(&self) -> bool {
        matches!(self, RunError::Chicken | RunError::MercChicken)
    }
}

/// Reason [`super::Supervisor::start`] returned without a stop request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    /// The client is in a state no retry can fix.
    #[error("unrecoverable client state, forcing restart: {reason}")]
    Unrecoverable { reason: String },
    /// The client could not be started.
    #[error("failed to prepare client: {0}")]
    Prepare(String),
    /// Leaving a successfully finished session failed.
    #[error("error exiting session: {0}")]
    ExitFailed(String),
}

impl SupervisorError {
    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        SupervisorError::Unrecoverable {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> Termination {
        match self {
            SupervisorError::Unrecoverable { .. } | SupervisorError::Prepare(_) => {
                Termination::Restart
            }
            SupervisorError::ExitFailed(_) => Termination::Retryable,
        }
    }

    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, SupervisorError::Unrecoverable { .. })
    }
}

impl Termination {
    /// Classify the return value of [`super::Supervisor::start`].
    pub fn of(result: &Result<(), SupervisorError>) -> Self {
        match result {
            Ok(()) => Termination::Stop,
            Err(e) => e.kind(),
        }
    }
}

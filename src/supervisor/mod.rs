//! Per-character session supervisor.
//!
//! A [`Supervisor`] owns one client. Outside a session it drives the
//! [`MenuNavigator`]; inside a session it runs the gameplay executor next to
//! the [`ActivityWatchdog`] and, for leaders, the heartbeat broadcaster.
//! Anything it cannot recover from ends [`Supervisor::start`] with
//! [`SupervisorError::Unrecoverable`].

mod classify;
mod control;
mod errors;
mod menu;
mod session;
mod watchdog;

pub use classify::{decide_rejoin, finish_reason, RejoinDecision};
pub use control::{StopHandle, Supervisor, SupervisorStats};
pub use errors::{MenuError, RunError, SupervisorError, Termination, TransientKind};
pub use menu::{call_with_timeout, MenuNavigator};
pub use watchdog::{ActivityWatchdog, WatchdogAction, WatchdogState};

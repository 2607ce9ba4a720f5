//! Leader/follower coordination.
//!
//! - [`CompanionCoordinator`] consumes companion events and keeps the
//!   follower's view of the leader (or the leader's shrine reports).
//! - [`LeaderBroadcaster`] publishes leader heartbeats during a session.
//! - [`JoinDecision`] is the outcome of a follower's pre-join wait.

mod broadcaster;
mod coordinator;
mod join;
mod monitor;

pub use broadcaster::{publish_exit_heartbeat, LeaderBroadcaster};
pub use coordinator::{CompanionCoordinator, CoordinatorTiming};
pub use join::JoinDecision;

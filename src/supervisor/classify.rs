use crate::events::FinishReason;
use crate::models::{CompanionRole, HeartbeatRecord, SessionIdentity};

use super::errors::RunError;

/// Maps a gameplay outcome to the finish reason reported on the bus.
///
/// Cancellation (stop request, watchdog kill, leader exit, max session
/// length) is reported as a generic error.
pub fn finish_reason(result: &Result<(), RunError>) -> FinishReason {
    match result {
        Ok(()) => FinishReason::Ok,
        Err(RunError::Chicken) => FinishReason::Chicken,
        Err(RunError::MercChicken) => FinishReason::MercChicken,
        Err(RunError::Died) => FinishReason::Died,
        Err(RunError::Cancelled(_) | RunError::Other(_)) => FinishReason::Error,
    }
}

/// What a follower does with its stored session after a failed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejoinDecision {
    /// Keep the stored identity and join it again.
    Rejoin { game: String },
    /// Forget the stored identity and wait for a new join request.
    Clear,
    /// Not a follower. Nothing to decide.
    NotApplicable,
}

/// Decides whether a follower may rejoin after `err`.
///
/// Only an emergency retreat allows a rejoin, and only while the leader is
/// still reported in the very session the follower stored.
pub fn decide_rejoin(
    role: CompanionRole,
    err: &RunError,
    leader: &HeartbeatRecord,
    stored: &SessionIdentity,
) -> RejoinDecision {
    if !role.is_follower() {
        return RejoinDecision::NotApplicable;
    }
    if err.is_emergency_retreat() && !stored.is_empty() && leader.leader_is_in(&stored.name) {
        return RejoinDecision::Rejoin {
            game: stored.name.clone(),
        };
    }
    RejoinDecision::Clear
}

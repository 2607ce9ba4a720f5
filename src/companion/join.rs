//! Follower wait before joining the leader's session.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::CompanionCoordinator;
use crate::context::Context;

/// Outcome of waiting for the leader to be seen in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDecision {
    /// The leader is in the expected session.
    Proceed,
    /// The leader is in a different session.
    LeaderElsewhere { leader_game: String },
    /// The wait expired without a match.
    TimedOut {
        /// False if no heartbeat has ever been accepted.
        leader_seen: bool,
    },
    /// The caller's context was cancelled while waiting.
    Cancelled,
}

impl CompanionCoordinator {
    /// Wait until the leader reports being in `game_name`.
    ///
    /// Wakes on every accepted heartbeat and at least once per join poll
    /// interval, for at most the join wait. After the wait expires the record
    /// is checked one final time.
    pub fn await_leader(&self, game_name: &str, ctx: &Context) -> JoinDecision {
        let deadline = Instant::now() + self.timing.join_wait;
        let mut generation = self.heartbeat_generation();

        loop {
            let heartbeat = self.heartbeat();
            if heartbeat.leader_is_in(game_name) {
                return JoinDecision::Proceed;
            }
            if heartbeat.leader_in_session
                && !heartbeat.current_game_name.is_empty()
                && heartbeat.current_game_name != game_name
            {
                info!(
                    supervisor = %self.character_name(),
                    expected = %game_name,
                    leader_game = %heartbeat.current_game_name,
                    "Leader is in a different session"
                );
                return JoinDecision::LeaderElsewhere {
                    leader_game: heartbeat.current_game_name,
                };
            }
            if ctx.is_cancelled() {
                return JoinDecision::Cancelled;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let step = self.timing.join_poll.min(deadline - now);
            generation = self.wait_for_heartbeat(generation, step);
        }

        let heartbeat = self.heartbeat();
        if heartbeat.leader_is_in(game_name) {
            return JoinDecision::Proceed;
        }
        let leader_seen = heartbeat.has_been_seen();
        info!(
            supervisor = %self.character_name(),
            game = %game_name,
            leader_seen,
            leader_in_session = heartbeat.leader_in_session,
            leader_game = %heartbeat.current_game_name,
            "Timed out waiting for leader"
        );
        JoinDecision::TimedOut { leader_seen }
    }

    /// Block until the heartbeat generation moves past `seen` or `timeout`
    /// elapses. Returns the current generation.
    fn wait_for_heartbeat(&self, seen: u64, timeout: Duration) -> u64 {
        let guard = self.heartbeat_seq.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, result) = self
            .heartbeat_changed
            .wait_timeout_while(guard, timeout, |generation| *generation == seen)
            .unwrap_or_else(|e| e.into_inner());
        if !result.timed_out() {
            debug!(supervisor = %self.character_name(), "Woken by leader heartbeat");
        }
        *guard
    }
}

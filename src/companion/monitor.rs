//! Follower-side liveness threads.
//!
//! - The heartbeat monitor runs for the whole process and marks the leader as
//!   gone when its heartbeats stop.
//! - The exit relay runs for one session and cancels it when the exit signal
//!   fires.

use crossbeam_channel::{select, tick};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::CompanionCoordinator;
use crate::context::Context;

impl CompanionCoordinator {
    /// Mark the leader as out of session if its last heartbeat is stale at
    /// `now`.
    ///
    /// Only fires while the record still says the leader is in session, so a
    /// silent leader produces one exit signal per episode. Returns true when
    /// it fired.
    pub fn check_staleness(&self, now: Instant) -> bool {
        let stale_age = {
            let mut state = self.write();
            let heartbeat = &mut state.heartbeat;
            if !heartbeat.leader_in_session || !heartbeat.is_stale(now, self.timing.stale_after) {
                return false;
            }
            heartbeat.leader_in_session = false;
            heartbeat.age(now)
        };

        warn!(
            supervisor = %self.character_name(),
            age_secs = stale_age.map(|age| age.as_secs()).unwrap_or_default(),
            "Leader heartbeat is stale, assuming leader left the session"
        );
        self.raise_exit_signal();
        true
    }

    /// Start the staleness monitor. Followers only; returns `None` otherwise.
    ///
    /// The thread ticks until `ctx` is cancelled.
    pub fn start_heartbeat_monitor(self: &Arc<Self>, ctx: &Context) -> Option<JoinHandle<()>> {
        if !self.role().is_follower() {
            return None;
        }

        let coordinator = Arc::clone(self);
        let ctx = ctx.clone();
        Some(thread::spawn(move || {
            let ticker = tick(coordinator.timing.monitor_tick);
            loop {
                select! {
                    recv(ctx.done()) -> _ => break,
                    recv(ticker) -> _ => {
                        coordinator.check_staleness(Instant::now());
                    },
                }
            }
            debug!(supervisor = %coordinator.character_name(), "Heartbeat monitor stopped");
        }))
    }

    /// Cancel `ctx` as soon as an exit signal arrives.
    ///
    /// Consumes the signal. Ends quietly when `ctx` is cancelled first.
    pub fn spawn_exit_relay(&self, ctx: &Context) -> JoinHandle<()> {
        let signal = self.exit_signal();
        let ctx = ctx.clone();
        let name = self.character_name().to_string();
        thread::spawn(move || {
            select! {
                recv(ctx.done()) -> _ => {},
                recv(signal) -> msg => {
                    if msg.is_ok() {
                        info!(supervisor = %name, "Leader left, ending follower session");
                        ctx.cancel();
                    }
                },
            }
        })
    }
}

//! Leader heartbeat broadcaster.
//!
//! While the leader is in a session it publishes `in_session = true` on every
//! tick. It never publishes the terminal `in_session = false` heartbeat; the
//! supervisor sends that once, with [`publish_exit_heartbeat`], after the
//! client has actually left the session.

use crossbeam_channel::{select, tick};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::client::SessionManager;
use crate::context::Context;
use crate::events::{Event, EventBus};

/// Periodic publisher of leader heartbeats.
pub struct LeaderBroadcaster {
    leader: String,
    bus: EventBus,
    manager: Arc<dyn SessionManager>,
    interval: Duration,
}

impl LeaderBroadcaster {
    pub fn new(
        leader: impl Into<String>,
        bus: EventBus,
        manager: Arc<dyn SessionManager>,
        interval: Duration,
    ) -> Self {
        Self {
            leader: leader.into(),
            bus,
            manager,
            interval,
        }
    }

    /// The heartbeat for the current tick, or `None` when not in a session.
    pub fn heartbeat(&self) -> Option<Event> {
        if !self.manager.in_session() {
            return None;
        }
        Some(Event::LeaderHeartbeat {
            leader: self.leader.clone(),
            game_name: self.manager.last_session().name,
            in_session: true,
        })
    }

    /// Publish heartbeats until `ctx` is cancelled.
    pub fn spawn(self, ctx: Context) -> JoinHandle<()> {
        thread::spawn(move || {
            let ticker = tick(self.interval);
            loop {
                select! {
                    recv(ctx.done()) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Some(event) = self.heartbeat() {
                            self.bus.publish(&event);
                        }
                    },
                }
            }
            debug!(supervisor = %self.leader, "Heartbeat broadcaster stopped");
        })
    }
}

/// Tell followers the leader has left `game_name`.
pub fn publish_exit_heartbeat(bus: &EventBus, leader: &str, game_name: &str) {
    debug!(supervisor = %leader, game = %game_name, "Publishing exit heartbeat");
    bus.publish(&Event::LeaderHeartbeat {
        leader: leader.to_string(),
        game_name: game_name.to_string(),
        in_session: false,
    });
}

//! Stuck detection by position sampling.
//!
//! The watchdog compares each sample with the previous one. A run of
//! identical samples is a stuck episode, measured from the moment the
//! unchanged position was first observed:
//! - after the remediation threshold it clicks once
//! - after the kill threshold it kills the client and cancels the session
//!
//! Any movement ends the episode.

use crossbeam_channel::{select, tick};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::client::Client;
use crate::context::Context;
use crate::models::constants::screen::REMEDIATION_CLICK;
use crate::models::Position;

/// Action requested by one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    None,
    Remediate,
    Kill,
}

/// Sampling state of one stuck episode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchdogState {
    pub last_position: Option<Position>,
    /// When `last_position` was first sampled
    pub position_since: Option<Instant>,
    /// Set once a second identical sample confirms the player is not moving
    pub stuck_since: Option<Instant>,
    pub remediation_attempted: bool,
}

/// Stuck detector for one session.
#[derive(Debug, Clone)]
pub struct ActivityWatchdog {
    state: WatchdogState,
    remediate_after: Duration,
    kill_after: Duration,
}

impl ActivityWatchdog {
    pub fn new(remediate_after: Duration, kill_after: Duration) -> Self {
        Self {
            state: WatchdogState::default(),
            remediate_after,
            kill_after,
        }
    }

    pub fn state(&self) -> &WatchdogState {
        &self.state
    }

    /// Feed one position sample taken at `now`.
    pub fn observe(&mut self, position: Position, now: Instant) -> WatchdogAction {
        if self.state.last_position != Some(position) {
            self.state = WatchdogState {
                last_position: Some(position),
                position_since: Some(now),
                stuck_since: None,
                remediation_attempted: false,
            };
            return WatchdogAction::None;
        }

        let since = *self
            .state
            .stuck_since
            .get_or_insert(self.state.position_since.unwrap_or(now));
        let stuck_for = now.saturating_duration_since(since);

        if stuck_for >= self.kill_after {
            return WatchdogAction::Kill;
        }
        if stuck_for >= self.remediate_after && !self.state.remediation_attempted {
            self.state.remediation_attempted = true;
            return WatchdogAction::Remediate;
        }
        WatchdogAction::None
    }

    /// Sample the player position every `interval` until `ctx` is cancelled
    /// or the client is killed.
    ///
    /// Samples without a player (loading, not in session) are skipped.
    pub fn spawn(
        mut self,
        supervisor: String,
        client: Client,
        ctx: Context,
        interval: Duration,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            if let Some(position) = client.screen.player_position() {
                self.observe(position, Instant::now());
            }

            let ticker = tick(interval);
            loop {
                select! {
                    recv(ctx.done()) -> _ => break,
                    recv(ticker) -> _ => {
                        let Some(position) = client.screen.player_position() else {
                            continue;
                        };
                        match self.observe(position, Instant::now()) {
                            WatchdogAction::None => {}
                            WatchdogAction::Remediate => {
                                warn!(
                                    supervisor = %supervisor,
                                    position = %position,
                                    "Player has not moved, attempting remediation"
                                );
                                let (x, y) = REMEDIATION_CLICK;
                                if let Err(e) = client.input.click(x, y) {
                                    warn!(supervisor = %supervisor, error = %e, "Remediation input failed");
                                } else {
                                    info!(supervisor = %supervisor, "Remediation input sent");
                                }
                            }
                            WatchdogAction::Kill => {
                                error!(
                                    supervisor = %supervisor,
                                    position = %position,
                                    "Player stuck too long, killing client"
                                );
                                if let Err(e) = client.process.kill() {
                                    error!(supervisor = %supervisor, error = %e, "Failed to kill client");
                                }
                                ctx.cancel();
                                break;
                            }
                        }
                    },
                }
            }
            debug!(supervisor = %supervisor, "Activity watchdog stopped");
        })
    }
}

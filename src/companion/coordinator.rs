use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::CharacterConfig;
use crate::events::{Event, EventHandler};
use crate::models::{CompanionRole, HeartbeatRecord, SessionIdentity, ShrineReport};

/// Timings the coordinator needs, copied out of the character config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorTiming {
    pub monitor_tick: Duration,
    pub stale_after: Duration,
    pub join_poll: Duration,
    pub join_wait: Duration,
}

#[derive(Debug, Default)]
pub(super) struct CompanionState {
    pub(super) heartbeat: HeartbeatRecord,
    pub(super) stored_session: SessionIdentity,
    pub(super) shrine_reports: Vec<ShrineReport>,
}

/// One character's view of its companion group.
///
/// Followers track leader liveness and the session they were asked to join.
/// Leaders collect shrine reports. Everything mutable sits behind one
/// `RwLock` and is only handed out by copy.
pub struct CompanionCoordinator {
    character_name: String,
    role: CompanionRole,
    leader_name: String,
    pub(super) timing: CoordinatorTiming,
    pub(super) state: RwLock<CompanionState>,
    // Bumped on every accepted heartbeat so join waiters wake immediately.
    pub(super) heartbeat_seq: Mutex<u64>,
    pub(super) heartbeat_changed: Condvar,
    exit_tx: Sender<()>,
    exit_rx: Receiver<()>,
}

impl CompanionCoordinator {
    pub fn new(config: &CharacterConfig) -> Self {
        let timing = &config.timing;
        Self::with_timing(
            &config.character_name,
            config.role(),
            &config.companion.leader_name,
            CoordinatorTiming {
                monitor_tick: timing.heartbeat_monitor_tick(),
                stale_after: timing.heartbeat_stale_after(),
                join_poll: timing.join_poll_interval(),
                join_wait: timing.join_wait(),
            },
        )
    }

    pub fn with_timing(
        character_name: &str,
        role: CompanionRole,
        leader_name: &str,
        timing: CoordinatorTiming,
    ) -> Self {
        let (exit_tx, exit_rx) = bounded(1);
        Self {
            character_name: character_name.to_string(),
            role,
            leader_name: leader_name.to_string(),
            timing,
            state: RwLock::new(CompanionState::default()),
            heartbeat_seq: Mutex::new(0),
            heartbeat_changed: Condvar::new(),
            exit_tx,
            exit_rx,
        }
    }

    pub fn role(&self) -> CompanionRole {
        self.role
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    /// True if `leader` is the configured leader, or no leader is configured.
    pub fn matches_leader(&self, leader: &str) -> bool {
        self.leader_name.is_empty() || self.leader_name == leader
    }

    /// Apply one event to the coordinator state.
    pub fn handle_event(&self, event: &Event) {
        match event {
            Event::LeaderHeartbeat {
                leader,
                game_name,
                in_session,
            } => {
                self.record_heartbeat(leader, game_name, *in_session, Instant::now());
            }
            Event::JoinRequest {
                leader,
                name,
                password,
            } => {
                if self.role.is_follower() && self.matches_leader(leader) {
                    info!(
                        supervisor = %self.character_name,
                        leader = %leader,
                        game = %name,
                        "Companion join request received"
                    );
                    self.write().stored_session = SessionIdentity::new(name, password);
                }
            }
            Event::ResetSessionInfo { leader } => {
                if self.role.is_follower()
                    && (self.matches_leader(leader) || *leader == self.character_name)
                {
                    info!(
                        supervisor = %self.character_name,
                        leader = %leader,
                        "Companion session info reset"
                    );
                    self.write().stored_session = SessionIdentity::default();
                }
            }
            Event::ShrineFound {
                companion,
                area_name,
                area_id,
                x,
                y,
            } => {
                if self.role.is_leader() {
                    info!(
                        supervisor = %self.character_name,
                        companion = %companion,
                        area = %area_name,
                        "Shrine reported by companion"
                    );
                    self.write().shrine_reports.push(ShrineReport {
                        companion_name: companion.clone(),
                        area_name: area_name.clone(),
                        area_id: *area_id,
                        x: *x,
                        y: *y,
                        reported_at: Utc::now(),
                    });
                }
            }
            Event::SessionCreated { .. } | Event::SessionFinished { .. } => {}
        }
    }

    /// Record a leader heartbeat received at `now`.
    ///
    /// Returns whether the heartbeat was accepted. A heartbeat that reports the
    /// leader leaving the session this follower is tracking raises the exit
    /// signal.
    pub fn record_heartbeat(
        &self,
        leader: &str,
        game_name: &str,
        in_session: bool,
        now: Instant,
    ) -> bool {
        if !self.role.is_follower() || !self.matches_leader(leader) {
            return false;
        }

        let leader_left_tracked_session = {
            let mut state = self.write();
            let was_in_session = state.heartbeat.leader_in_session;
            state.heartbeat = HeartbeatRecord {
                last_seen_at: Some(now),
                leader_in_session: in_session,
                current_game_name: game_name.to_string(),
            };
            was_in_session
                && !in_session
                && !state.stored_session.is_empty()
                && state.stored_session.name == game_name
        };
        self.notify_heartbeat();

        if leader_left_tracked_session {
            info!(
                supervisor = %self.character_name,
                leader = %leader,
                game = %game_name,
                "Leader left the session"
            );
            self.raise_exit_signal();
        }
        true
    }

    pub fn is_leader_in_session(&self) -> bool {
        self.read().heartbeat.leader_in_session
    }

    pub fn current_game_name(&self) -> String {
        self.read().heartbeat.current_game_name.clone()
    }

    /// Copy of the heartbeat record.
    pub fn heartbeat(&self) -> HeartbeatRecord {
        self.read().heartbeat.clone()
    }

    /// Session this follower was asked to join. Empty when there is none.
    pub fn stored_session(&self) -> SessionIdentity {
        self.read().stored_session.clone()
    }

    pub fn clear_stored_session(&self) {
        self.write().stored_session = SessionIdentity::default();
    }

    /// Clear the stored session only if it still names `game_name`.
    ///
    /// Returns false when a newer join request replaced it in the meantime.
    pub fn clear_stored_session_if(&self, game_name: &str) -> bool {
        let mut state = self.write();
        if state.stored_session.name != game_name {
            return false;
        }
        state.stored_session = SessionIdentity::default();
        true
    }

    /// Copy of the shrine reports collected so far.
    pub fn shrine_reports(&self) -> Vec<ShrineReport> {
        self.read().shrine_reports.clone()
    }

    /// Remove and return every collected shrine report.
    pub fn take_shrine_reports(&self) -> Vec<ShrineReport> {
        std::mem::take(&mut self.write().shrine_reports)
    }

    /// Receiving side of the exit signal. Holds at most one pending signal.
    ///
    /// Every clone reads from the same slot.
    pub fn exit_signal(&self) -> Receiver<()> {
        self.exit_rx.clone()
    }

    /// Queue an exit signal unless one is already pending.
    ///
    /// Never blocks. Returns true if this call queued the signal.
    pub fn raise_exit_signal(&self) -> bool {
        let queued = self.exit_tx.try_send(()).is_ok();
        debug!(
            supervisor = %self.character_name,
            queued,
            "Exit signal raised"
        );
        queued
    }

    /// Discard a pending exit signal. Returns true if one was pending.
    pub fn drain_exit_signal(&self) -> bool {
        self.exit_rx.try_recv().is_ok()
    }

    pub(super) fn heartbeat_generation(&self) -> u64 {
        *self.heartbeat_seq.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify_heartbeat(&self) {
        let mut seq = self.heartbeat_seq.lock().unwrap_or_else(|e| e.into_inner());
        *seq = seq.wrapping_add(1);
        self.heartbeat_changed.notify_all();
    }

    pub(super) fn read(&self) -> RwLockReadGuard<'_, CompanionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(super) fn write(&self) -> RwLockWriteGuard<'_, CompanionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventHandler for CompanionCoordinator {
    fn handle(&self, event: &Event) -> Result<()> {
        self.handle_event(event);
        Ok(())
    }
}

impl std::fmt::Debug for CompanionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanionCoordinator")
            .field("character_name", &self.character_name)
            .field("role", &self.role)
            .field("leader_name", &self.leader_name)
            .finish()
    }
}

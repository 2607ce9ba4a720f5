//! Companion (leader/follower) data shared between coordinator and supervisor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Role of this instance in a leader/follower group.
///
/// Derived once from configuration and never changed for the process lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompanionRole {
    /// Plays alone.
    #[default]
    Disabled,
    /// Creates sessions and broadcasts heartbeats.
    Leader,
    /// Joins the leader's sessions and consumes heartbeats.
    Follower,
}

impl CompanionRole {
    /// Derive the role from the `[companion]` flags.
    pub fn from_flags(enabled: bool, leader: bool) -> Self {
        match (enabled, leader) {
            (false, _) => CompanionRole::Disabled,
            (true, true) => CompanionRole::Leader,
            (true, false) => CompanionRole::Follower,
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, CompanionRole::Leader)
    }

    pub fn is_follower(&self) -> bool {
        matches!(self, CompanionRole::Follower)
    }
}

impl std::fmt::Display for CompanionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanionRole::Disabled => write!(f, "disabled"),
            CompanionRole::Leader => write!(f, "leader"),
            CompanionRole::Follower => write!(f, "follower"),
        }
    }
}

/// Name and password of a session. An empty name means "no session".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub name: String,
    pub password: String,
}

impl SessionIdentity {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// A follower's view of leader liveness.
///
/// Lives behind the coordinator's lock and is only ever handed out by copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatRecord {
    /// When the last accepted heartbeat arrived
    pub last_seen_at: Option<Instant>,
    /// `in_session` flag of the last accepted heartbeat
    pub leader_in_session: bool,
    /// Session the leader reported being in
    pub current_game_name: String,
}

impl HeartbeatRecord {
    /// True if at least one heartbeat has been accepted.
    pub fn has_been_seen(&self) -> bool {
        self.last_seen_at.is_some()
    }

    /// Time since the last accepted heartbeat, measured at `now`.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_seen_at
            .map(|seen| now.saturating_duration_since(seen))
    }

    /// Check if the last heartbeat is older than `timeout` at `now`.
    ///
    /// A record that never saw a heartbeat is not stale.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        self.age(now).is_some_and(|age| age > timeout)
    }

    /// True if the leader last reported being in `game_name`.
    pub fn leader_is_in(&self, game_name: &str) -> bool {
        self.leader_in_session && self.current_game_name == game_name
    }
}

/// A shrine a follower found, reported to the leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrineReport {
    pub companion_name: String,
    pub area_name: String,
    pub area_id: i32,
    pub x: i32,
    pub y: i32,
    pub reported_at: DateTime<Utc>,
}

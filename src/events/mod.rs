//! Typed events exchanged between supervisors through the [`EventBus`].

mod bus;

pub use bus::{EventBus, EventHandler, Subscription};

use serde::{Deserialize, Serialize};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Ok,
    /// Player emergency retreat.
    Chicken,
    /// Mercenary emergency retreat.
    MercChicken,
    Died,
    Error,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Ok => write!(f, "ok"),
            FinishReason::Chicken => write!(f, "chicken"),
            FinishReason::MercChicken => write!(f, "merc_chicken"),
            FinishReason::Died => write!(f, "died"),
            FinishReason::Error => write!(f, "error"),
        }
    }
}

/// A message published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// Leader liveness. Sent every few seconds while the leader plays, and once
    /// with `in_session = false` after the leader has left the session.
    LeaderHeartbeat {
        leader: String,
        game_name: String,
        in_session: bool,
    },
    /// Leader asks followers to join the named session.
    JoinRequest {
        leader: String,
        name: String,
        password: String,
    },
    /// Followers of `leader` (or the character named `leader`) forget their
    /// stored session.
    ResetSessionInfo { leader: String },
    /// A follower found a shrine.
    ShrineFound {
        companion: String,
        area_name: String,
        area_id: i32,
        x: i32,
        y: i32,
    },
    SessionCreated {
        supervisor: String,
        name: String,
        password: String,
    },
    SessionFinished {
        supervisor: String,
        reason: FinishReason,
        message: String,
    },
}

impl Event {
    /// Short event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::LeaderHeartbeat { .. } => "leader_heartbeat",
            Event::JoinRequest { .. } => "join_request",
            Event::ResetSessionInfo { .. } => "reset_session_info",
            Event::ShrineFound { .. } => "shrine_found",
            Event::SessionCreated { .. } => "session_created",
            Event::SessionFinished { .. } => "session_finished",
        }
    }
}

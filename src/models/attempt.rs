//! Consecutive failure tracking for session entry attempts.
//!
//! The menu navigator keeps one counter per failure class: stuck modals, and
//! lobby creation (failed calls and "failed to create game" modals share that
//! one, each against its own ceiling). Session entry resets both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Failure state of the current session entry episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameAttempt {
    /// When the last entry attempt was made
    pub attempted_at: Option<DateTime<Utc>>,
    /// Failed entry attempts since the last success
    pub consecutive_failures: u32,
    /// Description of the most recent failure
    pub last_failure: Option<String>,
}

impl GameAttempt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of an entry attempt.
    pub fn begin(&mut self) {
        self.attempted_at = Some(Utc::now());
    }

    /// Record a failed attempt and return the new consecutive count.
    pub fn record_failure(&mut self, reason: impl Into<String>) -> u32 {
        self.consecutive_failures += 1;
        self.last_failure = Some(reason.into());
        self.consecutive_failures
    }

    /// Check whether the failure count has reached `ceiling`.
    pub fn has_reached(&self, ceiling: u32) -> bool {
        self.consecutive_failures >= ceiling
    }

    /// Start a new episode after a success or an escalation.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure = None;
    }
}

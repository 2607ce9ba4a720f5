//! Per-character configuration loaded from TOML.
//!
//! ```toml
//! character_name = "sorc"
//! auth_method = "None"
//!
//! [game]
//! runs = ["pit", "countess"]
//! difficulty = "hell"
//!
//! [companion]
//! enabled = true
//! leader = false
//! leader_name = "paladin"
//!
//! [timing]
//! join_wait_ms = 45000
//! ```
//!
//! Every key has a default, so a file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::models::constants;
use crate::models::CompanionRole;
use crate::plan::{CharacterClass, RunKind};

/// Errors raised while loading or validating a character config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// The config parsed but describes an impossible setup.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The config could not be rendered back to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Game difficulty selected before building the run plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Normal,
    Nightmare,
    Hell,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Normal => write!(f, "normal"),
            Difficulty::Nightmare => write!(f, "nightmare"),
            Difficulty::Hell => write!(f, "hell"),
        }
    }
}

/// Complete configuration for one supervised character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CharacterConfig {
    /// In-game character name, also used as the leader name in events
    pub character_name: String,
    /// `"None"` plays offline; anything else plays online
    pub auth_method: String,
    /// Which character implementation drives gameplay
    pub character_class: String,
    pub game: GameConfig,
    pub companion: CompanionConfig,
    pub timing: TimingConfig,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            character_name: String::new(),
            auth_method: "None".to_string(),
            character_class: "combatant".to_string(),
            game: GameConfig::default(),
            companion: CompanionConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

/// `[game]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Runs to perform each session, in order
    pub runs: Vec<String>,
    /// Shuffle the run order every session
    pub randomize_runs: bool,
    pub difficulty: Difficulty,
    /// Stop once the character reaches this level (0 disables)
    pub stop_leveling_at: u32,
    /// Create sessions from the lobby instead of the character screen
    pub create_lobby_games: bool,
    /// Suffix counter for lobby session names
    pub public_game_counter: u32,
    /// Upper bound on a single session (0 means unlimited)
    pub max_game_length_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            runs: Vec::new(),
            randomize_runs: false,
            difficulty: Difficulty::Normal,
            stop_leveling_at: 0,
            create_lobby_games: false,
            public_game_counter: 1,
            max_game_length_secs: 0,
        }
    }
}

impl GameConfig {
    /// Maximum session length, if one is configured.
    pub fn max_game_length(&self) -> Option<Duration> {
        (self.max_game_length_secs > 0).then(|| Duration::from_secs(self.max_game_length_secs))
    }
}

/// `[companion]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompanionConfig {
    pub enabled: bool,
    /// This character leads the group
    pub leader: bool,
    /// Leader to follow; empty accepts any leader
    pub leader_name: String,
}

/// `[timing]` table. All values are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub out_of_session_ceiling_ms: u64,
    pub menu_action_timeout_ms: u64,
    pub menu_flow_ceiling_ms: u64,
    pub exit_confirm_timeout_ms: u64,
    pub exit_settle_ms: u64,
    pub exit_poll_ms: u64,
    pub leader_heartbeat_interval_ms: u64,
    pub heartbeat_monitor_tick_ms: u64,
    pub heartbeat_stale_after_ms: u64,
    pub join_poll_interval_ms: u64,
    pub join_wait_ms: u64,
    pub idle_poll_ms: u64,
    pub activity_sample_ms: u64,
    pub stuck_remediation_ms: u64,
    pub stuck_kill_ms: u64,
    pub rejoin_recovery_ms: u64,
    pub post_session_settle_ms: u64,
    pub transient_retry_ms: u64,
    pub error_backoff_ms: u64,
    pub input_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            out_of_session_ceiling_ms: constants::OUT_OF_SESSION_CEILING_MS,
            menu_action_timeout_ms: constants::MENU_ACTION_TIMEOUT_MS,
            menu_flow_ceiling_ms: constants::MENU_FLOW_CEILING_MS,
            exit_confirm_timeout_ms: constants::EXIT_CONFIRM_TIMEOUT_MS,
            exit_settle_ms: constants::EXIT_SETTLE_MS,
            exit_poll_ms: constants::EXIT_POLL_MS,
            leader_heartbeat_interval_ms: constants::LEADER_HEARTBEAT_INTERVAL_MS,
            heartbeat_monitor_tick_ms: constants::HEARTBEAT_MONITOR_TICK_MS,
            heartbeat_stale_after_ms: constants::HEARTBEAT_STALE_AFTER_MS,
            join_poll_interval_ms: constants::JOIN_POLL_INTERVAL_MS,
            join_wait_ms: constants::JOIN_WAIT_MS,
            idle_poll_ms: constants::IDLE_POLL_MS,
            activity_sample_ms: constants::ACTIVITY_SAMPLE_MS,
            stuck_remediation_ms: constants::STUCK_REMEDIATION_MS,
            stuck_kill_ms: constants::STUCK_KILL_MS,
            rejoin_recovery_ms: constants::REJOIN_RECOVERY_MS,
            post_session_settle_ms: constants::POST_SESSION_SETTLE_MS,
            transient_retry_ms: constants::TRANSIENT_RETRY_MS,
            error_backoff_ms: constants::ERROR_BACKOFF_MS,
            input_settle_ms: constants::INPUT_SETTLE_MS,
        }
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

impl TimingConfig {
    pub fn out_of_session_ceiling(&self) -> Duration {
        ms(self.out_of_session_ceiling_ms)
    }

    pub fn menu_action_timeout(&self) -> Duration {
        ms(self.menu_action_timeout_ms)
    }

    pub fn menu_flow_ceiling(&self) -> Duration {
        ms(self.menu_flow_ceiling_ms)
    }

    pub fn exit_confirm_timeout(&self) -> Duration {
        ms(self.exit_confirm_timeout_ms)
    }

    pub fn exit_settle(&self) -> Duration {
        ms(self.exit_settle_ms)
    }

    pub fn exit_poll(&self) -> Duration {
        ms(self.exit_poll_ms)
    }

    pub fn leader_heartbeat_interval(&self) -> Duration {
        ms(self.leader_heartbeat_interval_ms)
    }

    pub fn heartbeat_monitor_tick(&self) -> Duration {
        ms(self.heartbeat_monitor_tick_ms)
    }

    pub fn heartbeat_stale_after(&self) -> Duration {
        ms(self.heartbeat_stale_after_ms)
    }

    pub fn join_poll_interval(&self) -> Duration {
        ms(self.join_poll_interval_ms)
    }

    pub fn join_wait(&self) -> Duration {
        ms(self.join_wait_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        ms(self.idle_poll_ms)
    }

    pub fn activity_sample(&self) -> Duration {
        ms(self.activity_sample_ms)
    }

    pub fn stuck_remediation(&self) -> Duration {
        ms(self.stuck_remediation_ms)
    }

    pub fn stuck_kill(&self) -> Duration {
        ms(self.stuck_kill_ms)
    }

    pub fn rejoin_recovery(&self) -> Duration {
        ms(self.rejoin_recovery_ms)
    }

    pub fn post_session_settle(&self) -> Duration {
        ms(self.post_session_settle_ms)
    }

    pub fn transient_retry(&self) -> Duration {
        ms(self.transient_retry_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        ms(self.error_backoff_ms)
    }

    pub fn input_settle(&self) -> Duration {
        ms(self.input_settle_ms)
    }

    /// Copy of these timings with every value divided by `factor`.
    ///
    /// Values never drop below one millisecond. Used by `convoy simulate
    /// --speed` to replay the real protocol quickly.
    pub fn accelerated(&self, factor: u64) -> Self {
        let factor = factor.max(1);
        let scale = |value: u64| (value / factor).max(1);
        Self {
            out_of_session_ceiling_ms: scale(self.out_of_session_ceiling_ms),
            menu_action_timeout_ms: scale(self.menu_action_timeout_ms),
            menu_flow_ceiling_ms: scale(self.menu_flow_ceiling_ms),
            exit_confirm_timeout_ms: scale(self.exit_confirm_timeout_ms),
            exit_settle_ms: scale(self.exit_settle_ms),
            exit_poll_ms: scale(self.exit_poll_ms),
            leader_heartbeat_interval_ms: scale(self.leader_heartbeat_interval_ms),
            heartbeat_monitor_tick_ms: scale(self.heartbeat_monitor_tick_ms),
            heartbeat_stale_after_ms: scale(self.heartbeat_stale_after_ms),
            join_poll_interval_ms: scale(self.join_poll_interval_ms),
            join_wait_ms: scale(self.join_wait_ms),
            idle_poll_ms: scale(self.idle_poll_ms),
            activity_sample_ms: scale(self.activity_sample_ms),
            stuck_remediation_ms: scale(self.stuck_remediation_ms),
            stuck_kill_ms: scale(self.stuck_kill_ms),
            rejoin_recovery_ms: scale(self.rejoin_recovery_ms),
            post_session_settle_ms: scale(self.post_session_settle_ms),
            transient_retry_ms: scale(self.transient_retry_ms),
            error_backoff_ms: scale(self.error_backoff_ms),
            input_settle_ms: scale(self.input_settle_ms),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ticks = [
            ("leader_heartbeat_interval_ms", self.leader_heartbeat_interval_ms),
            ("heartbeat_monitor_tick_ms", self.heartbeat_monitor_tick_ms),
            ("join_poll_interval_ms", self.join_poll_interval_ms),
            ("activity_sample_ms", self.activity_sample_ms),
            ("exit_poll_ms", self.exit_poll_ms),
        ];
        if let Some((name, _)) = ticks.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!(
                "timing.{name} must be greater than zero"
            )));
        }
        if self.stuck_kill_ms < self.stuck_remediation_ms {
            return Err(ConfigError::Invalid(
                "timing.stuck_kill_ms must not be shorter than timing.stuck_remediation_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl CharacterConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CharacterConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration, defaults included.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Companion role derived from the `[companion]` table.
    pub fn role(&self) -> CompanionRole {
        CompanionRole::from_flags(self.companion.enabled, self.companion.leader)
    }

    /// True when `auth_method` selects online play.
    pub fn is_online(&self) -> bool {
        !self.auth_method.eq_ignore_ascii_case("none")
    }

    /// Parse the configured run names in order.
    pub fn run_kinds(&self) -> Result<Vec<RunKind>, ConfigError> {
        self.game
            .runs
            .iter()
            .map(|name| {
                RunKind::from_str(name).map_err(|e| ConfigError::Invalid(format!("game.runs: {e}")))
            })
            .collect()
    }

    /// Parse the configured character class.
    pub fn class(&self) -> Result<CharacterClass, ConfigError> {
        CharacterClass::from_str(&self.character_class)
            .map_err(|e| ConfigError::Invalid(format!("character_class: {e}")))
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.character_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "character_name must not be empty".to_string(),
            ));
        }
        if self.role().is_follower() && self.companion.leader_name == self.character_name {
            return Err(ConfigError::Invalid(format!(
                "follower '{}' cannot follow itself",
                self.character_name
            )));
        }
        self.run_kinds()?;
        self.class()?;
        self.timing.validate()
    }
}

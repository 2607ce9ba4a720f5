//! Default timings, retry ceilings and fixed screen coordinates.
//!
//! Every timing here is the default of a `[timing]` key in the character
//! config and can be overridden per character.

/// Longest time the supervisor may spend outside a session before it kills
/// the client (3 minutes).
pub const OUT_OF_SESSION_CEILING_MS: u64 = 180_000;

/// Per-call timeout for a single session manager action (30 seconds).
pub const MENU_ACTION_TIMEOUT_MS: u64 = 30_000;

/// Absolute ceiling for one menu navigator step before the client is
/// considered frozen (3 minutes).
pub const MENU_FLOW_CEILING_MS: u64 = 180_000;

/// How long to wait for the client to confirm it left a session (15 seconds).
pub const EXIT_CONFIRM_TIMEOUT_MS: u64 = 15_000;

/// Pause after requesting a session exit before polling for confirmation.
pub const EXIT_SETTLE_MS: u64 = 5_000;

/// Poll interval while waiting for exit confirmation.
pub const EXIT_POLL_MS: u64 = 500;

/// Interval between leader heartbeats while in session.
pub const LEADER_HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Tick of the follower's heartbeat staleness monitor.
pub const HEARTBEAT_MONITOR_TICK_MS: u64 = 10_000;

/// A heartbeat older than this is considered stale.
pub const HEARTBEAT_STALE_AFTER_MS: u64 = 30_000;

/// Granularity of the follower's pre-join wait.
pub const JOIN_POLL_INTERVAL_MS: u64 = 200;

/// How long a follower waits for the leader to show up in the stored session.
pub const JOIN_WAIT_MS: u64 = 30_000;

/// Pause taken before reporting loading or idle to the supervisor.
pub const IDLE_POLL_MS: u64 = 500;

/// Interval between activity watchdog position samples.
pub const ACTIVITY_SAMPLE_MS: u64 = 15_000;

/// Continuous stuck time before the single remediation input.
pub const STUCK_REMEDIATION_MS: u64 = 90_000;

/// Continuous stuck time before the client is killed (3 minutes).
pub const STUCK_KILL_MS: u64 = 180_000;

/// How long a follower waits after an emergency retreat before deciding
/// whether to rejoin.
pub const REJOIN_RECOVERY_MS: u64 = 10_000;

/// Pause after a successful session exit.
pub const POST_SESSION_SETTLE_MS: u64 = 3_000;

/// Sleep after a transient menu condition.
pub const TRANSIENT_RETRY_MS: u64 = 100;

/// Backoff after a retryable menu error.
pub const ERROR_BACKOFF_MS: u64 = 1_000;

/// Pause after a synthetic input so the client can react.
pub const INPUT_SETTLE_MS: u64 = 1_000;

/// Modal dismissals that may fail in a row before the client is unrecoverable.
pub const MAX_MODAL_DISMISS_FAILURES: u32 = 3;

/// Lobby session creation calls that may fail in a row.
pub const MAX_LOBBY_CREATE_FAILURES: u32 = 5;

/// "Failed to create game" modals that may appear in a row.
pub const MAX_CREATE_MODAL_FAILURES: u32 = 3;

/// Clicks on the lobby button before lobby entry is reported as failed.
pub const MAX_LOBBY_ENTRY_CLICKS: u32 = 5;

/// Fixed screen coordinates used by the supervisor.
pub mod screen {
    /// Single corrective click issued by the activity watchdog.
    pub const REMEDIATION_CLICK: (i32, i32) = (500, 500);

    /// Lobby button on the character selection screen.
    pub const LOBBY_BUTTON: (i32, i32) = (744, 650);

    /// Opens and closes the difficulty picker.
    pub const DIFFICULTY_MENU: (i32, i32) = (6, 6);

    /// Nightmare entry of the difficulty picker.
    pub const DIFFICULTY_NIGHTMARE: (i32, i32) = (400, 400);

    /// Hell entry of the difficulty picker.
    pub const DIFFICULTY_HELL: (i32, i32) = (400, 450);
}

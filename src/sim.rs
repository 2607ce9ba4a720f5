//! In-memory game client and scripted gameplay.
//!
//! [`SimulatedClient`] implements every client seam over one shared
//! [`SimState`]. Tests and `convoy simulate` drive the real supervisor
//! against it and steer failures by editing the state.

use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::client::{
    Client, ClientProcess, GameplayExecutor, InputDevice, ScreenReader, SessionManager,
};
use crate::context::{CancelReason, Context};
use crate::models::constants::screen::LOBBY_BUTTON;
use crate::models::{Position, SessionIdentity};
use crate::plan::RunPlan;
use crate::supervisor::{RunError, StopHandle};

/// Screen the simulated client shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    CharacterSelection,
    Lobby,
    CharacterCreation,
    Loading,
    InSession,
}

/// Everything the simulated client knows. Public so tests can steer it.
#[derive(Debug, Clone)]
pub struct SimState {
    pub screen: Screen,
    pub modal: Option<String>,
    /// Escape does not close the modal
    pub modal_sticky: bool,
    pub position: Position,
    /// Player moves one tile per position read
    pub moving: bool,
    pub level: u32,
    /// Refreshes left before a loading screen ends
    pub loading_refreshes: u32,
    pub last_session: SessionIdentity,
    /// Prefix of offline session names
    pub session_prefix: String,
    pub sessions_created: u32,
    pub joins: Vec<String>,
    pub kills: u32,
    pub starts: u32,
    pub escapes: u32,
    pub clicks: Vec<(i32, i32)>,
    /// `exit_session` returns an error
    pub fail_exit: bool,
    /// `exit_session` actually leaves the session
    pub exit_leaves_session: bool,
    /// Every refresh blocks this long, as a hung client does
    pub freeze_reads: Option<Duration>,
    /// Lobby creations left that fail with an error
    pub create_errors: u32,
    /// Lobby creations left that end on a "failed to create game" modal
    pub create_refusals: u32,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            screen: Screen::CharacterSelection,
            modal: None,
            modal_sticky: false,
            position: Position::new(5000, 5000),
            moving: true,
            level: 1,
            loading_refreshes: 0,
            last_session: SessionIdentity::default(),
            session_prefix: "game".to_string(),
            sessions_created: 0,
            joins: Vec::new(),
            kills: 0,
            starts: 0,
            escapes: 0,
            clicks: Vec::new(),
            fail_exit: false,
            exit_leaves_session: true,
            freeze_reads: None,
            create_errors: 0,
            create_refusals: 0,
        }
    }
}

/// Game client backed by [`SimState`].
#[derive(Debug, Default)]
pub struct SimulatedClient {
    state: Mutex<SimState>,
}

impl SimulatedClient {
    pub fn new(state: SimState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    /// Lock the state for inspection or steering.
    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Supervisor-facing handles to this client.
    pub fn client(self: &Arc<Self>) -> Client {
        Client::from_shared(Arc::clone(self))
    }

    fn enter(state: &mut SimState, identity: SessionIdentity) {
        state.screen = Screen::InSession;
        state.modal = None;
        state.last_session = identity;
    }
}

impl SessionManager for SimulatedClient {
    fn in_session(&self) -> bool {
        self.state().screen == Screen::InSession
    }

    fn new_session(&self) -> Result<()> {
        let mut state = self.state();
        if state.screen != Screen::CharacterSelection {
            bail!("not in character selection");
        }
        state.sessions_created += 1;
        let name = format!("{}-{}", state.session_prefix, state.sessions_created);
        Self::enter(&mut state, SessionIdentity::new(name, ""));
        Ok(())
    }

    fn exit_session(&self) -> Result<()> {
        let mut state = self.state();
        if state.fail_exit {
            bail!("exit menu did not open");
        }
        if state.exit_leaves_session && state.screen == Screen::InSession {
            state.screen = Screen::CharacterSelection;
        }
        Ok(())
    }

    fn join_online_session(&self, name: &str, password: &str) -> Result<()> {
        let mut state = self.state();
        if state.screen != Screen::Lobby {
            bail!("not in lobby");
        }
        state.joins.push(name.to_string());
        Self::enter(&mut state, SessionIdentity::new(name, password));
        Ok(())
    }

    fn create_lobby_session(&self, counter: u32) -> Result<SessionIdentity> {
        let mut state = self.state();
        if state.screen != Screen::Lobby {
            bail!("not in lobby");
        }
        if state.create_errors > 0 {
            state.create_errors -= 1;
            bail!("create button did not respond");
        }
        let identity = SessionIdentity::new(format!("{}-{counter}", state.session_prefix), "pw");
        if state.create_refusals > 0 {
            state.create_refusals -= 1;
            state.modal = Some("Failed to create game".to_string());
            return Ok(identity);
        }
        state.sessions_created += 1;
        Self::enter(&mut state, identity.clone());
        Ok(identity)
    }

    fn last_session(&self) -> SessionIdentity {
        self.state().last_session.clone()
    }
}

impl ScreenReader for SimulatedClient {
    fn refresh(&self) -> Result<()> {
        let freeze = {
            let mut state = self.state();
            if state.screen == Screen::Loading {
                state.loading_refreshes = state.loading_refreshes.saturating_sub(1);
                if state.loading_refreshes == 0 {
                    state.screen = Screen::CharacterSelection;
                }
            }
            state.freeze_reads
        };
        if let Some(delay) = freeze {
            thread::sleep(delay);
        }
        Ok(())
    }

    fn is_loading_screen(&self) -> bool {
        self.state().screen == Screen::Loading
    }

    fn is_in_character_creation(&self) -> bool {
        self.state().screen == Screen::CharacterCreation
    }

    fn is_in_character_selection(&self) -> bool {
        self.state().screen == Screen::CharacterSelection
    }

    fn is_in_lobby(&self) -> bool {
        self.state().screen == Screen::Lobby
    }

    fn dismissable_modal(&self) -> Option<String> {
        self.state().modal.clone()
    }

    fn player_position(&self) -> Option<Position> {
        let mut state = self.state();
        if state.screen != Screen::InSession {
            return None;
        }
        if state.moving {
            state.position.x += 1;
        }
        Some(state.position)
    }

    fn player_level(&self) -> u32 {
        self.state().level
    }
}

impl InputDevice for SimulatedClient {
    fn press_escape(&self) -> Result<()> {
        let mut state = self.state();
        state.escapes += 1;
        if state.modal.is_some() {
            if !state.modal_sticky {
                state.modal = None;
            }
            return Ok(());
        }
        if matches!(state.screen, Screen::CharacterCreation | Screen::Lobby) {
            state.screen = Screen::CharacterSelection;
        }
        Ok(())
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        let mut state = self.state();
        state.clicks.push((x, y));
        if (x, y) == LOBBY_BUTTON && state.screen == Screen::CharacterSelection {
            state.screen = Screen::Lobby;
        }
        Ok(())
    }
}

impl ClientProcess for SimulatedClient {
    fn ensure_running(&self) -> Result<()> {
        self.state().starts += 1;
        Ok(())
    }

    fn kill(&self) -> Result<()> {
        let mut state = self.state();
        state.kills += 1;
        state.screen = Screen::CharacterSelection;
        state.modal = None;
        state.freeze_reads = None;
        debug!(kills = state.kills, "Simulated client killed");
        Ok(())
    }
}

/// One scripted gameplay session.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// End the session right away with this outcome.
    Finish(Result<(), RunError>),
    /// Play for `duration`, then end with `outcome` unless cancelled first.
    Play {
        duration: Duration,
        outcome: Result<(), RunError>,
    },
    /// Play until the session context is cancelled.
    WaitForCancel,
}

/// Gameplay executor that replays a fixed script, one step per session.
///
/// Once the script runs out it plays until cancelled. With a stop handle
/// attached, the supervisor is stopped as soon as the last step ends.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    steps: Mutex<VecDeque<ScriptStep>>,
    stop_when_done: Mutex<Option<StopHandle>>,
    calls: AtomicU32,
    first_attempts: AtomicU32,
}

impl ScriptedExecutor {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        })
    }

    /// Stop the supervisor behind `handle` after the last scripted step.
    pub fn stop_when_done(&self, handle: StopHandle) {
        *self
            .stop_when_done
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Sessions played so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sessions that were flagged as the first attempt.
    pub fn first_attempts(&self) -> u32 {
        self.first_attempts.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> (Option<ScriptStep>, bool) {
        let mut steps = self.steps.lock().unwrap_or_else(|e| e.into_inner());
        let step = steps.pop_front();
        let last = step.is_some() && steps.is_empty();
        (step, last)
    }

    fn wait_for_cancel(ctx: &Context) -> Result<(), RunError> {
        let _ = ctx.done().recv();
        Err(RunError::Cancelled(
            ctx.reason().unwrap_or(CancelReason::Cancelled),
        ))
    }
}

impl GameplayExecutor for ScriptedExecutor {
    fn run_session(
        &self,
        ctx: &Context,
        is_first_attempt: bool,
        plan: &RunPlan,
    ) -> Result<(), RunError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if is_first_attempt {
            self.first_attempts.fetch_add(1, Ordering::SeqCst);
        }
        debug!(runs = plan.runs.len(), "Scripted session started");

        let (step, last) = self.next_step();
        let result = match step {
            Some(ScriptStep::Finish(outcome)) => outcome,
            Some(ScriptStep::Play { duration, outcome }) => {
                if ctx.sleep(duration) {
                    outcome
                } else {
                    Err(RunError::Cancelled(
                        ctx.reason().unwrap_or(CancelReason::Cancelled),
                    ))
                }
            }
            Some(ScriptStep::WaitForCancel) | None => Self::wait_for_cancel(ctx),
        };

        if last {
            if let Some(handle) = self
                .stop_when_done
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .as_ref()
            {
                handle.stop();
            }
        }
        result
    }
}

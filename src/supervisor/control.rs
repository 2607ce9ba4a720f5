//! Supervisor control loop.
//!
//! Outside a session the loop drives the [`MenuNavigator`] under a freeze
//! ceiling. Inside a session it hands over to [`Supervisor::run_session`]
//! (see `session.rs`). An outer out-of-session ceiling backs up everything.

use crossbeam_channel::{bounded, RecvTimeoutError};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::errors::{MenuError, SupervisorError};
use super::menu::MenuNavigator;
use crate::context::Context;
use crate::events::FinishReason;
use crate::models::SessionState;
use crate::runtime::BotContext;

/// Counters for one supervisor run, reported by `convoy simulate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorStats {
    pub sessions_started: u32,
    pub finished_ok: u32,
    pub chickens: u32,
    pub merc_chickens: u32,
    pub deaths: u32,
    pub errors: u32,
    /// Follower rejoins after an emergency retreat
    pub rejoins: u32,
    pub last_game: Option<String>,
}

impl SupervisorStats {
    pub fn record(&mut self, reason: FinishReason) {
        match reason {
            FinishReason::Ok => self.finished_ok += 1,
            FinishReason::Chicken => self.chickens += 1,
            FinishReason::MercChicken => self.merc_chickens += 1,
            FinishReason::Died => self.deaths += 1,
            FinishReason::Error => self.errors += 1,
        }
    }

    pub fn sessions_finished(&self) -> u32 {
        self.finished_ok + self.chickens + self.merc_chickens + self.deaths + self.errors
    }
}

/// Requests a stop from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    ctx: Context,
}

impl StopHandle {
    /// Ask the supervisor to stop. The current session is interrupted.
    pub fn stop(&self) {
        self.ctx.cancel();
    }
}

/// What the loop does after a session ends.
pub(super) enum Flow {
    Continue,
    Stop,
}

enum MenuOutcome {
    Finished(Result<(), MenuError>),
    Frozen,
}

/// Top-level control loop for one character.
pub struct Supervisor {
    pub(super) bot: Arc<BotContext>,
    pub(super) navigator: Arc<MenuNavigator>,
    pub(super) state: SessionState,
    pub(super) stats: SupervisorStats,
    pub(super) first_attempt: bool,
    pub(super) out_of_session_since: Instant,
    pub(super) stop: Context,
}

impl Supervisor {
    pub fn new(bot: Arc<BotContext>) -> Self {
        let navigator = Arc::new(MenuNavigator::new(Arc::clone(&bot)));
        Self {
            bot,
            navigator,
            state: SessionState::NotInSession,
            stats: SupervisorStats::default(),
            first_attempt: true,
            out_of_session_since: Instant::now(),
            stop: Context::background(),
        }
    }

    pub fn name(&self) -> &str {
        &self.bot.name
    }

    pub fn bot(&self) -> &Arc<BotContext> {
        &self.bot
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            ctx: self.stop.clone(),
        }
    }

    /// Stop the supervisor. Same as [`StopHandle::stop`].
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Run until stopped or until the client needs a restart.
    ///
    /// `Ok(())` means the supervisor stopped on request or because the
    /// configured level cap was reached.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        info!(supervisor = %self.bot.name, role = %self.bot.role, "Starting supervisor");
        self.bot
            .client
            .process
            .ensure_running()
            .map_err(|e| SupervisorError::Prepare(e.to_string()))?;

        self.state = SessionState::NotInSession;
        let process = self.stop.child();
        let monitor = self.bot.coordinator.start_heartbeat_monitor(&process);

        self.out_of_session_since = Instant::now();
        let result = self.run_loop(&process);

        process.cancel();
        if let Some(handle) = monitor {
            let _ = handle.join();
        }

        match &result {
            Ok(()) => info!(supervisor = %self.bot.name, "Supervisor stopped"),
            Err(e) => error!(supervisor = %self.bot.name, error = %e, "Supervisor terminated"),
        }
        result
    }

    fn run_loop(&mut self, process: &Context) -> Result<(), SupervisorError> {
        loop {
            if self.stop.is_cancelled() {
                self.set_state(SessionState::Stopped);
                return Ok(());
            }

            if !self.bot.client.manager.in_session() {
                self.navigate_menus(process)?;
                continue;
            }

            match self.run_session(process)? {
                Flow::Continue => {}
                Flow::Stop => {
                    self.set_state(SessionState::Stopped);
                    return Ok(());
                }
            }
        }
    }

    /// One pass of the out-of-session branch.
    fn navigate_menus(&mut self, process: &Context) -> Result<(), SupervisorError> {
        let bot = Arc::clone(&self.bot);
        let timing = bot.timing();
        let outside_for = self.out_of_session_since.elapsed();
        if outside_for > timing.out_of_session_ceiling() {
            error!(
                supervisor = %self.bot.name,
                outside_secs = outside_for.as_secs(),
                "Too long outside a session, killing client"
            );
            return Err(self.escalate("client stayed outside a session for too long"));
        }

        self.set_state(SessionState::Transitioning);
        match self.run_menu_step(process) {
            MenuOutcome::Finished(Ok(())) => {}
            MenuOutcome::Finished(Err(MenuError::Transient(kind))) => {
                debug!(supervisor = %self.bot.name, condition = %kind, "Menu flow waiting");
                self.set_state(SessionState::NotInSession);
                self.stop.sleep(timing.transient_retry());
            }
            MenuOutcome::Finished(Err(MenuError::Unrecoverable { reason })) => {
                error!(supervisor = %self.bot.name, reason = %reason, "Menu flow hit an unrecoverable state");
                self.set_state(SessionState::Unrecoverable);
                return Err(SupervisorError::Unrecoverable { reason });
            }
            MenuOutcome::Finished(Err(e)) => {
                warn!(supervisor = %self.bot.name, error = %e, "Menu flow failed, retrying");
                self.set_state(SessionState::NotInSession);
                self.stop.sleep(timing.error_backoff());
            }
            MenuOutcome::Frozen => {
                error!(
                    supervisor = %self.bot.name,
                    ceiling_ms = timing.menu_flow_ceiling_ms,
                    "Menu flow did not return, client reads are frozen"
                );
                return Err(self.escalate("menu flow froze"));
            }
        }
        Ok(())
    }

    /// Run one navigator step on its own thread, bounded by the freeze ceiling.
    fn run_menu_step(&self, process: &Context) -> MenuOutcome {
        let navigator = Arc::clone(&self.navigator);
        let step_ctx = process.child();
        let worker_ctx = step_ctx.clone();
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let _ = tx.send(navigator.step(&worker_ctx));
        });

        let outcome = match rx.recv_timeout(self.bot.timing().menu_flow_ceiling()) {
            Ok(result) => MenuOutcome::Finished(result),
            Err(RecvTimeoutError::Timeout) => MenuOutcome::Frozen,
            Err(RecvTimeoutError::Disconnected) => {
                MenuOutcome::Finished(Err(MenuError::retryable("menu flow panicked")))
            }
        };
        step_ctx.cancel();
        outcome
    }

    /// Kill the client and build the unrecoverable error.
    pub(super) fn escalate(&mut self, reason: &str) -> SupervisorError {
        self.kill_client();
        self.set_state(SessionState::Unrecoverable);
        SupervisorError::unrecoverable(reason)
    }

    pub(super) fn kill_client(&self) {
        if let Err(e) = self.bot.client.process.kill() {
            error!(supervisor = %self.bot.name, error = %e, "Failed to kill client");
        }
    }

    pub(super) fn set_state(&mut self, new_state: SessionState) {
        match self.state.try_transition(new_state) {
            Ok(state) => {
                if state != self.state {
                    debug!(supervisor = %self.bot.name, from = %self.state, to = %state, "Session state changed");
                }
                self.state = state;
            }
            Err(e) => warn!(supervisor = %self.bot.name, error = %e, "Ignoring state change"),
        }
    }
}

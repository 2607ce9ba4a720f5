//! Menu navigation: one step toward being in a session.
//!
//! Each [`MenuNavigator::step`] looks at the current screen and performs the
//! single next action. The supervisor calls it repeatedly until the client
//! is in a session, classifying every error it returns.

use crossbeam_channel::{bounded, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::errors::{MenuError, TransientKind};
use crate::companion::JoinDecision;
use crate::context::Context;
use crate::models::constants::screen::LOBBY_BUTTON;
use crate::models::constants::{
    MAX_CREATE_MODAL_FAILURES, MAX_LOBBY_CREATE_FAILURES, MAX_LOBBY_ENTRY_CLICKS,
    MAX_MODAL_DISMISS_FAILURES,
};
use crate::models::{GameAttempt, SessionIdentity};
use crate::runtime::BotContext;

/// Modal texts that mean the lobby refused to create a session.
const CREATE_FAILURE_MODALS: [&str; 2] = ["failed to create game", "unable to join"];

/// Run `action` on its own thread and give up after `timeout`.
///
/// A timed out call keeps running in the background; its result is dropped.
pub fn call_with_timeout<T, F>(timeout: Duration, action: &str, f: F) -> Result<T, MenuError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(MenuError::retryable(format!("{action} failed: {e}"))),
        Err(RecvTimeoutError::Timeout) => Err(MenuError::retryable(format!(
            "{action}: menu action timed out after {}ms",
            timeout.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(MenuError::retryable(format!(
            "{action}: menu action panicked"
        ))),
    }
}

/// Failure counters of the current entry episode.
#[derive(Debug, Default)]
struct Counters {
    /// Modals that survived an escape press in a row
    modal: GameAttempt,
    /// Lobby creations that failed in a row
    create: GameAttempt,
    /// Suffix for the next lobby session name
    game_counter: u32,
}

/// Drives the client from menus into a session.
pub struct MenuNavigator {
    bot: Arc<BotContext>,
    counters: Mutex<Counters>,
}

impl MenuNavigator {
    pub fn new(bot: Arc<BotContext>) -> Self {
        let game_counter = bot.config.game.public_game_counter.max(1);
        Self {
            bot,
            counters: Mutex::new(Counters {
                game_counter,
                ..Default::default()
            }),
        }
    }

    /// Consecutive failures of the current episode, all classes combined.
    pub fn failure_count(&self) -> u32 {
        let counters = self.counters();
        counters.modal.consecutive_failures + counters.create.consecutive_failures
    }

    /// Counter that will name the next lobby session.
    pub fn game_counter(&self) -> u32 {
        self.counters().game_counter
    }

    /// Start a new episode. Called when a session is entered.
    pub fn reset_attempts(&self) {
        let mut counters = self.counters();
        counters.modal.reset();
        counters.create.reset();
    }

    /// Perform the next menu action.
    ///
    /// `Ok(())` means the action that should lead into (or out of) a session
    /// was performed; the caller re-checks where the client ended up.
    pub fn step(&self, ctx: &Context) -> Result<(), MenuError> {
        let screen = &self.bot.client.screen;
        let timing = self.bot.timing();

        self.refresh()?;

        if screen.is_loading_screen() {
            ctx.sleep(timing.idle_poll());
            return Err(MenuError::Transient(TransientKind::Loading));
        }

        if screen.is_in_character_creation() {
            info!(supervisor = %self.bot.name, "Character creation screen detected, leaving it");
            self.press_escape()?;
            ctx.sleep(timing.input_settle());
            self.refresh()?;
            if screen.is_in_character_creation() {
                return Err(MenuError::retryable(
                    "failed to leave character creation screen",
                ));
            }
        }

        if self.bot.client.manager.in_session() {
            info!(supervisor = %self.bot.name, "Still in a session, leaving it");
            let manager = Arc::clone(&self.bot.client.manager);
            return call_with_timeout(timing.menu_action_timeout(), "exit session", move || {
                manager.exit_session()
            });
        }

        self.dismiss_modal(ctx)?;

        if self.bot.role.is_follower() {
            self.companion_flow(ctx)
        } else {
            self.standard_flow(ctx)
        }
    }

    fn dismiss_modal(&self, ctx: &Context) -> Result<(), MenuError> {
        let screen = &self.bot.client.screen;
        let Some(text) = screen.dismissable_modal() else {
            self.counters().modal.reset();
            return Ok(());
        };

        info!(supervisor = %self.bot.name, modal = %text, "Dismissable modal present, pressing escape");
        self.press_escape()?;
        ctx.sleep(self.bot.timing().input_settle());
        self.refresh()?;

        let Some(text) = screen.dismissable_modal() else {
            return Ok(());
        };
        let mut counters = self.counters();
        let failures = counters.modal.record_failure(format!("modal: {text}"));
        if counters.modal.has_reached(MAX_MODAL_DISMISS_FAILURES) {
            counters.modal.reset();
            return Err(MenuError::unrecoverable(format!(
                "modal '{text}' still present after {failures} attempts"
            )));
        }
        Err(MenuError::retryable(format!(
            "modal still present after escape: {text}"
        )))
    }

    fn standard_flow(&self, ctx: &Context) -> Result<(), MenuError> {
        let screen = &self.bot.client.screen;
        let lobby_mode = self.bot.config.is_online() && self.bot.config.game.create_lobby_games;
        let in_selection = screen.is_in_character_selection();
        let in_lobby = screen.is_in_lobby();

        if in_selection && !lobby_mode {
            return self.new_session();
        }
        if lobby_mode {
            if !in_lobby {
                self.enter_lobby(ctx)?;
            }
            return self.create_lobby_session();
        }
        if in_lobby {
            info!(supervisor = %self.bot.name, "In lobby without lobby mode, returning to character selection");
            self.press_escape()?;
            ctx.sleep(self.bot.timing().input_settle());
            self.refresh()?;
            if screen.is_in_character_selection() {
                return self.new_session();
            }
            return Err(MenuError::retryable(
                "failed to return to character selection",
            ));
        }
        Err(MenuError::retryable("unhandled menu scenario"))
    }

    fn companion_flow(&self, ctx: &Context) -> Result<(), MenuError> {
        let coordinator = &self.bot.coordinator;
        let screen = &self.bot.client.screen;
        let stored = coordinator.stored_session();

        if stored.is_empty() {
            ctx.sleep(self.bot.timing().join_poll_interval());
            return Err(MenuError::Transient(TransientKind::Idle));
        }

        match coordinator.await_leader(&stored.name, ctx) {
            JoinDecision::Proceed => {}
            JoinDecision::Cancelled => return Err(MenuError::Transient(TransientKind::Noop)),
            JoinDecision::LeaderElsewhere { .. } | JoinDecision::TimedOut { .. } => {
                coordinator.clear_stored_session_if(&stored.name);
                return Err(MenuError::Transient(TransientKind::Idle));
            }
        }

        if screen.is_in_character_selection() {
            self.enter_lobby(ctx)?;
            return self.join_session(&stored);
        }
        if screen.is_in_lobby() {
            return self.join_session(&stored);
        }
        Err(MenuError::retryable("unhandled companion menu scenario"))
    }

    fn new_session(&self) -> Result<(), MenuError> {
        self.counters().create.begin();
        let manager = Arc::clone(&self.bot.client.manager);
        call_with_timeout(
            self.bot.timing().menu_action_timeout(),
            "new session",
            move || manager.new_session(),
        )
    }

    fn join_session(&self, session: &SessionIdentity) -> Result<(), MenuError> {
        info!(supervisor = %self.bot.name, game = %session.name, "Joining companion session");
        // Any exit signal still pending belongs to an earlier session.
        if self.bot.coordinator.drain_exit_signal() {
            debug!(supervisor = %self.bot.name, "Discarded exit signal from a previous session");
        }
        let manager = Arc::clone(&self.bot.client.manager);
        let name = session.name.clone();
        let password = session.password.clone();
        call_with_timeout(
            self.bot.timing().menu_action_timeout(),
            "join session",
            move || manager.join_online_session(&name, &password),
        )
    }

    fn enter_lobby(&self, ctx: &Context) -> Result<(), MenuError> {
        let screen = &self.bot.client.screen;
        if screen.is_in_lobby() {
            return Ok(());
        }

        let (x, y) = LOBBY_BUTTON;
        for click in 1..=MAX_LOBBY_ENTRY_CLICKS {
            self.bot
                .client
                .input
                .click(x, y)
                .map_err(|e| MenuError::retryable(format!("failed to click lobby button: {e}")))?;
            if !ctx.sleep(self.bot.timing().input_settle()) {
                break;
            }
            self.refresh()?;
            if screen.is_in_lobby() {
                return Ok(());
            }
            debug!(supervisor = %self.bot.name, click, "Lobby not reached yet");
        }
        Err(MenuError::retryable("failed to enter lobby"))
    }

    fn create_lobby_session(&self) -> Result<(), MenuError> {
        let counter = {
            let mut counters = self.counters();
            counters.create.begin();
            counters.game_counter
        };
        let manager = Arc::clone(&self.bot.client.manager);
        let created = call_with_timeout(
            self.bot.timing().menu_action_timeout(),
            "create lobby session",
            move || manager.create_lobby_session(counter),
        );

        let identity = match created {
            Ok(identity) => identity,
            Err(e) => {
                let mut counters = self.counters();
                counters.game_counter += 1;
                let failures = counters.create.record_failure(e.to_string());
                if counters.create.has_reached(MAX_LOBBY_CREATE_FAILURES) {
                    counters.create.reset();
                    return Err(MenuError::unrecoverable(format!(
                        "failed to create lobby session {failures} times: {e}"
                    )));
                }
                return Err(e);
            }
        };

        if let Some(text) = self.bot.client.screen.dismissable_modal() {
            let mut counters = self.counters();
            counters.game_counter += 1;
            let lowered = text.to_lowercase();
            if CREATE_FAILURE_MODALS.iter().any(|m| lowered.contains(m)) {
                let failures = counters.create.record_failure(text.clone());
                warn!(supervisor = %self.bot.name, modal = %text, failures, "Lobby refused to create session");
                if counters.create.has_reached(MAX_CREATE_MODAL_FAILURES) {
                    counters.create.reset();
                    return Err(MenuError::unrecoverable(format!(
                        "lobby refused to create a session {failures} times: {text}"
                    )));
                }
            }
            return Err(MenuError::retryable(format!(
                "modal after creating session: {text}"
            )));
        }

        let mut counters = self.counters();
        counters.game_counter += 1;
        counters.create.reset();
        info!(supervisor = %self.bot.name, game = %identity.name, "Lobby session created");
        Ok(())
    }

    fn refresh(&self) -> Result<(), MenuError> {
        self.bot
            .client
            .screen
            .refresh()
            .map_err(|e| MenuError::retryable(format!("failed to read client state: {e}")))
    }

    fn press_escape(&self) -> Result<(), MenuError> {
        self.bot
            .client
            .input
            .press_escape()
            .map_err(|e| MenuError::retryable(format!("failed to press escape: {e}")))
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }
}

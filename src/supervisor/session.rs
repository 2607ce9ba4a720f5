//! In-session half of the supervisor loop.
//!
//! Order of a session:
//! 1. plan the runs and announce the session (join request for leaders)
//! 2. start the session threads (broadcaster, watchdog, exit relay)
//! 3. run the gameplay executor under the session context
//! 4. stop the session threads, then exit the session and report the outcome

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use rand::thread_rng;
use tracing::{debug, error, info, warn};

use super::classify::{decide_rejoin, finish_reason, RejoinDecision};
use super::control::{Flow, Supervisor};
use super::errors::{RunError, SupervisorError};
use super::watchdog::ActivityWatchdog;
use crate::companion::{publish_exit_heartbeat, LeaderBroadcaster};
use crate::config::Difficulty;
use crate::context::{CancelReason, Context};
use crate::events::{Event, FinishReason};
use crate::models::constants::screen::{DIFFICULTY_HELL, DIFFICULTY_MENU, DIFFICULTY_NIGHTMARE};
use crate::models::{SessionIdentity, SessionState};
use crate::plan::{build_plan, RunKind};

impl Supervisor {
    /// Play one session from entry to exit.
    pub(super) fn run_session(&mut self, process: &Context) -> Result<Flow, SupervisorError> {
        let bot = Arc::clone(&self.bot);
        self.out_of_session_since = Instant::now();
        self.set_state(SessionState::Transitioning);
        self.set_state(SessionState::InSession);
        self.navigator.reset_attempts();

        let Some(ordered) = self.order_runs() else {
            return Ok(Flow::Stop);
        };

        let shrine_leads = if bot.role.is_leader() {
            bot.coordinator.take_shrine_reports()
        } else {
            Vec::new()
        };
        let mut plan = build_plan(bot.character.as_ref(), &ordered, shrine_leads);
        if bot.config.game.randomize_runs {
            plan.shuffle(&mut thread_rng());
        }
        bot.reset_buff_timer();

        let identity = bot.client.manager.last_session();
        self.stats.sessions_started += 1;
        self.stats.last_game = Some(identity.name.clone());
        info!(
            supervisor = %bot.name,
            game = %identity.name,
            runs = ?plan.runs,
            "Session started"
        );
        bot.bus.publish(&Event::SessionCreated {
            supervisor: bot.name.clone(),
            name: identity.name.clone(),
            password: identity.password.clone(),
        });
        if bot.role.is_leader() {
            bot.bus.publish(&Event::JoinRequest {
                leader: bot.name.clone(),
                name: identity.name.clone(),
                password: identity.password.clone(),
            });
        }
        let session = match bot.config.game.max_game_length() {
            Some(limit) => process.child_with_timeout(limit),
            None => process.child(),
        };
        let tasks = self.spawn_session_tasks(&session);
        if bot.role.is_follower() && !bot.coordinator.heartbeat().leader_is_in(&identity.name) {
            info!(
                supervisor = %bot.name,
                game = %identity.name,
                "Leader already left this session, ending it"
            );
            session.cancel();
        }

        let started = Instant::now();
        let result = bot
            .executor
            .run_session(&session, self.first_attempt, &plan);
        self.first_attempt = false;

        session.cancel();
        for task in tasks {
            let _ = task.join();
        }

        match result {
            Ok(()) => self.finish_ok(&identity, started),
            Err(err) => self.finish_with_error(process, err, &identity, started),
        }
    }

    /// Apply the configured difficulty and check the level cap.
    ///
    /// Returns `None` when the character reached `stop_leveling_at`.
    fn order_runs(&mut self) -> Option<Vec<RunKind>> {
        let bot = Arc::clone(&self.bot);
        let game = &bot.config.game;

        let option = match game.difficulty {
            Difficulty::Normal => None,
            Difficulty::Nightmare => Some(DIFFICULTY_NIGHTMARE),
            Difficulty::Hell => Some(DIFFICULTY_HELL),
        };
        if let Some((x, y)) = option {
            info!(supervisor = %bot.name, difficulty = %game.difficulty, "Selecting difficulty");
            let settle = bot.timing().input_settle();
            let clicks = [DIFFICULTY_MENU, (x, y), DIFFICULTY_MENU];
            for (cx, cy) in clicks {
                if let Err(e) = bot.client.input.click(cx, cy) {
                    warn!(supervisor = %bot.name, error = %e, "Difficulty selection input failed");
                    break;
                }
                self.stop.sleep(settle);
            }
        }

        let level = bot.client.screen.player_level();
        if game.stop_leveling_at > 0 && level >= game.stop_leveling_at {
            info!(
                supervisor = %bot.name,
                level,
                stop_leveling_at = game.stop_leveling_at,
                "Level cap reached, stopping supervisor"
            );
            self.stop.cancel();
            return None;
        }
        Some(bot.runs.clone())
    }

    /// Start the threads bound to `session`.
    fn spawn_session_tasks(&self, session: &Context) -> Vec<JoinHandle<()>> {
        let bot = &self.bot;
        let timing = bot.timing();
        let mut tasks = Vec::with_capacity(2);

        if bot.role.is_leader() {
            let broadcaster = LeaderBroadcaster::new(
                bot.name.clone(),
                bot.bus.clone(),
                Arc::clone(&bot.client.manager),
                timing.leader_heartbeat_interval(),
            );
            tasks.push(broadcaster.spawn(session.clone()));
        }

        let watchdog = ActivityWatchdog::new(timing.stuck_remediation(), timing.stuck_kill());
        tasks.push(watchdog.spawn(
            bot.name.clone(),
            bot.client.clone(),
            session.clone(),
            timing.activity_sample(),
        ));

        if bot.role.is_follower() {
            tasks.push(bot.coordinator.spawn_exit_relay(session));
        }
        tasks
    }

    /// Normal completion: report, exit, forget the follower's session.
    fn finish_ok(
        &mut self,
        identity: &SessionIdentity,
        started: Instant,
    ) -> Result<Flow, SupervisorError> {
        let bot = Arc::clone(&self.bot);
        info!(
            supervisor = %bot.name,
            game = %identity.name,
            elapsed_secs = started.elapsed().as_secs(),
            "Session finished successfully"
        );
        self.report_finish(FinishReason::Ok, "session finished successfully");

        self.set_state(SessionState::Transitioning);
        if let Err(e) = bot.client.manager.exit_session() {
            let message = format!("failed to exit session: {e}");
            error!(supervisor = %bot.name, error = %e, "Failed to exit finished session");
            bot.bus.publish(&Event::SessionFinished {
                supervisor: bot.name.clone(),
                reason: FinishReason::Error,
                message: message.clone(),
            });
            return Err(SupervisorError::ExitFailed(message));
        }
        if bot.role.is_leader() {
            publish_exit_heartbeat(&bot.bus, &bot.name, &identity.name);
            // After the exit heartbeat, so followers still match it to their session.
            bot.bus.publish(&Event::ResetSessionInfo {
                leader: bot.name.clone(),
            });
        }
        if bot.role.is_follower() {
            bot.coordinator.clear_stored_session();
        }

        self.stop.sleep(bot.timing().post_session_settle());
        self.out_of_session_since = Instant::now();
        self.set_state(SessionState::NotInSession);
        Ok(Flow::Continue)
    }

    /// Any other outcome: exit, confirm, report, decide on a follower rejoin.
    fn finish_with_error(
        &mut self,
        process: &Context,
        err: RunError,
        identity: &SessionIdentity,
        started: Instant,
    ) -> Result<Flow, SupervisorError> {
        let bot = Arc::clone(&self.bot);
        match &err {
            RunError::Cancelled(CancelReason::DeadlineExceeded) => info!(
                supervisor = %bot.name,
                game = %identity.name,
                "Maximum session length reached, leaving session"
            ),
            _ => warn!(
                supervisor = %bot.name,
                game = %identity.name,
                error = %err,
                elapsed_secs = started.elapsed().as_secs(),
                "Session ended with error, leaving session"
            ),
        }

        self.set_state(SessionState::Transitioning);
        if let Err(e) = bot.client.manager.exit_session() {
            error!(supervisor = %bot.name, error = %e, "Failed to exit session");
            self.set_state(SessionState::Unrecoverable);
            return Err(SupervisorError::unrecoverable(format!(
                "failed to exit session: {e}"
            )));
        }
        if bot.role.is_leader() {
            publish_exit_heartbeat(&bot.bus, &bot.name, &identity.name);
        }

        let exited = self.wait_for_exit(process)?;
        let reason = finish_reason(&Err(err.clone()));
        self.report_finish(reason, &err.to_string());
        if !exited {
            return Ok(Flow::Stop);
        }
        self.out_of_session_since = Instant::now();
        self.set_state(SessionState::NotInSession);

        if bot.role.is_follower() {
            self.decide_follower_continuation(&err);
        }
        Ok(Flow::Continue)
    }

    /// Wait for the client to confirm it left the session.
    ///
    /// Returns `Ok(false)` if the supervisor was stopped while waiting.
    fn wait_for_exit(&mut self, process: &Context) -> Result<bool, SupervisorError> {
        let bot = Arc::clone(&self.bot);
        let timing = bot.timing();

        if !self.stop.sleep(timing.exit_settle()) {
            return Ok(false);
        }

        let deadline = process.child_with_timeout(timing.exit_confirm_timeout());
        loop {
            if let Err(e) = bot.client.screen.refresh() {
                debug!(supervisor = %bot.name, error = %e, "Refresh failed while waiting for exit");
            }
            if !bot.client.manager.in_session() {
                deadline.cancel();
                return Ok(true);
            }
            if !deadline.sleep(timing.exit_poll()) {
                break;
            }
        }

        if self.stop.is_cancelled() {
            return Ok(false);
        }
        error!(
            supervisor = %bot.name,
            timeout_ms = timing.exit_confirm_timeout_ms,
            "Client did not leave the session, killing it"
        );
        Err(self.escalate("client did not confirm session exit"))
    }

    /// Keep or forget the follower's stored session after a failed session.
    fn decide_follower_continuation(&mut self, err: &RunError) {
        let bot = Arc::clone(&self.bot);
        let coordinator = &bot.coordinator;

        if err.is_emergency_retreat() {
            info!(
                supervisor = %bot.name,
                wait_ms = bot.timing().rejoin_recovery_ms,
                "Waiting before deciding whether to rejoin"
            );
            self.stop.sleep(bot.timing().rejoin_recovery());
        }

        let stored = coordinator.stored_session();
        match decide_rejoin(bot.role, err, &coordinator.heartbeat(), &stored) {
            RejoinDecision::Rejoin { game } => {
                info!(supervisor = %bot.name, game = %game, "Leader still in session, rejoining");
                self.stats.rejoins += 1;
            }
            RejoinDecision::Clear => {
                debug!(supervisor = %bot.name, "Clearing stored companion session");
                coordinator.clear_stored_session_if(&stored.name);
            }
            RejoinDecision::NotApplicable => {}
        }
    }

    fn report_finish(&mut self, reason: FinishReason, message: &str) {
        self.stats.record(reason);
        self.bot.bus.publish(&Event::SessionFinished {
            supervisor: self.bot.name.clone(),
            reason,
            message: message.to_string(),
        });
    }
}

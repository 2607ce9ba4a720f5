//! E2E tests for the supervisor loop
//!
//! These tests drive a single supervisor through whole sessions and verify
//! how sessions end, when the client gets killed, and what is reported.

use super::helpers::{leader, solo, EventLog, Harness};
use convoy::events::{Event, EventBus, FinishReason};
use convoy::models::SessionState;
use convoy::sim::{Screen, ScriptStep, SimState};
use convoy::supervisor::{RunError, SupervisorError, Termination};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A solo character plays its scripted sessions and stops cleanly
///
/// Verifies:
/// - every session is started from character selection and finishes Ok
/// - only the first session is flagged as the first attempt
/// - the client is never killed
/// - the buff timer is reset on session entry
#[test]
#[serial]
fn test_solo_supervisor_plays_sessions_until_stopped() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let script = vec![ScriptStep::Finish(Ok(())); 3];
    let mut harness =
        Harness::new(solo("Solo"), &bus, SimState::default(), script).stop_after_script();
    harness.supervisor.bot().mark_buffed();

    harness.supervisor.start().expect("Supervisor should stop cleanly");

    let stats = harness.supervisor.stats();
    assert_eq!(stats.sessions_started, 3);
    assert_eq!(stats.finished_ok, 3);
    assert_eq!(stats.last_game.as_deref(), Some("game-3"));
    assert_eq!(harness.supervisor.state(), SessionState::Stopped);
    assert_eq!(harness.executor.first_attempts(), 1);
    assert_eq!(harness.client.state().kills, 0);
    assert!(harness.supervisor.bot().last_buff_at().is_none());
    assert_eq!(log.finishes_of("Solo"), vec![FinishReason::Ok; 3]);
}

/// A death is reported and the supervisor goes back to the menus
#[test]
#[serial]
fn test_failed_session_is_reported_and_retried() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let script = vec![
        ScriptStep::Finish(Err(RunError::Died)),
        ScriptStep::Finish(Err(RunError::Other("stuck in town".to_string()))),
        ScriptStep::Finish(Ok(())),
    ];
    let mut harness =
        Harness::new(solo("Solo"), &bus, SimState::default(), script).stop_after_script();

    harness.supervisor.start().unwrap();

    assert_eq!(
        log.finishes_of("Solo"),
        vec![FinishReason::Died, FinishReason::Error, FinishReason::Ok]
    );
    let stats = harness.supervisor.stats();
    assert_eq!(stats.deaths, 1);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.sessions_finished(), 3);
    assert_eq!(harness.client.state().sessions_created, 3);
}

/// Menu reads that never return are treated as a frozen client
///
/// Verifies:
/// - the supervisor gives up after the menu flow ceiling, not the freeze
/// - the client is killed exactly once
/// - the error is unrecoverable
#[test]
#[serial]
fn test_frozen_menu_read_kills_client_once() {
    let bus = EventBus::new();
    let mut config = solo("Solo");
    config.timing.menu_flow_ceiling_ms = 200;
    let state = SimState {
        freeze_reads: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let mut harness = Harness::new(config, &bus, state, vec![]);

    let started = Instant::now();
    let err = harness.supervisor.start().unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(matches!(err, SupervisorError::Unrecoverable { .. }));
    assert_eq!(err.kind(), Termination::Restart);
    assert_eq!(harness.client.state().kills, 1);
    assert_eq!(harness.supervisor.state(), SessionState::Unrecoverable);
}

/// A client stuck on loading screens trips the out-of-session ceiling
#[test]
#[serial]
fn test_out_of_session_ceiling_kills_client() {
    let bus = EventBus::new();
    let mut config = solo("Solo");
    config.timing.out_of_session_ceiling_ms = 200;
    let state = SimState {
        screen: Screen::Loading,
        loading_refreshes: u32::MAX,
        ..Default::default()
    };
    let mut harness = Harness::new(config, &bus, state, vec![]);

    let err = harness.supervisor.start().unwrap_err();

    assert!(err.to_string().contains("outside a session"));
    assert_eq!(harness.client.state().kills, 1);
    assert_eq!(harness.client.state().sessions_created, 0);
}

/// The client accepts the exit request but never leaves the session
#[test]
#[serial]
fn test_unconfirmed_exit_kills_client() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let state = SimState {
        exit_leaves_session: false,
        ..Default::default()
    };
    let script = vec![ScriptStep::Finish(Err(RunError::Died))];
    let mut harness = Harness::new(solo("Solo"), &bus, state, script);

    let err = harness.supervisor.start().unwrap_err();

    assert!(err.to_string().contains("did not confirm session exit"));
    assert_eq!(harness.client.state().kills, 1);
    assert!(log.finishes_of("Solo").is_empty());
}

/// Leaving a finished session fails outright
///
/// Verifies the Ok finish is followed by an Error finish and the supervisor
/// returns a retryable error without killing the client.
#[test]
#[serial]
fn test_exit_failure_after_success_is_retryable() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let state = SimState {
        fail_exit: true,
        ..Default::default()
    };
    let script = vec![ScriptStep::Finish(Ok(()))];
    let mut harness = Harness::new(solo("Solo"), &bus, state, script);

    let err = harness.supervisor.start().unwrap_err();

    assert!(matches!(err, SupervisorError::ExitFailed(_)));
    assert_eq!(err.kind(), Termination::Retryable);
    assert_eq!(
        log.finishes_of("Solo"),
        vec![FinishReason::Ok, FinishReason::Error]
    );
    assert_eq!(harness.client.state().kills, 0);
}

/// Reaching the configured level stops the supervisor before playing
#[test]
#[serial]
fn test_level_cap_stops_supervisor() {
    let bus = EventBus::new();
    let mut config = solo("Solo");
    config.game.stop_leveling_at = 40;
    let state = SimState {
        level: 45,
        ..Default::default()
    };
    let mut harness = Harness::new(config, &bus, state, vec![ScriptStep::Finish(Ok(()))]);

    harness.supervisor.start().expect("Level cap is a clean stop");

    assert_eq!(harness.executor.calls(), 0);
    assert_eq!(harness.supervisor.state(), SessionState::Stopped);
}

/// The configured maximum session length interrupts gameplay
#[test]
#[serial]
fn test_max_game_length_interrupts_session() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let mut config = solo("Solo");
    config.game.max_game_length_secs = 1;
    let mut harness = Harness::new(
        config,
        &bus,
        SimState::default(),
        vec![ScriptStep::WaitForCancel, ScriptStep::Finish(Ok(()))],
    )
    .stop_after_script();

    let started = Instant::now();
    harness.supervisor.start().unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(
        log.finishes_of("Solo"),
        vec![FinishReason::Error, FinishReason::Ok]
    );
    assert_eq!(harness.client.state().kills, 0);
}

/// The leader announces its session and sends the exit heartbeat last
///
/// Verifies:
/// - a join request names the created session
/// - in-session heartbeats are published while playing
/// - exactly one `in_session = false` heartbeat, after the client left
/// - the session info reset follows the exit heartbeat
#[test]
#[serial]
fn test_leader_exit_heartbeat_follows_client_exit() {
    let bus = EventBus::new();
    let state = SimState {
        session_prefix: "run".to_string(),
        ..Default::default()
    };
    let script = vec![ScriptStep::Play {
        duration: Duration::from_millis(150),
        outcome: Ok(()),
    }];
    let harness = Harness::new(leader("Lead"), &bus, state, script).stop_after_script();

    let seen: Arc<Mutex<Vec<(Event, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let client = Arc::clone(&harness.client);
    let _subscription = bus.subscribe(Arc::new(move |event: &Event| -> anyhow::Result<()> {
        use convoy::client::SessionManager;
        sink.lock().unwrap().push((event.clone(), client.in_session()));
        Ok(())
    }));

    let mut supervisor = harness.supervisor;
    supervisor.start().unwrap();

    let seen = seen.lock().unwrap().clone();
    let join = seen
        .iter()
        .position(|(event, _)| matches!(event, Event::JoinRequest { name, .. } if name == "run-1"))
        .expect("Leader should publish a join request");

    let heartbeats: Vec<(usize, bool, bool)> = seen
        .iter()
        .enumerate()
        .filter_map(|(index, (event, client_in_session))| match event {
            Event::LeaderHeartbeat {
                game_name,
                in_session,
                ..
            } => {
                assert_eq!(game_name, "run-1");
                Some((index, *in_session, *client_in_session))
            }
            _ => None,
        })
        .collect();
    assert!(heartbeats.iter().any(|(_, in_session, _)| *in_session));

    let exits: Vec<_> = heartbeats.iter().filter(|(_, in_session, _)| !in_session).collect();
    assert_eq!(exits.len(), 1, "exactly one exit heartbeat");
    let (exit_index, _, client_in_session) = *exits[0];
    assert!(!client_in_session, "exit heartbeat sent after the client left");
    assert!(exit_index > join);
    assert!(heartbeats
        .iter()
        .filter(|(_, in_session, _)| *in_session)
        .all(|(index, _, _)| *index < exit_index));

    let reset = seen
        .iter()
        .position(|(event, _)| matches!(event, Event::ResetSessionInfo { .. }))
        .expect("Leader should reset session info");
    assert!(reset > exit_index);
}

/// The configured difficulty is picked before the runs start
#[test]
#[serial]
fn test_difficulty_is_selected_each_session() {
    use convoy::config::Difficulty;
    use convoy::models::constants::screen::{DIFFICULTY_HELL, DIFFICULTY_MENU};

    let bus = EventBus::new();
    let mut config = solo("Solo");
    config.game.difficulty = Difficulty::Hell;
    let mut harness = Harness::new(config, &bus, SimState::default(), vec![ScriptStep::Finish(Ok(()))])
        .stop_after_script();

    harness.supervisor.start().unwrap();

    assert_eq!(
        harness.client.state().clicks,
        vec![DIFFICULTY_MENU, DIFFICULTY_HELL, DIFFICULTY_MENU]
    );
}

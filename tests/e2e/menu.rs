//! E2E tests for menu navigation
//!
//! These tests start a supervisor on a client sitting in some menu state and
//! verify how it gets into a session, or why it gives up.

use super::helpers::{solo, EventLog, Harness};
use convoy::config::CharacterConfig;
use convoy::events::{EventBus, FinishReason};
use convoy::sim::{Screen, ScriptStep, SimState};
use convoy::supervisor::SupervisorError;
use serial_test::serial;

fn lobby_player(name: &str) -> CharacterConfig {
    let mut config = solo(name);
    config.auth_method = "Battle.net".to_string();
    config.game.create_lobby_games = true;
    config.game.public_game_counter = 7;
    config
}

/// Lobby sessions are named from the public game counter
#[test]
#[serial]
fn test_lobby_mode_names_sessions_from_counter() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let script = vec![ScriptStep::Finish(Ok(())); 2];
    let mut harness =
        Harness::new(lobby_player("Host"), &bus, SimState::default(), script).stop_after_script();

    harness.supervisor.start().unwrap();

    assert_eq!(harness.supervisor.stats().last_game.as_deref(), Some("game-8"));
    assert_eq!(log.finishes_of("Host"), vec![FinishReason::Ok; 2]);
    assert!(harness
        .client
        .state()
        .clicks
        .contains(&convoy::models::constants::screen::LOBBY_BUTTON));
}

/// A modal that survives every escape ends in an unrecoverable error
///
/// Verifies:
/// - exactly three dismissal attempts are made
/// - the client is not killed by the menu flow itself
#[test]
#[serial]
fn test_sticky_modal_is_unrecoverable_after_three_attempts() {
    let bus = EventBus::new();
    let state = SimState {
        modal: Some("Please wait".to_string()),
        modal_sticky: true,
        ..Default::default()
    };
    let mut harness = Harness::new(solo("Solo"), &bus, state, vec![]);

    let err = harness.supervisor.start().unwrap_err();

    match err {
        SupervisorError::Unrecoverable { reason } => {
            assert!(reason.contains("Please wait"), "unexpected reason: {reason}");
        }
        other => panic!("expected unrecoverable error, got {other:?}"),
    }
    let state = harness.client.state();
    assert_eq!(state.escapes, 3);
    assert_eq!(state.kills, 0);
    assert_eq!(state.sessions_created, 0);
}

/// Lobby creation keeps failing
#[test]
#[serial]
fn test_lobby_create_errors_escalate_after_five() {
    let bus = EventBus::new();
    let state = SimState {
        create_errors: 10,
        ..Default::default()
    };
    let mut harness = Harness::new(lobby_player("Host"), &bus, state, vec![]);

    let err = harness.supervisor.start().unwrap_err();

    assert!(err.is_unrecoverable());
    assert!(err.to_string().contains("5 times"), "unexpected error: {err}");
    assert_eq!(harness.client.state().create_errors, 5);
}

/// The lobby answers with "failed to create game" modals
#[test]
#[serial]
fn test_create_game_refusals_escalate_after_three() {
    let bus = EventBus::new();
    let state = SimState {
        create_refusals: 10,
        ..Default::default()
    };
    let mut harness = Harness::new(lobby_player("Host"), &bus, state, vec![]);

    let err = harness.supervisor.start().unwrap_err();

    assert!(err.is_unrecoverable());
    assert!(err.to_string().contains("3 times"), "unexpected error: {err}");
    let state = harness.client.state();
    assert_eq!(state.create_refusals, 7);
    assert_eq!(state.sessions_created, 0);
}

/// Failures below the ceiling are retried until a session is created
#[test]
#[serial]
fn test_lobby_create_recovers_below_ceiling() {
    let bus = EventBus::new();
    let state = SimState {
        create_errors: 4,
        ..Default::default()
    };
    let mut harness = Harness::new(
        lobby_player("Host"),
        &bus,
        state,
        vec![ScriptStep::Finish(Ok(()))],
    )
    .stop_after_script();

    harness.supervisor.start().expect("Supervisor should recover");

    assert_eq!(harness.client.state().sessions_created, 1);
    // Four failed creations consumed counters 7 to 10.
    assert_eq!(harness.supervisor.stats().last_game.as_deref(), Some("game-11"));
}

/// The character creation screen is left with escape
#[test]
#[serial]
fn test_character_creation_screen_is_left() {
    let bus = EventBus::new();
    let state = SimState {
        screen: Screen::CharacterCreation,
        ..Default::default()
    };
    let mut harness = Harness::new(solo("Solo"), &bus, state, vec![ScriptStep::Finish(Ok(()))])
        .stop_after_script();

    harness.supervisor.start().unwrap();

    let state = harness.client.state();
    assert_eq!(state.escapes, 1);
    assert_eq!(state.sessions_created, 1);
}

/// Loading screens are waited out without counting as failures
#[test]
#[serial]
fn test_loading_screen_is_waited_out() {
    let bus = EventBus::new();
    let state = SimState {
        screen: Screen::Loading,
        loading_refreshes: 5,
        ..Default::default()
    };
    let mut harness = Harness::new(solo("Solo"), &bus, state, vec![ScriptStep::Finish(Ok(()))])
        .stop_after_script();

    harness.supervisor.start().unwrap();

    let state = harness.client.state();
    assert_eq!(state.sessions_created, 1);
    assert_eq!(state.kills, 0);
}

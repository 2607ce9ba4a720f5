//! E2E tests for the activity watchdog
//!
//! The simulated player either walks one tile per sample or stands still.

use super::helpers::{solo, EventLog, Harness};
use convoy::config::CharacterConfig;
use convoy::events::{EventBus, FinishReason};
use convoy::models::constants::screen::REMEDIATION_CLICK;
use convoy::sim::{ScriptStep, SimState};
use serial_test::serial;
use std::time::Duration;

fn watched(name: &str) -> CharacterConfig {
    let mut config = solo(name);
    config.timing.activity_sample_ms = 10;
    config.timing.stuck_remediation_ms = 60;
    config.timing.stuck_kill_ms = 150;
    config
}

/// A player standing still gets one corrective click, then the client dies
///
/// Verifies:
/// - exactly one remediation click
/// - exactly one kill, which also ends the session
/// - the session is reported as an error
#[test]
#[serial]
fn test_stuck_player_is_remediated_then_killed() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let state = SimState {
        moving: false,
        ..Default::default()
    };
    let mut harness = Harness::new(watched("Solo"), &bus, state, vec![ScriptStep::WaitForCancel])
        .stop_after_script();

    harness.supervisor.start().unwrap();

    let state = harness.client.state();
    let remediations = state
        .clicks
        .iter()
        .filter(|click| **click == REMEDIATION_CLICK)
        .count();
    assert_eq!(remediations, 1);
    assert_eq!(state.kills, 1);
    assert_eq!(log.finishes_of("Solo"), vec![FinishReason::Error]);
}

/// A moving player is never touched
#[test]
#[serial]
fn test_moving_player_is_left_alone() {
    let bus = EventBus::new();
    let script = vec![ScriptStep::Play {
        duration: Duration::from_millis(300),
        outcome: Ok(()),
    }];
    let mut harness =
        Harness::new(watched("Solo"), &bus, SimState::default(), script).stop_after_script();

    harness.supervisor.start().unwrap();

    let state = harness.client.state();
    assert!(!state.clicks.contains(&REMEDIATION_CLICK));
    assert_eq!(state.kills, 0);
    assert_eq!(harness.supervisor.stats().finished_ok, 1);
}

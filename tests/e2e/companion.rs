//! E2E tests for leader/follower coordination
//!
//! Leaders and followers share one event bus, as they do inside a single
//! convoy process. Followers are scripted to play until their leader leaves.

use super::helpers::{
    follower, leader, run_in_background, wait_for_condition, EventLog, Harness,
};
use anyhow::Result;
use convoy::client::{InputDevice, SessionManager};
use convoy::config::Difficulty;
use convoy::context::Context;
use convoy::events::{Event, EventBus, FinishReason};
use convoy::runtime::BotContext;
use convoy::sim::{ScriptStep, ScriptedExecutor, SimState, SimulatedClient};
use convoy::supervisor::{MenuError, MenuNavigator, RunError, Supervisor, TransientKind};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn leader_harness(bus: &EventBus, session: Duration) -> Harness {
    let state = SimState {
        session_prefix: "lead".to_string(),
        ..Default::default()
    };
    let script = vec![ScriptStep::Play {
        duration: session,
        outcome: Ok(()),
    }];
    Harness::new(leader("Lead"), bus, state, script).stop_after_script()
}

/// Follower joins the announced session and leaves when the leader does
///
/// Verifies:
/// - the follower joins the leader's session by name
/// - the leader's exit heartbeat ends the follower's session
/// - nobody kills a client
#[test]
#[serial]
fn test_follower_joins_and_leaves_with_leader() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let tag = Harness::new(follower("Tag", "Lead"), &bus, SimState::default(), vec![]);
    let tag_client = Arc::clone(&tag.client);
    let tag_stop = tag.supervisor.stop_handle();
    let lead = leader_harness(&bus, Duration::from_millis(300));
    let lead_client = Arc::clone(&lead.client);

    let follower_thread = run_in_background(tag.supervisor);
    let leader_thread = run_in_background(lead.supervisor);

    let (_, leader_result) = leader_thread.join().unwrap();
    leader_result.expect("Leader should stop cleanly");
    wait_for_condition(|| log.finishes_of("Tag").len() == 1, 2_000)
        .expect("Follower should leave with the leader");
    tag_stop.stop();
    let (_, follower_result) = follower_thread.join().unwrap();
    follower_result.expect("Follower should stop cleanly");

    assert_eq!(tag_client.state().joins, vec!["lead-1".to_string()]);
    assert_eq!(log.finishes_of("Tag"), vec![FinishReason::Error]);
    assert_eq!(log.finishes_of("Lead"), vec![FinishReason::Ok]);
    assert!(!tag_client.in_session());
    assert_eq!(tag_client.state().kills, 0);
    assert_eq!(lead_client.state().kills, 0);
}

/// Follower chickens while the leader keeps playing, then rejoins
///
/// Verifies:
/// - the stored session survives an emergency retreat while the leader is
///   still in it
/// - the follower joins the same session a second time
#[test]
#[serial]
fn test_follower_rejoins_after_chicken() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let script = vec![
        ScriptStep::Finish(Err(RunError::Chicken)),
        ScriptStep::WaitForCancel,
    ];
    let tag = Harness::new(follower("Tag", "Lead"), &bus, SimState::default(), script);
    let tag_client = Arc::clone(&tag.client);
    let tag_stop = tag.supervisor.stop_handle();
    let lead = leader_harness(&bus, Duration::from_millis(800));

    let follower_thread = run_in_background(tag.supervisor);
    let leader_thread = run_in_background(lead.supervisor);

    leader_thread.join().unwrap().1.unwrap();
    wait_for_condition(|| log.finishes_of("Tag").len() == 2, 2_000)
        .expect("Follower should finish both sessions");
    tag_stop.stop();
    let (tag_supervisor, result) = follower_thread.join().unwrap();
    result.unwrap();

    assert_eq!(
        tag_client.state().joins,
        vec!["lead-1".to_string(), "lead-1".to_string()]
    );
    assert_eq!(
        log.finishes_of("Tag"),
        vec![FinishReason::Chicken, FinishReason::Error]
    );
    assert_eq!(tag_supervisor.stats().rejoins, 1);
}

/// Without a join request the follower only waits
#[test]
#[serial]
fn test_follower_idles_without_join_request() {
    let bus = EventBus::new();
    let tag = Harness::new(follower("Tag", "Lead"), &bus, SimState::default(), vec![]);
    let tag_client = Arc::clone(&tag.client);
    let tag_stop = tag.supervisor.stop_handle();

    let follower_thread = run_in_background(tag.supervisor);
    thread::sleep(Duration::from_millis(200));
    tag_stop.stop();
    let (_, result) = follower_thread.join().unwrap();
    result.expect("Idle follower should stop cleanly");

    let state = tag_client.state();
    assert!(state.joins.is_empty());
    assert!(state.clicks.is_empty());
    assert_eq!(state.escapes, 0);
    assert_eq!(state.sessions_created, 0);
    assert_eq!(state.kills, 0);
}

/// The stored session is stale: the leader is already in another one
///
/// Verifies the follower forgets the stored session and joins neither.
#[test]
#[serial]
fn test_follower_skips_session_leader_already_left() {
    let bus = EventBus::new();
    let tag = Harness::new(follower("Tag", "Lead"), &bus, SimState::default(), vec![]);
    let tag_client = Arc::clone(&tag.client);
    let tag_stop = tag.supervisor.stop_handle();

    bus.publish(&Event::JoinRequest {
        leader: "Lead".to_string(),
        name: "G1".to_string(),
        password: "pw".to_string(),
    });
    bus.publish(&Event::LeaderHeartbeat {
        leader: "Lead".to_string(),
        game_name: "G2".to_string(),
        in_session: true,
    });

    let follower_thread = run_in_background(tag.supervisor);
    thread::sleep(Duration::from_millis(200));
    tag_stop.stop();
    let (tag_supervisor, result) = follower_thread.join().unwrap();
    result.unwrap();

    assert!(tag_client.state().joins.is_empty());
    assert!(tag_supervisor.bot().coordinator.stored_session().is_empty());
}

/// A leader that goes silent mid-session is assumed gone
#[test]
#[serial]
fn test_follower_leaves_when_leader_heartbeat_goes_stale() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let mut config = follower("Tag", "Lead");
    config.timing.heartbeat_stale_after_ms = 300;
    let tag = Harness::new(config, &bus, SimState::default(), vec![]);
    let tag_client = Arc::clone(&tag.client);
    let tag_stop = tag.supervisor.stop_handle();

    bus.publish(&Event::JoinRequest {
        leader: "Lead".to_string(),
        name: "G1".to_string(),
        password: "pw".to_string(),
    });
    bus.publish(&Event::LeaderHeartbeat {
        leader: "Lead".to_string(),
        game_name: "G1".to_string(),
        in_session: true,
    });

    let follower_thread = run_in_background(tag.supervisor);
    wait_for_condition(|| log.finishes_of("Tag").len() == 1, 3_000)
        .expect("Follower should leave once the heartbeat is stale");
    tag_stop.stop();
    let (tag_supervisor, result) = follower_thread.join().unwrap();
    result.unwrap();

    assert_eq!(tag_client.state().joins, vec!["G1".to_string()]);
    assert!(!tag_client.in_session());
    assert!(!tag_supervisor.bot().coordinator.is_leader_in_session());
    assert!(tag_supervisor.bot().coordinator.stored_session().is_empty());
}

/// Two followers of the same leader both join; nothing arbitrates between them
#[test]
#[serial]
fn test_two_followers_join_the_same_leader() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let first = Harness::new(follower("Tag", "Lead"), &bus, SimState::default(), vec![]);
    let second = Harness::new(follower("Tail", ""), &bus, SimState::default(), vec![]);
    let clients = [Arc::clone(&first.client), Arc::clone(&second.client)];
    let stops = [
        first.supervisor.stop_handle(),
        second.supervisor.stop_handle(),
    ];
    let lead = leader_harness(&bus, Duration::from_millis(300));

    let followers = [
        run_in_background(first.supervisor),
        run_in_background(second.supervisor),
    ];
    leader_thread_join(run_in_background(lead.supervisor));

    wait_for_condition(
        || log.finishes_of("Tag").len() == 1 && log.finishes_of("Tail").len() == 1,
        2_000,
    )
    .expect("Both followers should leave with the leader");
    for stop in &stops {
        stop.stop();
    }
    for handle in followers {
        handle.join().unwrap().1.unwrap();
    }

    for client in &clients {
        assert_eq!(client.state().joins, vec!["lead-1".to_string()]);
    }
}

fn leader_thread_join(
    handle: thread::JoinHandle<(
        convoy::supervisor::Supervisor,
        Result<(), convoy::supervisor::SupervisorError>,
    )>,
) {
    let (_, result) = handle.join().unwrap();
    result.expect("Leader should stop cleanly");
}

/// Input device that reports the leader leaving `game` on the first click
/// made while the follower is already inside a session.
struct LeaderLeavesOnClick {
    client: Arc<SimulatedClient>,
    bus: EventBus,
    game: String,
    fired: AtomicBool,
}

impl InputDevice for LeaderLeavesOnClick {
    fn press_escape(&self) -> Result<()> {
        self.client.press_escape()
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        if self.client.in_session() && !self.fired.swap(true, Ordering::SeqCst) {
            self.bus.publish(&Event::LeaderHeartbeat {
                leader: "Lead".to_string(),
                game_name: self.game.clone(),
                in_session: false,
            });
        }
        self.client.click(x, y)
    }
}

/// The leader leaves while the follower is still selecting a difficulty
///
/// Verifies the exit heartbeat that lands between session entry and the
/// start of gameplay still ends the follower's session.
#[test]
#[serial]
fn test_follower_leaves_when_leader_exits_during_session_entry() {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus);
    let mut config = follower("Tag", "Lead");
    config.game.difficulty = Difficulty::Hell;

    let sim = SimulatedClient::new(SimState::default());
    let mut client = sim.client();
    client.input = Arc::new(LeaderLeavesOnClick {
        client: Arc::clone(&sim),
        bus: bus.clone(),
        game: "G1".to_string(),
        fired: AtomicBool::new(false),
    });
    let executor = ScriptedExecutor::new(vec![]);
    let bot = BotContext::new(config, bus.clone(), client, executor).expect("valid config");
    let supervisor = Supervisor::new(Arc::new(bot));
    let stop = supervisor.stop_handle();

    bus.publish(&Event::JoinRequest {
        leader: "Lead".to_string(),
        name: "G1".to_string(),
        password: "pw".to_string(),
    });
    bus.publish(&Event::LeaderHeartbeat {
        leader: "Lead".to_string(),
        game_name: "G1".to_string(),
        in_session: true,
    });

    let follower_thread = run_in_background(supervisor);
    let left = wait_for_condition(|| log.finishes_of("Tag").len() == 1, 3_000);
    stop.stop();
    follower_thread.join().unwrap().1.unwrap();

    left.expect("Follower should leave once the leader has left");
    assert_eq!(sim.state().joins, vec!["G1".to_string()]);
    assert!(!sim.in_session());
    assert_eq!(log.finishes_of("Tag"), vec![FinishReason::Error]);
}

/// With no stored session the menu step reports idle after one poll
#[test]
#[serial]
fn test_idle_follower_step_returns_within_poll_interval() {
    let bus = EventBus::new();
    let mut config = follower("Tag", "Lead");
    config.timing.join_poll_interval_ms = 50;
    config.timing.join_wait_ms = 30_000;
    let tag = Harness::new(config, &bus, SimState::default(), vec![]);
    let navigator = MenuNavigator::new(Arc::clone(tag.supervisor.bot()));

    let started = Instant::now();
    let result = navigator.step(&Context::background());
    let elapsed = started.elapsed();

    assert_eq!(result, Err(MenuError::Transient(TransientKind::Idle)));
    assert!(elapsed >= Duration::from_millis(40), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "blocked for {elapsed:?}");
}

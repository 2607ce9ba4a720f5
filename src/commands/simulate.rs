//! Simulate command - run real supervisors against simulated clients
//!
//! The leader plays a fixed number of sessions, then stops. A follower, if
//! configured, joins every session the leader announces and is stopped once
//! the leader is done.

use crate::config::CharacterConfig;
use crate::events::EventBus;
use crate::runtime::BotContext;
use crate::sim::{ScriptStep, ScriptedExecutor, SimState, SimulatedClient};
use crate::supervisor::{StopHandle, Supervisor, SupervisorError, SupervisorStats};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Options of `convoy simulate`.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub leader_config: PathBuf,
    pub follower_config: Option<PathBuf>,
    pub sessions: u32,
    pub session_secs: u64,
    pub speed: u64,
    pub json: bool,
}

/// Outcome of one simulated character.
#[derive(Debug, Clone, Serialize)]
pub struct CharacterReport {
    pub name: String,
    pub role: String,
    /// `"stopped"` or the error that ended the supervisor
    pub outcome: String,
    pub stats: SupervisorStats,
    pub client_kills: u32,
    pub joins: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub leader: CharacterReport,
    pub follower: Option<CharacterReport>,
}

/// A supervisor wired to its simulated client.
struct SimCharacter {
    client: Arc<SimulatedClient>,
    supervisor: Supervisor,
}

impl SimCharacter {
    fn build(config: CharacterConfig, bus: &EventBus, executor: Arc<ScriptedExecutor>) -> Result<Self> {
        let name = config.character_name.clone();
        let client = SimulatedClient::new(SimState {
            session_prefix: name.to_lowercase(),
            ..Default::default()
        });
        let bot = BotContext::new(config, bus.clone(), client.client(), executor)
            .with_context(|| format!("Failed to set up character '{name}'"))?;
        Ok(Self {
            client,
            supervisor: Supervisor::new(Arc::new(bot)),
        })
    }

    fn spawn(self) -> thread::JoinHandle<CharacterReport> {
        let SimCharacter {
            client,
            mut supervisor,
        } = self;
        thread::spawn(move || {
            let result = supervisor.start();
            report(&supervisor, &client, result)
        })
    }
}

fn report(
    supervisor: &Supervisor,
    client: &SimulatedClient,
    result: Result<(), SupervisorError>,
) -> CharacterReport {
    let state = client.state();
    CharacterReport {
        name: supervisor.name().to_string(),
        role: supervisor.bot().role.to_string(),
        outcome: match result {
            Ok(()) => "stopped".to_string(),
            Err(e) => e.to_string(),
        },
        stats: supervisor.stats().clone(),
        client_kills: state.kills,
        joins: state.joins.clone(),
    }
}

/// Execute `convoy simulate`.
pub fn execute(options: SimulateOptions) -> Result<()> {
    let speed = options.speed.max(1);
    let leader = load_accelerated(&options.leader_config, speed)?;
    let follower = options
        .follower_config
        .as_deref()
        .map(|path| load_accelerated(path, speed))
        .transpose()?;
    let session_length = Duration::from_millis(options.session_secs * 1000 / speed);

    if !options.json {
        println!(
            "{} Simulating {} session(s) of {} (speed x{speed})",
            "→".cyan().bold(),
            options.sessions,
            leader.character_name.bold()
        );
    }

    let simulation = Simulation::new(leader, follower, options.sessions, session_length)?;
    let handles = simulation.stop_handles();
    ctrlc::set_handler(move || {
        for handle in &handles {
            handle.stop();
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    let report = simulation.run()?;
    if options.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    } else {
        print_report(&report.leader);
        if let Some(follower) = &report.follower {
            print_report(follower);
        }
    }
    Ok(())
}

fn load_accelerated(path: &std::path::Path, speed: u64) -> Result<CharacterConfig> {
    let mut config = CharacterConfig::load(path)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    config.timing = config.timing.accelerated(speed);
    Ok(config)
}

fn print_report(report: &CharacterReport) {
    let marker = if report.outcome == "stopped" {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!(
        "{marker} {} ({}): {}",
        report.name.bold(),
        report.role,
        report.outcome
    );
    let stats = &report.stats;
    println!(
        "  {} {} started, {} ok, {} chicken, {} died, {} error",
        "sessions:".dimmed(),
        stats.sessions_started,
        stats.finished_ok,
        stats.chickens + stats.merc_chickens,
        stats.deaths,
        stats.errors
    );
    if !report.joins.is_empty() {
        println!("  {} {}", "joined:".dimmed(), report.joins.join(", "));
    }
    if report.client_kills > 0 {
        println!("  {} {}", "client kills:".dimmed(), report.client_kills);
    }
}

/// Leader and optional follower sharing one event bus.
pub struct Simulation {
    leader: SimCharacter,
    follower: Option<SimCharacter>,
}

impl Simulation {
    /// Wire up the characters. The leader stops after `sessions` sessions
    /// of `session_length` each.
    pub fn new(
        leader: CharacterConfig,
        follower: Option<CharacterConfig>,
        sessions: u32,
        session_length: Duration,
    ) -> Result<Self> {
        if let Some(follower) = &follower {
            if !leader.role().is_leader() {
                bail!(
                    "'{}' must be configured as companion leader to simulate a follower",
                    leader.character_name
                );
            }
            if !follower.role().is_follower() {
                bail!(
                    "'{}' is not configured as a companion follower",
                    follower.character_name
                );
            }
            let wanted = &follower.companion.leader_name;
            if !wanted.is_empty() && *wanted != leader.character_name {
                bail!(
                    "'{}' follows '{wanted}', not '{}'",
                    follower.character_name,
                    leader.character_name
                );
            }
        }

        let bus = EventBus::new();
        let script = (0..sessions).map(|_| ScriptStep::Play {
            duration: session_length,
            outcome: Ok(()),
        });
        let leader_executor = ScriptedExecutor::new(script);
        let leader = SimCharacter::build(leader, &bus, leader_executor.clone())?;
        leader_executor.stop_when_done(leader.supervisor.stop_handle());
        if sessions == 0 {
            leader.supervisor.stop();
        }

        let follower = follower
            .map(|config| SimCharacter::build(config, &bus, ScriptedExecutor::new([])))
            .transpose()?;

        Ok(Self { leader, follower })
    }

    /// Handles that stop every simulated supervisor.
    pub fn stop_handles(&self) -> Vec<StopHandle> {
        let mut handles = vec![self.leader.supervisor.stop_handle()];
        if let Some(follower) = &self.follower {
            handles.push(follower.supervisor.stop_handle());
        }
        handles
    }

    /// Run until the leader is done, then stop the follower.
    pub fn run(self) -> Result<SimulationReport> {
        let follower_stop = self
            .follower
            .as_ref()
            .map(|follower| follower.supervisor.stop_handle());
        let follower = self.follower.map(SimCharacter::spawn);
        let leader = self.leader.spawn();

        let leader = leader
            .join()
            .map_err(|_| anyhow::anyhow!("Leader supervisor panicked"))?;
        if let Some(handle) = follower_stop {
            handle.stop();
        }
        let follower = follower
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("Follower supervisor panicked"))
            })
            .transpose()?;

        Ok(SimulationReport { leader, follower })
    }
}

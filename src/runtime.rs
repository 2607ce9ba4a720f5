//! Everything one supervised character needs, built once and shared by
//! reference.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::client::{Client, GameplayExecutor};
use crate::companion::CompanionCoordinator;
use crate::config::{CharacterConfig, ConfigError, TimingConfig};
use crate::events::{EventBus, Subscription};
use crate::models::CompanionRole;
use crate::plan::{character_for, Character, RunKind};

/// Per-character context handed to the supervisor and its components.
///
/// Owns the coordinator's bus subscription: dropping the context
/// unsubscribes it.
pub struct BotContext {
    /// Supervisor name, the configured character name
    pub name: String,
    pub config: CharacterConfig,
    pub role: CompanionRole,
    /// Configured runs, parsed
    pub runs: Vec<RunKind>,
    pub bus: EventBus,
    pub coordinator: Arc<CompanionCoordinator>,
    pub client: Client,
    pub executor: Arc<dyn GameplayExecutor>,
    pub character: Arc<dyn Character>,
    last_buff_at: Mutex<Option<Instant>>,
    _subscription: Subscription,
}

impl BotContext {
    /// Validate `config`, create the coordinator and subscribe it to `bus`.
    pub fn new(
        config: CharacterConfig,
        bus: EventBus,
        client: Client,
        executor: Arc<dyn GameplayExecutor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let runs = config.run_kinds()?;
        let character = character_for(config.class()?, &config.character_name);
        let coordinator = Arc::new(CompanionCoordinator::new(&config));
        let subscription = bus.subscribe(coordinator.clone());

        Ok(Self {
            name: config.character_name.clone(),
            role: config.role(),
            runs,
            bus,
            coordinator,
            client,
            executor,
            character,
            last_buff_at: Mutex::new(None),
            _subscription: subscription,
            config,
        })
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.config.timing
    }

    /// Forget the last buff so the next session starts by buffing.
    pub fn reset_buff_timer(&self) {
        *self.last_buff_at.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Record that the character just buffed.
    pub fn mark_buffed(&self) {
        *self.last_buff_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    pub fn last_buff_at(&self) -> Option<Instant> {
        *self.last_buff_at.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for BotContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotContext")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("runs", &self.runs)
            .finish()
    }
}

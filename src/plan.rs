//! Run catalogue, character capabilities and per-session run plans.
//!
//! A character advertises what it can do through [`Character::supports_combat`]
//! instead of stubbing out combat actions. [`build_plan`] uses that query to
//! drop runs the character could never finish.

use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::models::ShrineReport;

/// A scripted activity performed during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Stay near the leader without scripted activity.
    CompanionIdle,
    /// Scan areas for an experience shrine and report it.
    ExperienceShrine,
    Pit,
    /// Experience shrine followed by the pit.
    ExpPit,
    Countess,
    Andariel,
    Mephisto,
    Baal,
}

impl RunKind {
    /// Whether the run needs combat to complete.
    pub fn requires_combat(&self) -> bool {
        !matches!(self, RunKind::CompanionIdle | RunKind::ExperienceShrine)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::CompanionIdle => "companion_idle",
            RunKind::ExperienceShrine => "experience_shrine",
            RunKind::Pit => "pit",
            RunKind::ExpPit => "exp_pit",
            RunKind::Countess => "countess",
            RunKind::Andariel => "andariel",
            RunKind::Mephisto => "mephisto",
            RunKind::Baal => "baal",
        }
    }
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "companion_idle" | "companion" => Ok(RunKind::CompanionIdle),
            "experience_shrine" | "shrine" => Ok(RunKind::ExperienceShrine),
            "pit" => Ok(RunKind::Pit),
            "exp_pit" => Ok(RunKind::ExpPit),
            "countess" => Ok(RunKind::Countess),
            "andariel" | "andy" => Ok(RunKind::Andariel),
            "mephisto" | "meph" => Ok(RunKind::Mephisto),
            "baal" => Ok(RunKind::Baal),
            _ => bail!("unknown run '{s}'"),
        }
    }
}

/// Which [`Character`] implementation drives a config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterClass {
    ShrineHunter,
    Combatant,
}

impl FromStr for CharacterClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "shrine_hunter" => Ok(CharacterClass::ShrineHunter),
            "combatant" => Ok(CharacterClass::Combatant),
            _ => bail!("unknown character class '{s}'"),
        }
    }
}

/// Capabilities of the character being played.
pub trait Character: Send + Sync {
    fn name(&self) -> &str;

    /// False for characters that only scan and report.
    fn supports_combat(&self) -> bool;

    /// Key bindings that must be configured before the first session.
    fn required_bindings(&self) -> Vec<String>;
}

/// Non-combat follower that scans for shrines.
#[derive(Debug, Clone)]
pub struct ShrineHunter {
    name: String,
}

impl ShrineHunter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Character for ShrineHunter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_combat(&self) -> bool {
        false
    }

    fn required_bindings(&self) -> Vec<String> {
        vec!["teleport".to_string(), "town_portal".to_string()]
    }
}

/// Any character that can fight.
#[derive(Debug, Clone)]
pub struct Combatant {
    name: String,
}

impl Combatant {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Character for Combatant {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_combat(&self) -> bool {
        true
    }

    fn required_bindings(&self) -> Vec<String> {
        vec![
            "primary_skill".to_string(),
            "secondary_skill".to_string(),
            "town_portal".to_string(),
        ]
    }
}

/// Build the character implementation for `class`.
pub fn character_for(class: CharacterClass, name: &str) -> Arc<dyn Character> {
    match class {
        CharacterClass::ShrineHunter => Arc::new(ShrineHunter::new(name)),
        CharacterClass::Combatant => Arc::new(Combatant::new(name)),
    }
}

/// Everything the gameplay executor needs for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub runs: Vec<RunKind>,
    /// Shrines reported by followers since the previous session (leader only)
    pub shrine_leads: Vec<ShrineReport>,
}

impl RunPlan {
    /// Shuffle the run order in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.runs.shuffle(rng);
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Build the plan for one session from the ordered run list.
///
/// Keeps the given order and drops runs the character cannot perform.
pub fn build_plan(
    character: &dyn Character,
    ordered: &[RunKind],
    shrine_leads: Vec<ShrineReport>,
) -> RunPlan {
    let mut runs = Vec::with_capacity(ordered.len());
    for run in ordered {
        if run.requires_combat() && !character.supports_combat() {
            tracing::debug!(
                character = character.name(),
                run = %run,
                "Skipping run that requires combat"
            );
            continue;
        }
        runs.push(*run);
    }
    RunPlan { runs, shrine_leads }
}

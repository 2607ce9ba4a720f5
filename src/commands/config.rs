//! Config command - validate and print character configuration files

use crate::config::CharacterConfig;
use crate::plan::character_for;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

/// Validate the config at `path` and summarize it.
pub fn check(path: &Path) -> Result<()> {
    let config = CharacterConfig::load(path)
        .with_context(|| format!("Invalid config: {}", path.display()))?;

    println!("{} {} is valid", "✓".green().bold(), path.display());
    println!("  {} {}", "character:".dimmed(), config.character_name);
    println!("  {} {}", "role:".dimmed(), config.role());
    println!("  {} {}", "class:".dimmed(), config.character_class);
    println!("  {} {}", "runs:".dimmed(), describe_runs(&config)?);
    let character = character_for(config.class()?, &config.character_name);
    println!(
        "  {} {}",
        "bindings:".dimmed(),
        character.required_bindings().join(", ")
    );
    if config.is_online() && config.game.create_lobby_games {
        println!(
            "  {} lobby sessions from counter {}",
            "mode:".dimmed(),
            config.game.public_game_counter
        );
    }
    Ok(())
}

/// Print the config at `path` with every default filled in.
pub fn show(path: &Path) -> Result<()> {
    let config = CharacterConfig::load(path)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    let rendered = config
        .to_toml_string()
        .context("Failed to render config")?;
    print!("{rendered}");
    Ok(())
}

fn describe_runs(config: &CharacterConfig) -> Result<String> {
    let runs = config.run_kinds()?;
    if runs.is_empty() {
        return Ok("(none)".to_string());
    }
    Ok(runs
        .iter()
        .map(|run| run.as_str())
        .collect::<Vec<_>>()
        .join(", "))
}

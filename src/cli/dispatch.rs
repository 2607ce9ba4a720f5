use anyhow::Result;
use convoy::commands::{config, simulate};

use super::types::{Commands, ConfigCommands};

pub fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Check { path } => config::check(&path),
            ConfigCommands::Show { path } => config::show(&path),
        },
        Commands::Simulate {
            config,
            follower,
            sessions,
            session_secs,
            speed,
            json,
        } => simulate::execute(simulate::SimulateOptions {
            leader_config: config,
            follower_config: follower,
            sessions,
            session_secs,
            speed,
            json,
        }),
    }
}

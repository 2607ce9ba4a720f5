use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "
   ┌─┐┌─┐┌┐┌┬  ┬┌─┐┬ ┬
   │  │ │││││┌┘│ │└┬┘
   └─┘└─┘┘└┘└┘ └─┘ ┴

{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}";

#[derive(Parser)]
#[command(name = "convoy")]
#[command(about = "Leader/follower session supervisor for automated game clients", long_about = None)]
#[command(version)]
#[command(help_template = HELP_TEMPLATE)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    /// Log at debug level (overrides CONVOY_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect character configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run supervisors against simulated clients
    Simulate {
        /// Config of the leader (or solo) character
        config: PathBuf,

        /// Config of a follower joining the leader's sessions
        #[arg(short, long)]
        follower: Option<PathBuf>,

        /// Sessions the leader plays before stopping
        #[arg(short, long, default_value_t = 3)]
        sessions: u32,

        /// Length of one simulated session, in seconds of real time
        #[arg(long, default_value_t = 60)]
        session_secs: u64,

        /// Divide every configured timing by this factor
        #[arg(long, default_value_t = 1000)]
        speed: u64,

        /// Print the final statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a config file
    Check {
        /// Path to the config file
        path: PathBuf,
    },

    /// Print a config file with every default filled in
    Show {
        /// Path to the config file
        path: PathBuf,
    },
}

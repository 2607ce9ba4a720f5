mod cli;

use anyhow::Result;
use clap::Parser;

use cli::dispatch::dispatch;
use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    convoy::logging::init(cli.verbose);
    dispatch(cli.command)
}

use clap::{Parser, Subcommand};
use utils::version;

use crate::config::daemon::{CheckArgs, RunArgs};

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sample host metrics and broadcast the ones worth reporting
    Run(RunArgs),
    /// Validate the configuration and list the metric instances it expands to
    Check(CheckArgs),
}

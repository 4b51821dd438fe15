use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::duration::parse_duration;

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    #[arg(
        long,
        env = "HOSTBEACON_CONFIG",
        value_hint = clap::ValueHint::FilePath,
        default_value = "config.yaml",
        help = "Path to the metrics configuration file"
    )]
    pub config: PathBuf,

    #[arg(
        long,
        env = "HOSTBEACON_BROADCAST_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Write broadcast lines to this daily-rotated file instead of stdout, e.g. /var/log/hostbeacon/broadcast.log"
    )]
    pub broadcast_file: Option<PathBuf>,

    #[arg(
        long,
        value_parser = parse_duration,
        help = "Override the configured check frequency, e.g. 500ms or 2s"
    )]
    pub check_frequency: Option<Duration>,
}

#[derive(Parser, Clone, Debug)]
pub struct CheckArgs {
    #[arg(
        long,
        env = "HOSTBEACON_CONFIG",
        value_hint = clap::ValueHint::FilePath,
        default_value = "config.yaml",
        help = "Path to the metrics configuration file"
    )]
    pub config: PathBuf,
}

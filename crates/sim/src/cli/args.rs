pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ehr-sim")]
#[command(about = "Per-patient searchable encryption simulator")]
pub struct Args {
    /// Path to the config file (defaults to ~/.ehr-sim/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: crate::Command,
}

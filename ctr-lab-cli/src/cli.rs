use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::commands::{config::ConfigCommands, design::DesignArgs, simulate::SimulateArgs};
use crate::output::OutputFormat;

/// Simulate A/A and A/B click-through-rate experiments and compare how
/// well common significance tests hold their size and power.
#[derive(Debug, Parser)]
#[command(name = "ctr-lab", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the per-user config.toml)
    #[arg(short, long, global = true, env = "CTR_LAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format; overrides the configured one
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the A/A and A/B simulation and evaluate every test
    Simulate(SimulateArgs),

    /// Compute the required views per group for a two-proportion test
    Design(DesignArgs),

    /// Inspect the effective configuration
    Config(ConfigCommands),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

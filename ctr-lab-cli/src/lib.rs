//! `ctr-lab` command-line driver.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod output;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands, LogFormat};
use context::Context;

/// Install the global tracing subscriber. Logs go to stderr so structured
/// command output on stdout stays parseable.
pub fn init_tracing(format: LogFormat, verbose: bool) {
    let default_filter = if verbose { "warn,ctr_lab=debug" } else { "warn,ctr_lab=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let text = (format == LogFormat::Text).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context::new(&cli)?;
    tracing::debug!(format = %ctx.output_format, "configuration loaded");

    match cli.command {
        Commands::Simulate(args) => commands::simulate::execute(&ctx, args),
        Commands::Design(args) => commands::design::execute(&ctx, args),
        Commands::Config(cmd) => commands::config::execute(&ctx, cmd),
    }
}

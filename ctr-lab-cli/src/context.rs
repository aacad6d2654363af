//! CLI execution context

use anyhow::Result;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::LabConfig;
use crate::output::{OutputFormat, OutputWriter};

/// Execution context for CLI commands
pub struct Context {
    /// Effective configuration before command flags
    pub config: LabConfig,

    /// File the configuration was read from, if one was given explicitly
    pub config_path: Option<PathBuf>,

    pub output_format: OutputFormat,

    pub output: OutputWriter,
}

impl Context {
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = LabConfig::load(cli.config.as_deref())?;

        let output_format = cli.output.unwrap_or(config.output.format);
        let output = OutputWriter::new(output_format, cli.no_color || config.output.no_color);

        Ok(Self {
            config,
            config_path: cli.config.clone(),
            output_format,
            output,
        })
    }
}

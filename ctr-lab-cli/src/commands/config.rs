//! Configuration commands

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::LabConfig;
use crate::context::Context;
use crate::output::{print_field, print_section, TableDisplay};

/// Configuration inspection commands
#[derive(Debug, Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration after file and environment layers
    Show,

    /// Show the configuration file path
    Path,
}

pub fn execute(ctx: &Context, cmd: ConfigCommands) -> Result<()> {
    match cmd.command {
        ConfigSubcommand::Show => ctx.output.write(&ctx.config),
        ConfigSubcommand::Path => show_path(ctx),
    }
}

fn show_path(ctx: &Context) -> Result<()> {
    let path = match &ctx.config_path {
        Some(path) => path.clone(),
        None => LabConfig::config_path()?,
    };
    ctx.output.line(&path.display().to_string());
    Ok(())
}

impl TableDisplay for LabConfig {
    fn display_single(&self) {
        let sim = &self.simulation;
        print_section("Simulation");
        print_field("base_ctr", &sim.base_ctr.to_string());
        print_field("uplift", &sim.uplift.to_string());
        print_field("convention", &sim.convention.to_string());
        print_field("ctr_beta", &sim.ctr_beta.to_string());
        print_field("skew", &sim.skew.to_string());
        print_field("users_per_group", &sim.users_per_group.to_string());
        print_field("trials", &sim.trials.to_string());
        print_field(
            "seed",
            &sim.seed.map_or_else(|| "random".to_string(), |s| s.to_string()),
        );

        print_section("Design");
        print_field("alpha", &self.design.alpha.to_string());
        print_field("beta", &self.design.beta.to_string());
        print_field("mde", &self.design.mde.to_string());

        print_section("Bootstrap");
        print_field("resamples", &self.bootstrap.resamples.to_string());

        print_section("Output");
        print_field("format", &self.output.format.to_string());
        print_field("no_color", &self.output.no_color.to_string());
        print_field("histogram_bins", &self.output.histogram_bins.to_string());
    }

    fn display_compact(&self) {
        let sim = &self.simulation;
        println!(
            "base_ctr={} uplift={} ctr_beta={} skew={} users={} trials={} alpha={} beta={} mde={}",
            sim.base_ctr,
            sim.uplift,
            sim.ctr_beta,
            sim.skew,
            sim.users_per_group,
            sim.trials,
            self.design.alpha,
            self.design.beta,
            self.design.mde
        );
    }
}

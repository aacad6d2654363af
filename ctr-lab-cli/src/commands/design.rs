//! Stand-alone sample size calculation

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use ctr_lab_core::{DesignRequest, EffectConvention};
use ctr_lab_metrics::ExperimentDesigner;
use serde::Serialize;

use super::ConventionArg;
use crate::context::Context;
use crate::output::{format_percent, print_field, print_section, TableDisplay};

#[derive(Debug, Args)]
pub struct DesignArgs {
    /// Baseline CTR of the control group [default: simulation.base_ctr]
    #[arg(short, long)]
    pub baseline: Option<f64>,

    /// Minimum detectable effect [default: design.mde]
    #[arg(short, long)]
    pub mde: Option<f64>,

    /// Significance level [default: design.alpha]
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Type II error rate [default: design.beta]
    #[arg(long)]
    pub beta: Option<f64>,

    /// How the effect moves the baseline [default: simulation.convention]
    #[arg(long, value_enum)]
    pub convention: Option<ConventionArg>,

    /// Expected views per user, to translate views into users
    #[arg(long)]
    pub views_per_user: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DesignReport {
    pub baseline: f64,
    pub treatment_rate: f64,
    pub mde: f64,
    pub convention: EffectConvention,
    pub alpha: f64,
    pub beta: f64,
    pub power: f64,
    pub views_per_group: u64,
    pub total_views: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_per_group: Option<u64>,
}

impl DesignReport {
    pub fn compute(request: &DesignRequest, views_per_user: Option<f64>) -> Result<Self> {
        let views_per_group = ExperimentDesigner::binomial_sample_size(request)?;
        let users_per_group = match views_per_user {
            Some(rate) if rate > 0.0 => Some((views_per_group as f64 / rate).ceil() as u64),
            Some(rate) => anyhow::bail!("views per user must be positive, got {rate}"),
            None => None,
        };

        Ok(Self {
            baseline: request.baseline,
            treatment_rate: request.treatment_rate(),
            mde: request.mde,
            convention: request.convention,
            alpha: request.alpha,
            beta: request.beta,
            power: request.power(),
            views_per_group,
            total_views: views_per_group.saturating_mul(2),
            users_per_group,
        })
    }
}

impl TableDisplay for DesignReport {
    fn display_single(&self) {
        print_section("Experiment Design");
        print_field("Baseline CTR", &format!("{:.4}", self.baseline));
        print_field(
            "Treatment CTR",
            &format!("{:.4} ({} mde {})", self.treatment_rate, self.convention, self.mde),
        );
        print_field("Alpha", &self.alpha.to_string());
        print_field("Power", &format_percent(self.power));
        print_field("Views per group", &self.views_per_group.to_string().green().bold().to_string());
        print_field("Total views", &self.total_views.to_string());
        if let Some(users) = self.users_per_group {
            print_field("Users per group", &users.to_string());
        }
    }

    fn display_compact(&self) {
        println!(
            "baseline={} treatment={:.6} alpha={} beta={} views_per_group={}",
            self.baseline, self.treatment_rate, self.alpha, self.beta, self.views_per_group
        );
    }
}

pub fn execute(ctx: &Context, args: DesignArgs) -> Result<()> {
    let defaults = &ctx.config;
    let convention = args
        .convention
        .map(EffectConvention::from)
        .unwrap_or(defaults.simulation.convention);

    let request = DesignRequest::with_convention(
        args.mde.unwrap_or(defaults.design.mde),
        args.baseline.unwrap_or(defaults.simulation.base_ctr),
        args.alpha.unwrap_or(defaults.design.alpha),
        args.beta.unwrap_or(defaults.design.beta),
        convention,
    )
    .context("Invalid design parameters")?;

    let report = DesignReport::compute(&request, args.views_per_user)?;
    tracing::debug!(views_per_group = report.views_per_group, "design computed");
    ctx.output.write(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_translates_views_to_users() {
        let request = DesignRequest::new(0.5, 0.1, 0.05, 0.2).unwrap();

        let report = DesignReport::compute(&request, Some(4.0)).unwrap();

        assert_eq!(report.views_per_group, 683);
        assert_eq!(report.total_views, 1366);
        assert_eq!(report.users_per_group, Some(171));
        assert!((report.treatment_rate - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_report_rejects_non_positive_views_per_user() {
        let request = DesignRequest::new(0.5, 0.1, 0.05, 0.2).unwrap();
        assert!(DesignReport::compute(&request, Some(0.0)).is_err());
    }
}

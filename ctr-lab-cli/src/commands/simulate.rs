//! A/A + A/B simulation run
//!
//! Both batches share every generator parameter except the uplift. The A/A
//! batch measures each test's false positive rate, the A/B batch its power.

use anyhow::{Context as _, Result};
use clap::Args;
use comfy_table::Cell;
use ctr_lab_core::{DesignRequest, ExperimentBatch, GeneratorConfig, Group};
use ctr_lab_metrics::{default_battery, BootstrapCtr, Histogram, MetricAggregator, TestResults, TestRunner};
use ctr_lab_simulator::AbTestGenerator;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

use super::design::DesignReport;
use super::ConventionArg;
use crate::config::LabConfig;
use crate::context::Context;
use crate::output::{fpr_badge, power_badge, print_field, print_section, sparkline, table, TableDisplay};

#[derive(Debug, Default, Args)]
pub struct SimulateArgs {
    /// Control group CTR
    #[arg(long)]
    pub base_ctr: Option<f64>,

    /// Treatment effect of the A/B batch
    #[arg(short, long)]
    pub uplift: Option<f64>,

    /// Second Beta shape of per-user CTRs; larger means less dispersion
    #[arg(long)]
    pub ctr_beta: Option<f64>,

    /// Log-normal scale of views per user, at most 4
    #[arg(long)]
    pub skew: Option<f64>,

    #[arg(long, value_enum)]
    pub convention: Option<ConventionArg>,

    /// Users per group in every trial
    #[arg(short = 'n', long)]
    pub users: Option<usize>,

    /// Trials per batch
    #[arg(short, long)]
    pub trials: Option<usize>,

    #[arg(short, long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub alpha: Option<f64>,

    #[arg(long)]
    pub beta: Option<f64>,

    /// Minimum detectable effect used for the design
    #[arg(long)]
    pub mde: Option<f64>,

    /// Bootstrap resamples per trial
    #[arg(long)]
    pub resamples: Option<usize>,

    /// Include p-value and view histograms
    #[arg(long)]
    pub histograms: bool,

    /// Bins per histogram
    #[arg(long)]
    pub bins: Option<usize>,
}

impl SimulateArgs {
    /// Flags take precedence over file and environment settings.
    pub fn apply(&self, config: &mut LabConfig) {
        let sim = &mut config.simulation;
        if let Some(v) = self.base_ctr {
            sim.base_ctr = v;
        }
        if let Some(v) = self.uplift {
            sim.uplift = v;
        }
        if let Some(v) = self.ctr_beta {
            sim.ctr_beta = v;
        }
        if let Some(v) = self.skew {
            sim.skew = v;
        }
        if let Some(v) = self.convention {
            sim.convention = v.into();
        }
        if let Some(v) = self.users {
            sim.users_per_group = v;
        }
        if let Some(v) = self.trials {
            sim.trials = v;
        }
        if self.seed.is_some() {
            sim.seed = self.seed;
        }

        let design = &mut config.design;
        if let Some(v) = self.alpha {
            design.alpha = v;
        }
        if let Some(v) = self.beta {
            design.beta = v;
        }
        if let Some(v) = self.mde {
            design.mde = v;
        }

        if let Some(v) = self.resamples {
            config.bootstrap.resamples = v;
        }
        if let Some(v) = self.bins {
            config.output.histogram_bins = v;
        }
    }
}

// ===== Report =====

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub settings: RunSettings,
    pub ground_truth: GroundTruth,
    pub design: DesignReport,
    /// Highest power first.
    pub tests: Vec<TestSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histograms: Option<Histograms>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSettings {
    pub generator: GeneratorConfig,
    pub users_per_group: usize,
    pub trials: usize,
    pub seed: u64,
    pub alpha: f64,
    pub bootstrap_resamples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroundTruth {
    pub aa: BatchSummary,
    pub ab: BatchSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub control: GroupSummary,
    pub treatment: GroupSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    /// Mean over trials of total clicks / total views.
    pub mean_ctr: f64,
    /// Mean of the latent per-user rates.
    pub mean_true_ctr: f64,
    pub mean_views_per_user: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub name: String,
    /// Rejection rate on the A/A batch.
    pub false_positive_rate: f64,
    /// Rejection rate on the A/B batch.
    pub power: f64,
    /// Distance of the A/A p-values from uniform.
    pub calibration_gap: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Histograms {
    pub p_values: Vec<PValueHistograms>,
    /// Views per user of the A/A control group, all trials pooled.
    pub views: Histogram,
}

#[derive(Debug, Clone, Serialize)]
pub struct PValueHistograms {
    pub name: String,
    pub aa: Histogram,
    pub ab: Histogram,
}

impl BatchSummary {
    fn of(batch: &ExperimentBatch) -> Self {
        Self {
            control: GroupSummary::of(batch, Group::Control),
            treatment: GroupSummary::of(batch, Group::Treatment),
        }
    }
}

impl GroupSummary {
    fn of(batch: &ExperimentBatch, group: Group) -> Self {
        let true_ctrs: Vec<f64> = batch.true_ctrs(group).into_iter().flatten().copied().collect();
        let views: Vec<f64> = batch.trials().iter().map(|t| t.group(group).mean_views()).collect();
        Self {
            mean_ctr: batch.mean_ctr(group),
            mean_true_ctr: MetricAggregator::mean(&true_ctrs),
            mean_views_per_user: MetricAggregator::mean(&views),
        }
    }
}

impl SimulationReport {
    pub fn build(
        settings: RunSettings,
        aa: (&ExperimentBatch, &TestResults),
        ab: (&ExperimentBatch, &TestResults),
        design: DesignReport,
        histogram_bins: Option<usize>,
    ) -> Result<Self> {
        let (aa_batch, aa_results) = aa;
        let (ab_batch, ab_results) = ab;
        let alpha = settings.alpha;

        let mut tests = Vec::with_capacity(ab_results.len());
        for (name, power) in ab_results.power_ranking(alpha) {
            let null = aa_results
                .get(&name)
                .with_context(|| format!("no A/A results for '{name}'"))?;
            tests.push(TestSummary {
                false_positive_rate: null.power(alpha),
                power,
                calibration_gap: null.calibration_gap()?,
                name,
            });
        }

        let histograms = match histogram_bins {
            Some(bins) => {
                let mut p_values = Vec::with_capacity(tests.len());
                for entry in aa_results.iter() {
                    let alternative = ab_results
                        .get(entry.name())
                        .with_context(|| format!("no A/B results for '{}'", entry.name()))?;
                    p_values.push(PValueHistograms {
                        name: entry.name().to_string(),
                        aa: entry.histogram(bins),
                        ab: alternative.histogram(bins),
                    });
                }
                let views: Vec<f64> = aa_batch
                    .views(Group::Control)
                    .into_iter()
                    .flatten()
                    .map(|&v| v as f64)
                    .collect();
                Some(Histograms {
                    p_values,
                    views: MetricAggregator::histogram(&views, bins),
                })
            }
            None => None,
        };

        Ok(Self {
            settings,
            ground_truth: GroundTruth {
                aa: BatchSummary::of(aa_batch),
                ab: BatchSummary::of(ab_batch),
            },
            design,
            tests,
            histograms,
        })
    }
}

impl TableDisplay for SimulationReport {
    fn display_single(&self) {
        let s = &self.settings;
        print_section("Simulation");
        print_field(
            "Generator",
            &format!(
                "base CTR {} | uplift {} ({}) | ctr_beta {} | skew {}",
                s.generator.base_ctr, s.generator.uplift, s.generator.convention, s.generator.ctr_beta, s.generator.skew
            ),
        );
        print_field("Users per group", &s.users_per_group.to_string());
        print_field("Trials", &s.trials.to_string());
        print_field("Seed", &s.seed.to_string());

        print_section("Ground Truth");
        let truth_row = |batch: &str, group: &str, summary: &GroupSummary| {
            vec![
                Cell::new(batch),
                Cell::new(group),
                Cell::new(format!("{:.5}", summary.mean_ctr)),
                Cell::new(format!("{:.5}", summary.mean_true_ctr)),
                Cell::new(format!("{:.2}", summary.mean_views_per_user)),
            ]
        };
        let truth = &self.ground_truth;
        println!(
            "{}",
            table(
                &["Batch", "Group", "Mean CTR", "Mean latent CTR", "Views / user"],
                vec![
                    truth_row("A/A", "control", &truth.aa.control),
                    truth_row("A/A", "treatment", &truth.aa.treatment),
                    truth_row("A/B", "control", &truth.ab.control),
                    truth_row("A/B", "treatment", &truth.ab.treatment),
                ],
            )
        );

        self.design.display_single();

        print_section("Tests");
        let target = self.design.power;
        let rows = self
            .tests
            .iter()
            .enumerate()
            .map(|(rank, t)| {
                vec![
                    Cell::new(rank + 1),
                    Cell::new(&t.name),
                    fpr_badge(t.false_positive_rate, s.alpha),
                    power_badge(t.power, target),
                    Cell::new(format!("{:.3}", t.calibration_gap)),
                ]
            })
            .collect();
        println!(
            "{}",
            table(&["#", "Test", "False positives (A/A)", "Power (A/B)", "Calibration gap"], rows)
        );

        if let Some(histograms) = &self.histograms {
            print_section("p-value Histograms");
            let rows = histograms
                .p_values
                .iter()
                .map(|h| vec![Cell::new(&h.name), Cell::new(sparkline(&h.aa)), Cell::new(sparkline(&h.ab))])
                .collect();
            println!("{}", table(&["Test", "A/A", "A/B"], rows));
            print_field("Views per user", &sparkline(&histograms.views));
        }
    }

    fn display_compact(&self) {
        for t in &self.tests {
            println!(
                "{}\tfpr={:.4}\tpower={:.4}\tgap={:.4}",
                t.name, t.false_positive_rate, t.power, t.calibration_gap
            );
        }
    }
}

// ===== Execution =====

pub fn execute(ctx: &Context, args: SimulateArgs) -> Result<()> {
    let mut config = ctx.config.clone();
    args.apply(&mut config);
    validator::Validate::validate(&config).context("Invalid simulation settings")?;

    let spinner = ctx.output.spinner("Simulating A/A and A/B experiments...");
    let report = run(&config, args.histograms);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = report?;

    if let Some(needed) = report.design.users_per_group {
        if (report.settings.users_per_group as u64) < needed {
            ctx.output.warning(&format!(
                "{} users per group is below the {} the design needs for {:.0}% power",
                report.settings.users_per_group,
                needed,
                report.design.power * 100.0
            ));
        }
    }

    ctx.output.write(&report)
}

/// Generate both batches, design from the A/A pilot and run the battery.
#[instrument(skip_all, fields(trials = config.simulation.trials, users = config.simulation.users_per_group))]
pub fn run(config: &LabConfig, with_histograms: bool) -> Result<SimulationReport> {
    let started = Instant::now();
    let sim = &config.simulation;
    let seed = sim.seed.unwrap_or_else(rand::random);

    let generator_config = sim.generator_config().context("Invalid generator parameters")?;
    let aa_generator = AbTestGenerator::new(generator_config.null())?;
    let ab_generator = AbTestGenerator::new(generator_config.clone())?;

    let aa_batch = aa_generator.generate_batch(sim.users_per_group, sim.trials, seed)?;
    // Offset by the trial count so the A/B trials never reuse an A/A stream.
    let ab_batch = ab_generator.generate_batch(sim.users_per_group, sim.trials, seed.wrapping_add(sim.trials as u64))?;

    // The design only sees what an analyst would: the first A/A control group.
    let pilot = &aa_batch.trial(0).context("A/A batch has no trials")?.control;
    let estimated_baseline = pilot.aggregate_ctr();
    info!(estimated_baseline, "baseline estimated from A/A pilot");

    let request = DesignRequest::with_convention(
        config.design.mde,
        estimated_baseline,
        config.design.alpha,
        config.design.beta,
        generator_config.convention,
    )
    .with_context(|| format!("Cannot design from estimated baseline CTR {estimated_baseline}"))?;
    let design = DesignReport::compute(&request, Some(pilot.mean_views()))?;

    let bootstrap = BootstrapCtr::new(config.bootstrap.resamples, seed)?;
    let runner = TestRunner::new(default_battery(bootstrap))?;
    let aa_results = runner.run(&aa_batch).context("A/A evaluation failed")?;
    let ab_results = runner.run(&ab_batch).context("A/B evaluation failed")?;

    let settings = RunSettings {
        generator: generator_config,
        users_per_group: sim.users_per_group,
        trials: sim.trials,
        seed,
        alpha: config.design.alpha,
        bootstrap_resamples: config.bootstrap.resamples,
    };
    let bins = with_histograms.then_some(config.output.histogram_bins);
    let report = SimulationReport::build(
        settings,
        (&aa_batch, &aa_results),
        (&ab_batch, &ab_results),
        design,
        bins,
    )?;

    info!(elapsed_ms = started.elapsed().as_millis() as u64, "simulation finished");
    Ok(report)
}

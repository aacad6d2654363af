//! Synthetic CTR experiment generation.
//!
//! Every user gets a view count from a log-normal distribution and a latent
//! click probability from a Beta distribution centred on the group rate; the
//! observed clicks are then Binomial(views, rate).

use ctr_lab_core::{ExperimentBatch, GeneratorConfig, GroupSample, LabError, Result, Trial};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Binomial, Distribution, LogNormal};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, instrument};
use validator::Validate;

/// Location of the log-normal view distribution (in log-space).
pub const VIEWS_LOG_MEAN: f64 = 1.0;

/// Per-group sampling model, built once per generator.
#[derive(Debug, Clone)]
struct GroupModel {
    rate: f64,
    views: LogNormal<f64>,
    latent_ctr: Beta<f64>,
}

impl GroupModel {
    fn new(rate: f64, ctr_beta: f64, skew: f64) -> Result<Self> {
        let views = LogNormal::new(VIEWS_LOG_MEAN, skew)
            .map_err(|e| LabError::invalid(format!("views distribution: {e}")))?;
        // a / (a + b) == rate
        let alpha = ctr_beta * rate / (1.0 - rate);
        let latent_ctr = Beta::new(alpha, ctr_beta)
            .map_err(|e| LabError::invalid(format!("CTR distribution: {e}")))?;
        Ok(Self {
            rate,
            views,
            latent_ctr,
        })
    }

    fn sample<R: Rng + ?Sized>(&self, users: usize, rng: &mut R) -> Result<GroupSample> {
        let mut views = Vec::with_capacity(users);
        let mut clicks = Vec::with_capacity(users);
        let mut true_ctrs = Vec::with_capacity(users);

        for _ in 0..users {
            // `as` saturates on huge draws; at least one view per user.
            let user_views = (self.views.sample(rng).floor() as u64).saturating_add(1);
            let user_ctr = self.latent_ctr.sample(rng);
            let user_clicks = Binomial::new(user_views, user_ctr)
                .map_err(|e| LabError::invalid(format!("click distribution: {e}")))?
                .sample(rng);

            views.push(user_views);
            clicks.push(user_clicks);
            true_ctrs.push(user_ctr);
        }

        Ok(GroupSample::new(views, clicks).with_true_ctrs(true_ctrs))
    }
}

/// Generator of synthetic A/B (or A/A, with zero uplift) CTR experiments.
#[derive(Debug, Clone)]
pub struct AbTestGenerator {
    config: GeneratorConfig,
    control: GroupModel,
    treatment: GroupModel,
}

impl AbTestGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let control = GroupModel::new(config.base_ctr, config.ctr_beta, config.skew)?;
        let treatment = GroupModel::new(config.treatment_ctr(), config.ctr_beta, config.skew)?;
        Ok(Self {
            config,
            control,
            treatment,
        })
    }

    /// Relative-uplift generator from raw parameters.
    pub fn from_params(base_ctr: f64, uplift: f64, ctr_beta: f64, skew: f64) -> Result<Self> {
        Self::new(GeneratorConfig::new(base_ctr, uplift, ctr_beta, skew)?)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// True mean CTR of the control and treatment groups.
    pub fn group_rates(&self) -> (f64, f64) {
        (self.control.rate, self.treatment.rate)
    }

    /// One experiment with `users` users per group, drawn from `rng`.
    pub fn generate_experiment<R: Rng + ?Sized>(&self, users: usize, rng: &mut R) -> Result<Trial> {
        if users == 0 {
            return Err(LabError::invalid("users per group must be positive"));
        }
        let control = self.control.sample(users, rng)?;
        let treatment = self.treatment.sample(users, rng)?;
        Ok(Trial::new(control, treatment))
    }

    /// `trials` independent experiments of `users` users per group.
    ///
    /// Trial `i` draws from its own `StdRng` seeded with `seed + i`
    /// (wrapping), so the batch is reproducible and independent of how the
    /// trials are scheduled across threads.
    #[instrument(skip(self), fields(base_ctr = self.config.base_ctr, uplift = self.config.uplift))]
    pub fn generate_batch(&self, users: usize, trials: usize, seed: u64) -> Result<ExperimentBatch> {
        if users == 0 {
            return Err(LabError::invalid("users per group must be positive"));
        }
        if trials == 0 {
            return Err(LabError::invalid("number of trials must be positive"));
        }

        let started = Instant::now();
        let generated: Vec<Trial> = (0..trials)
            .into_par_iter()
            .map(|index| {
                let trial_seed = trial_seed(seed, index);
                let mut rng = StdRng::seed_from_u64(trial_seed);
                self.generate_experiment(users, &mut rng)
                    .map(|trial| trial.with_origin(index, trial_seed))
            })
            .collect::<Vec<Result<Trial>>>()
            .into_iter()
            .collect::<Result<Vec<Trial>>>()?;

        let batch = ExperimentBatch::new(self.config.clone(), users, seed, generated);
        debug!(
            control_ctr = batch.mean_ctr(ctr_lab_core::Group::Control),
            treatment_ctr = batch.mean_ctr(ctr_lab_core::Group::Treatment),
            "batch ground truth"
        );
        info!(
            trials,
            users,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated experiment batch"
        );
        Ok(batch)
    }
}

/// Seed of the random stream used for trial `index` of a batch.
pub fn trial_seed(batch_seed: u64, index: usize) -> u64 {
    batch_seed.wrapping_add(index as u64)
}

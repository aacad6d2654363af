use serde::{Deserialize, Serialize};

use super::config::GeneratorConfig;
use super::sample::{Group, Trial};

/// N independent trials generated from one configuration.
///
/// Produced once by the generator and read-only afterwards. The accessors
/// expose the per-group, per-trial views of the batch that downstream
/// consumers plot: `views(Control)` is `views_0`, `ctrs(Treatment)` is
/// `ctrs_1`, and so on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentBatch {
    config: GeneratorConfig,
    users_per_group: usize,
    seed: u64,
    trials: Vec<Trial>,
}

impl ExperimentBatch {
    pub fn new(config: GeneratorConfig, users_per_group: usize, seed: u64, trials: Vec<Trial>) -> Self {
        Self {
            config,
            users_per_group,
            seed,
            trials,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn users_per_group(&self) -> usize {
        self.users_per_group
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn trial(&self, index: usize) -> Option<&Trial> {
        self.trials.get(index)
    }

    /// Number of trials.
    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn views(&self, group: Group) -> Vec<&[u64]> {
        self.trials.iter().map(|t| t.group(group).views()).collect()
    }

    pub fn clicks(&self, group: Group) -> Vec<&[u64]> {
        self.trials.iter().map(|t| t.group(group).clicks()).collect()
    }

    /// Observed per-user CTR arrays, one per trial.
    pub fn user_ctrs(&self, group: Group) -> Vec<Vec<f64>> {
        self.trials.iter().map(|t| t.group(group).user_ctrs()).collect()
    }

    /// Latent per-user click probabilities, one array per trial.
    pub fn true_ctrs(&self, group: Group) -> Vec<&[f64]> {
        self.trials.iter().map(|t| t.group(group).true_ctrs()).collect()
    }

    /// Aggregate CTR (total clicks / total views) of every trial.
    pub fn ctrs(&self, group: Group) -> Vec<f64> {
        self.trials.iter().map(|t| t.group(group).aggregate_ctr()).collect()
    }

    /// Mean of the per-trial aggregate CTRs; 0 for an empty batch.
    pub fn mean_ctr(&self, group: Group) -> f64 {
        if self.trials.is_empty() {
            return 0.0;
        }
        self.ctrs(group).iter().sum::<f64>() / self.trials.len() as f64
    }
}

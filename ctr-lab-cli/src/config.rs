//! Layered configuration: built-in defaults, then an optional file, then
//! `CTR_LAB__SECTION__KEY` environment variables. Command-line flags are
//! applied on top by the individual commands.

use anyhow::{Context as _, Result};
use config::{Config as ConfigLoader, Environment, File};
use ctr_lab_core::{EffectConvention, GeneratorConfig};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::output::OutputFormat;

pub const ENV_PREFIX: &str = "CTR_LAB";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LabConfig {
    #[validate(nested)]
    pub simulation: SimulationSettings,

    #[validate(nested)]
    pub design: DesignSettings,

    #[validate(nested)]
    pub bootstrap: BootstrapSettings,

    #[validate(nested)]
    pub output: OutputSettings,
}

/// Generator parameters and run size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationSettings {
    pub base_ctr: f64,
    pub uplift: f64,
    pub ctr_beta: f64,
    pub skew: f64,
    pub convention: EffectConvention,

    #[validate(range(min = 1))]
    pub users_per_group: usize,

    #[validate(range(min = 1))]
    pub trials: usize,

    /// Unset means a fresh random seed per run.
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            base_ctr: 0.02,
            uplift: 0.2,
            ctr_beta: 1000.0,
            skew: 0.6,
            convention: EffectConvention::Relative,
            users_per_group: 1000,
            trials: 500,
            seed: None,
        }
    }
}

impl SimulationSettings {
    pub fn generator_config(&self) -> ctr_lab_core::Result<GeneratorConfig> {
        GeneratorConfig::with_convention(self.base_ctr, self.uplift, self.ctr_beta, self.skew, self.convention)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DesignSettings {
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub alpha: f64,

    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub beta: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub mde: f64,
}

impl Default for DesignSettings {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            beta: 0.2,
            mde: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BootstrapSettings {
    #[validate(range(min = 1))]
    pub resamples: usize,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            resamples: ctr_lab_metrics::DEFAULT_BOOTSTRAP_RESAMPLES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub no_color: bool,

    #[validate(range(min = 1, max = 200))]
    pub histogram_bins: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            no_color: false,
            histogram_bins: 20,
        }
    }
}

impl LabConfig {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::config_path() {
                Ok(path) => (path, false),
                Err(_) => return Self::load_sources(None, false),
            },
        };
        Self::load_sources(Some(&file), required)
    }

    fn load_sources(file: Option<&Path>, required: bool) -> Result<Self> {
        let mut builder = ConfigLoader::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(required));
        }
        let loaded = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        let config: LabConfig = loaded
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "ctr-lab", "ctr-lab").context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LabConfig::default();

        assert_eq!(config.simulation.base_ctr, 0.02);
        assert_eq!(config.simulation.users_per_group, 1000);
        assert_eq!(config.simulation.trials, 500);
        assert_eq!(config.design.mde, config.simulation.uplift);
        assert_eq!(config.bootstrap.resamples, 1000);
        assert_eq!(config.output.histogram_bins, 20);
        assert!(config.validate().is_ok());
        assert!(config.simulation.generator_config().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[simulation]\nbase_ctr = 0.05\ntrials = 40\n\n[design]\nalpha = 0.01").unwrap();

        let config = LabConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.simulation.base_ctr, 0.05);
        assert_eq!(config.simulation.trials, 40);
        assert_eq!(config.simulation.skew, 0.6);
        assert_eq!(config.design.alpha, 0.01);
        assert_eq!(config.design.beta, 0.2);
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[simulation]\ntrials = 0").unwrap();

        assert!(LabConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        assert!(LabConfig::load(Some(&missing)).is_err());
    }
}

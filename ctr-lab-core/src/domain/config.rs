use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::error::Result;

// ===== Effect Convention =====

/// How an uplift or minimum detectable effect moves the baseline rate.
///
/// The generator and the designer must agree on this, otherwise power
/// estimates are computed against a different effect than the one simulated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EffectConvention {
    /// `p1 = p0 * (1 + effect)`
    #[default]
    Relative,
    /// `p1 = p0 + effect`
    Absolute,
}

impl EffectConvention {
    pub fn treatment_rate(&self, baseline: f64, effect: f64) -> f64 {
        match self {
            EffectConvention::Relative => baseline * (1.0 + effect),
            EffectConvention::Absolute => baseline + effect,
        }
    }
}

impl std::fmt::Display for EffectConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relative => write!(f, "relative"),
            Self::Absolute => write!(f, "absolute"),
        }
    }
}

fn rate_error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::from(message));
    err
}

fn check_open_unit(code: &'static str, name: &str, value: f64) -> std::result::Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(rate_error(code, format!("{name} must lie in (0, 1), got {value}")))
    }
}

// ===== Generator Configuration =====

/// Largest accepted view-count skew. Beyond it single log-normal draws reach
/// the limits of a `u64` view count.
pub const MAX_SKEW: f64 = 4.0;

/// Parameters of a synthetic two-group CTR experiment.
///
/// `ctr_beta` is the second shape parameter of the per-user Beta rate
/// distribution; the first is derived so that the mean equals the group rate.
/// `skew` is the scale of the log-normal view-count distribution, at most
/// [`MAX_SKEW`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[validate(schema(function = "validate_generator_config"))]
pub struct GeneratorConfig {
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub base_ctr: f64,

    #[validate(range(min = 0.0))]
    pub uplift: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub ctr_beta: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub skew: f64,

    #[serde(default)]
    pub convention: EffectConvention,
}

fn validate_generator_config(config: &GeneratorConfig) -> std::result::Result<(), ValidationError> {
    for (name, value) in [
        ("uplift", config.uplift),
        ("ctr_beta", config.ctr_beta),
        ("skew", config.skew),
    ] {
        if !value.is_finite() {
            return Err(rate_error("not_finite", format!("{name} must be finite, got {value}")));
        }
    }
    if config.skew > MAX_SKEW {
        return Err(rate_error(
            "skew",
            format!("skew must be at most {MAX_SKEW}, got {}", config.skew),
        ));
    }
    check_open_unit("base_ctr", "base_ctr", config.base_ctr)?;
    check_open_unit("treatment_ctr", "treatment CTR", config.treatment_ctr())
}

impl GeneratorConfig {
    /// Build a validated configuration using the relative effect convention.
    pub fn new(base_ctr: f64, uplift: f64, ctr_beta: f64, skew: f64) -> Result<Self> {
        Self::with_convention(base_ctr, uplift, ctr_beta, skew, EffectConvention::default())
    }

    pub fn with_convention(
        base_ctr: f64,
        uplift: f64,
        ctr_beta: f64,
        skew: f64,
        convention: EffectConvention,
    ) -> Result<Self> {
        let config = Self {
            base_ctr,
            uplift,
            ctr_beta,
            skew,
            convention,
        };
        config.validate()?;
        Ok(config)
    }

    /// Same parameters with the uplift removed, for A/A simulation.
    pub fn null(&self) -> Self {
        Self {
            uplift: 0.0,
            ..self.clone()
        }
    }

    pub fn treatment_ctr(&self) -> f64 {
        self.convention.treatment_rate(self.base_ctr, self.uplift)
    }

    pub fn is_null(&self) -> bool {
        self.uplift == 0.0
    }
}

// ===== Design Request =====

/// Inputs of the two-proportion sample size calculation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[validate(schema(function = "validate_design_request"))]
pub struct DesignRequest {
    #[validate(range(exclusive_min = 0.0))]
    pub mde: f64,

    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub baseline: f64,

    /// Type I error rate.
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub alpha: f64,

    /// Type II error rate, below `1 - alpha / 2`.
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub beta: f64,

    #[serde(default)]
    pub convention: EffectConvention,
}

fn validate_design_request(request: &DesignRequest) -> std::result::Result<(), ValidationError> {
    if !(request.mde.is_finite() && request.mde > 0.0) {
        return Err(rate_error("mde", format!("mde must be positive, got {}", request.mde)));
    }
    check_open_unit("baseline", "baseline", request.baseline)?;
    check_open_unit("alpha", "alpha", request.alpha)?;
    check_open_unit("beta", "beta", request.beta)?;
    // Keeps z(1 - alpha/2) + z(1 - beta) positive so the size falls as beta grows.
    let beta_limit = 1.0 - request.alpha / 2.0;
    if request.beta >= beta_limit {
        return Err(rate_error(
            "beta",
            format!("beta must be below 1 - alpha/2 = {beta_limit}, got {}", request.beta),
        ));
    }
    check_open_unit("treatment_rate", "baseline shifted by mde", request.treatment_rate())
}

impl DesignRequest {
    pub fn new(mde: f64, baseline: f64, alpha: f64, beta: f64) -> Result<Self> {
        Self::with_convention(mde, baseline, alpha, beta, EffectConvention::default())
    }

    pub fn with_convention(
        mde: f64,
        baseline: f64,
        alpha: f64,
        beta: f64,
        convention: EffectConvention,
    ) -> Result<Self> {
        let request = Self {
            mde,
            baseline,
            alpha,
            beta,
            convention,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn treatment_rate(&self) -> f64 {
        self.convention.treatment_rate(self.baseline, self.mde)
    }

    pub fn power(&self) -> f64 {
        1.0 - self.beta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_and_absolute_conventions_differ() {
        assert!((EffectConvention::Relative.treatment_rate(0.02, 0.2) - 0.024).abs() < 1e-12);
        assert!((EffectConvention::Absolute.treatment_rate(0.02, 0.2) - 0.22).abs() < 1e-12);
    }

    #[test]
    fn generator_rejects_nan_uplift() {
        assert!(GeneratorConfig::new(0.02, f64::NAN, 1000.0, 0.6).is_err());
    }

    #[test]
    fn null_config_drops_uplift_only() {
        let config = GeneratorConfig::new(0.02, 0.3, 500.0, 1.2).unwrap();
        let null = config.null();
        assert!(null.is_null());
        assert_eq!(null.ctr_beta, 500.0);
        assert_eq!(null.treatment_ctr(), 0.02);
    }
}

use ctr_lab_core::{DesignRequest, EffectConvention, Result};
use tracing::debug;
use validator::Validate;

use crate::statistical::StatisticalAnalyzer;

pub struct ExperimentDesigner;

impl ExperimentDesigner {
    /// Minimum number of views per group for a two-proportion test.
    ///
    /// `n = (z(1 - alpha/2) + z(1 - beta))^2 * (p0 q0 + p1 q1) / (p1 - p0)^2`,
    /// rounded up, where `p1` applies the request's effect convention.
    pub fn binomial_sample_size(request: &DesignRequest) -> Result<u64> {
        request.validate()?;

        let p0 = request.baseline;
        let p1 = request.treatment_rate();
        let z_alpha = StatisticalAnalyzer::normal_quantile(1.0 - request.alpha / 2.0);
        let z_beta = StatisticalAnalyzer::normal_quantile(1.0 - request.beta);

        let variance = p0 * (1.0 - p0) + p1 * (1.0 - p1);
        let n = (z_alpha + z_beta).powi(2) * variance / (p1 - p0).powi(2);
        let size = n.ceil().max(1.0) as u64;

        debug!(p0, p1, z_alpha, z_beta, size, "designed binomial experiment");
        Ok(size)
    }
}

/// Relative-effect sample size from raw parameters.
pub fn design_binomial_experiment(mde: f64, p_0: f64, alpha: f64, beta: f64) -> Result<u64> {
    let request = DesignRequest::with_convention(mde, p_0, alpha, beta, EffectConvention::Relative)?;
    ExperimentDesigner::binomial_sample_size(&request)
}

use ctr_lab_core::{LabError, Result};
use serde::{Deserialize, Serialize};

/// Sorted values paired with their empirical cumulative probabilities.
///
/// The i-th sorted value (1-based) gets probability `i / n`, so the last one
/// is always 1.
pub fn empirical_cdf(values: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if values.is_empty() {
        return Err(LabError::shape("empirical CDF of an empty sequence"));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let probabilities = (1..=sorted.len()).map(|rank| rank as f64 / n).collect();

    Ok((sorted, probabilities))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistogramBin {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub count: usize,
    pub frequency: f64,
    /// Frequency divided by bin width; integrates to 1 over the bins.
    pub density: f64,
}

pub struct MetricAggregator;

impl MetricAggregator {
    /// Share of p-values strictly below `alpha`.
    pub fn power(p_values: &[f64], alpha: f64) -> f64 {
        if p_values.is_empty() {
            return 0.0;
        }
        p_values.iter().filter(|&&p| p < alpha).count() as f64 / p_values.len() as f64
    }

    /// Largest vertical distance between the empirical CDF of `p_values` and
    /// the uniform CDF on [0, 1]. Close to 0 for a calibrated test.
    pub fn calibration_gap(p_values: &[f64]) -> Result<f64> {
        let (sorted, probabilities) = empirical_cdf(p_values)?;
        let n = sorted.len() as f64;

        let gap = sorted
            .iter()
            .zip(&probabilities)
            .map(|(&p, &upper)| {
                let x = p.clamp(0.0, 1.0);
                let lower = upper - 1.0 / n;
                (upper - x).abs().max((x - lower).abs())
            })
            .fold(0.0, f64::max);

        Ok(gap)
    }

    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Generate histogram with specified number of bins over the data range
    pub fn histogram(values: &[f64], num_bins: usize) -> Histogram {
        if values.is_empty() || num_bins == 0 {
            return Histogram {
                bins: vec![],
                total_count: 0,
            };
        }

        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        if min == max {
            return Histogram {
                bins: vec![HistogramBin {
                    lower_bound: min,
                    upper_bound: max,
                    count: values.len(),
                    frequency: 1.0,
                    density: 1.0,
                }],
                total_count: values.len(),
            };
        }

        Self::histogram_range(values, num_bins, min, max)
    }

    /// Histogram with equal-width bins over `[lower, upper]`. Values outside
    /// the range are dropped; the last bin includes `upper`.
    pub fn histogram_range(values: &[f64], num_bins: usize, lower: f64, upper: f64) -> Histogram {
        if values.is_empty() || num_bins == 0 || !(upper > lower) {
            return Histogram {
                bins: vec![],
                total_count: 0,
            };
        }

        let bin_width = (upper - lower) / num_bins as f64;
        let mut bins = vec![0usize; num_bins];
        let mut total = 0usize;

        for &value in values {
            if !(lower..=upper).contains(&value) {
                continue;
            }
            let mut bin_index = ((value - lower) / bin_width).floor() as usize;
            if bin_index >= num_bins {
                bin_index = num_bins - 1;
            }
            bins[bin_index] += 1;
            total += 1;
        }

        let histogram_bins: Vec<HistogramBin> = bins
            .into_iter()
            .enumerate()
            .map(|(i, count)| {
                let lower_bound = lower + (i as f64 * bin_width);
                let upper_bound = lower_bound + bin_width;
                let frequency = if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64
                };
                HistogramBin {
                    lower_bound,
                    upper_bound,
                    count,
                    frequency,
                    density: frequency / bin_width,
                }
            })
            .collect();

        Histogram {
            bins: histogram_bins,
            total_count: total,
        }
    }
}

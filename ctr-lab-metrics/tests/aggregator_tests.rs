use ctr_lab_metrics::aggregators::{empirical_cdf, MetricAggregator};
use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

// ===== Empirical CDF =====

#[test]
fn test_cdf_of_sorted_input() {
    let (x, y) = empirical_cdf(&[0.1, 0.2, 0.3, 0.4]).unwrap();

    assert_eq!(x, vec![0.1, 0.2, 0.3, 0.4]);
    assert_eq!(y, vec![0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn test_cdf_sorts_its_input() {
    let (x, y) = empirical_cdf(&[0.9, 0.05, 0.5]).unwrap();

    assert_eq!(x, vec![0.05, 0.5, 0.9]);
    assert_relative_eq!(y[0], 1.0 / 3.0);
    assert_relative_eq!(y[2], 1.0);
}

#[test]
fn test_cdf_keeps_duplicates() {
    let (x, y) = empirical_cdf(&[1.0, 1.0]).unwrap();

    assert_eq!(x, vec![1.0, 1.0]);
    assert_eq!(y, vec![0.5, 1.0]);
}

#[test]
fn test_cdf_of_empty_sequence_is_error() {
    let err = empirical_cdf(&[]).unwrap_err();
    assert!(err.is_data_shape());
}

proptest! {
    #[test]
    fn prop_cdf_is_sorted_and_ends_at_one(values in prop::collection::vec(0.0f64..1.0, 1..200)) {
        let (x, y) = empirical_cdf(&values).unwrap();

        prop_assert_eq!(x.len(), values.len());
        prop_assert!(x.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(y.windows(2).all(|w| w[0] < w[1]));
        prop_assert!((y[y.len() - 1] - 1.0).abs() < 1e-12);
    }
}

// ===== Power =====

#[rstest]
#[case(&[0.01, 0.04, 0.05, 0.2], 0.05, 0.5)]
#[case(&[0.05, 0.05], 0.05, 0.0)]
#[case(&[0.0, 0.001], 0.05, 1.0)]
#[case(&[], 0.05, 0.0)]
fn test_power_uses_strict_threshold(#[case] p_values: &[f64], #[case] alpha: f64, #[case] expected: f64) {
    assert_eq!(MetricAggregator::power(p_values, alpha), expected);
}

// ===== Calibration =====

#[test]
fn test_calibration_gap_of_uniform_grid() {
    let grid: Vec<f64> = (0..100).map(|i| (i as f64 + 0.5) / 100.0).collect();

    let gap = MetricAggregator::calibration_gap(&grid).unwrap();

    assert_relative_eq!(gap, 0.005, epsilon = 1e-9);
}

#[test]
fn test_calibration_gap_of_point_mass() {
    let gap = MetricAggregator::calibration_gap(&[1.0; 50]).unwrap();
    assert_relative_eq!(gap, 1.0, epsilon = 1e-12);
}

// ===== Histogram =====

#[test]
fn test_histogram_over_data_range() {
    let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];

    let histogram = MetricAggregator::histogram(&values, 2);

    assert_eq!(histogram.total_count, 5);
    assert_eq!(histogram.bins.len(), 2);
    assert_eq!(histogram.bins[0].count, 2);
    assert_eq!(histogram.bins[1].count, 3);
}

#[test]
fn test_histogram_single_value() {
    let histogram = MetricAggregator::histogram(&[7.0, 7.0, 7.0], 4);

    assert_eq!(histogram.bins.len(), 1);
    assert_eq!(histogram.bins[0].count, 3);
    assert_eq!(histogram.bins[0].frequency, 1.0);
}

#[test]
fn test_histogram_range_density_integrates_to_one() {
    let values = vec![0.0, 0.1, 0.15, 0.55, 0.9, 1.0];

    let histogram = MetricAggregator::histogram_range(&values, 4, 0.0, 1.0);

    let counts: Vec<usize> = histogram.bins.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![3, 0, 1, 2]);

    let area: f64 = histogram
        .bins
        .iter()
        .map(|b| b.density * (b.upper_bound - b.lower_bound))
        .sum();
    assert_relative_eq!(area, 1.0, epsilon = 1e-12);
}

#[test]
fn test_histogram_range_drops_out_of_range_values() {
    let histogram = MetricAggregator::histogram_range(&[-0.5, 0.5, 1.5], 2, 0.0, 1.0);

    assert_eq!(histogram.total_count, 1);
    assert_eq!(histogram.bins[1].count, 1);
}

#[rstest]
#[case(0, 0.0, 1.0)]
#[case(3, 1.0, 1.0)]
#[case(3, 1.0, 0.0)]
fn test_histogram_range_empty_cases(#[case] bins: usize, #[case] lower: f64, #[case] upper: f64) {
    let histogram = MetricAggregator::histogram_range(&[0.5], bins, lower, upper);
    assert!(histogram.bins.is_empty());
    assert_eq!(histogram.total_count, 0);
}

#[test]
fn test_mean() {
    assert_eq!(MetricAggregator::mean(&[]), 0.0);
    assert_relative_eq!(MetricAggregator::mean(&[1.0, 2.0, 6.0]), 3.0);
}

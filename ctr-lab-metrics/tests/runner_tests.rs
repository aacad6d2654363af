use ctr_lab_core::{ExperimentBatch, LabError, Result, StatTest, Trial};
use ctr_lab_metrics::*;
use ctr_lab_simulator::AbTestGenerator;
use approx::assert_relative_eq;
use pretty_assertions::assert_eq;

fn small_batch(uplift: f64, trials: usize) -> ExperimentBatch {
    AbTestGenerator::from_params(0.05, uplift, 1000.0, 0.6)
        .unwrap()
        .generate_batch(200, trials, 11)
        .unwrap()
}

/// Analytic tests only; the bootstrap is slow enough to matter in Monte Carlo runs.
fn analytic_battery() -> Vec<Box<dyn StatTest>> {
    vec![
        Box::new(TTestClicks),
        Box::new(TTestCtr),
        Box::new(MannWhitneyClicks),
        Box::new(BinomialCtr),
    ]
}

struct FailsFrom {
    first_bad_trial: usize,
}

impl StatTest for FailsFrom {
    fn name(&self) -> &str {
        "Fails"
    }

    fn apply(&self, trial: &Trial) -> Result<f64> {
        if trial.index >= self.first_bad_trial {
            Err(LabError::shape(format!("cannot handle trial {}", trial.index)))
        } else {
            Ok(0.5)
        }
    }
}

struct Constant(&'static str, f64);

impl StatTest for Constant {
    fn name(&self) -> &str {
        self.0
    }

    fn apply(&self, _trial: &Trial) -> Result<f64> {
        Ok(self.1)
    }
}

// ===== Result Layout =====

#[test]
fn test_results_follow_battery_and_trial_order() {
    let batch = small_batch(0.2, 6);
    let bootstrap = BootstrapCtr::new(100, 1).unwrap();

    let results = apply_tests(&batch, default_battery(bootstrap)).unwrap();

    assert_eq!(
        results.names(),
        vec![T_TEST_CLICKS, T_TEST_CTR, MANN_WHITNEY_CLICKS, BINOMIAL_CTR, BOOTSTRAP_CTR]
    );
    for entry in results.iter() {
        assert_eq!(entry.len(), 6);
        assert!(entry.p_vals().iter().all(|p| (0.0..=1.0).contains(p)));
    }

    // Column i of every test belongs to trial i.
    let third = batch.trial(2).unwrap();
    let expected = BinomialCtr.apply(third).unwrap();
    assert_eq!(results.get(BINOMIAL_CTR).unwrap().p_vals()[2], expected);
}

#[test]
fn test_results_are_reproducible() {
    let batch = small_batch(0.2, 5);
    let run = || {
        let bootstrap = BootstrapCtr::new(100, 3).unwrap();
        apply_tests(&batch, default_battery(bootstrap)).unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_results_serialize_as_named_p_value_arrays() {
    let batch = small_batch(0.0, 3);

    let results = apply_tests(&batch, analytic_battery()).unwrap();
    let json = serde_json::to_string(&results).unwrap();

    assert!(json.starts_with(r#"{"T-test (Clicks)":{"p_vals":["#), "{json}");
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["Binomial (CTR)"]["p_vals"].as_array().unwrap().len(), 3);
    assert_eq!(value.as_object().unwrap().len(), 4);
}

// ===== Failures =====

#[test]
fn test_failure_reports_earliest_trial_and_test() {
    let batch = small_batch(0.2, 8);
    let tests: Vec<Box<dyn StatTest>> = vec![Box::new(TTestClicks), Box::new(FailsFrom { first_bad_trial: 4 })];

    let err = apply_tests(&batch, tests).unwrap_err();

    match &err {
        LabError::TrialFailed { test, trial, .. } => {
            assert_eq!(test, "Fails");
            assert_eq!(*trial, 4);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.root_cause().is_data_shape());
    assert_eq!(err.message(), "cannot handle trial 4");
}

#[test]
fn test_out_of_range_p_value_is_rejected() {
    let batch = small_batch(0.2, 2);
    let tests: Vec<Box<dyn StatTest>> = vec![Box::new(Constant("Broken", f64::NAN))];

    let err = apply_tests(&batch, tests).unwrap_err();

    assert!(err.root_cause().is_invalid_parameter());
}

#[test]
fn test_runner_rejects_bad_batteries() {
    assert!(TestRunner::new(vec![]).unwrap_err().is_invalid_parameter());

    let duplicated: Vec<Box<dyn StatTest>> = vec![Box::new(Constant("Same", 0.1)), Box::new(Constant("Same", 0.2))];
    assert!(TestRunner::new(duplicated).unwrap_err().is_invalid_parameter());
}

#[test]
fn test_runner_rejects_empty_batch() {
    let config = small_batch(0.0, 1).config().clone();
    let empty = ExperimentBatch::new(config, 10, 0, vec![]);

    let runner = TestRunner::new(analytic_battery()).unwrap();

    assert!(runner.run(&empty).unwrap_err().is_data_shape());
}

// ===== Aggregation =====

#[test]
fn test_power_ranking_orders_by_power() {
    let entries = vec![
        PValues::new("weak", vec![0.5, 0.01, 0.7, 0.9]),
        PValues::new("strong", vec![0.01, 0.02, 0.03, 0.9]),
        PValues::new("tied", vec![0.5, 0.01, 0.7, 0.9]),
    ];
    let results = TestResults::new(entries);

    let ranking = results.power_ranking(0.05);

    assert_eq!(ranking[0], ("strong".to_string(), 0.75));
    assert_eq!(ranking[1].0, "weak");
    assert_eq!(ranking[2].0, "tied");
}

#[test]
fn test_p_values_helpers() {
    let p_values = PValues::new("x", vec![0.3, 0.1, 0.2, 0.9]);

    let (sorted, probabilities) = p_values.cdf().unwrap();
    assert_eq!(sorted, vec![0.1, 0.2, 0.3, 0.9]);
    assert_eq!(probabilities, vec![0.25, 0.5, 0.75, 1.0]);

    let histogram = p_values.histogram(10);
    assert_eq!(histogram.bins.len(), 10);
    assert_eq!(histogram.total_count, 4);
    assert_relative_eq!(p_values.power(0.25), 0.5);
}

// ===== Monte Carlo Behaviour =====

#[test]
fn test_binomial_test_is_calibrated_under_the_null() {
    let batch = AbTestGenerator::from_params(0.05, 0.0, 1000.0, 0.6)
        .unwrap()
        .generate_batch(1000, 200, 2024)
        .unwrap();

    let results = apply_tests(&batch, analytic_battery()).unwrap();

    let fpr = results.get(BINOMIAL_CTR).unwrap().power(0.05);
    assert!((0.01..=0.10).contains(&fpr), "false positive rate {fpr}");
    for entry in results.iter() {
        assert!(entry.power(0.05) <= 0.12, "{} rejects {}", entry.name(), entry.power(0.05));
    }
}

#[test]
fn test_designed_sample_size_reaches_target_power() {
    let base_ctr = 0.1;
    let uplift = 0.5;
    let generator = AbTestGenerator::from_params(base_ctr, uplift, 1000.0, 0.6).unwrap();

    // The design counts views; convert to users with a pilot estimate.
    let views_needed = design_binomial_experiment(uplift, base_ctr, 0.05, 0.2).unwrap();
    let pilot = generator.generate_batch(2000, 1, 99).unwrap();
    let mean_views = pilot.trial(0).unwrap().control.mean_views();
    let users = (views_needed as f64 / mean_views).ceil() as usize;

    let batch = generator.generate_batch(users, 300, 7).unwrap();
    let results = apply_tests(&batch, vec![Box::new(BinomialCtr) as Box<dyn StatTest>]).unwrap();

    let power = results.get(BINOMIAL_CTR).unwrap().power(0.05);
    assert!((0.65..=0.95).contains(&power), "power {power} with {users} users");
}

#[test]
fn test_bootstrap_is_calibrated_under_the_null() {
    let batch = AbTestGenerator::from_params(0.05, 0.0, 1000.0, 0.6)
        .unwrap()
        .generate_batch(500, 200, 31)
        .unwrap();
    let bootstrap = BootstrapCtr::new(200, 5).unwrap();

    let results = apply_tests(&batch, vec![Box::new(bootstrap) as Box<dyn StatTest>]).unwrap();

    let fpr = results.get(BOOTSTRAP_CTR).unwrap().power(0.05);
    assert!((0.01..=0.12).contains(&fpr), "false positive rate {fpr}");
}

#[test]
fn test_every_test_detects_a_strong_effect() {
    let batch = AbTestGenerator::from_params(0.05, 0.5, 1000.0, 0.6)
        .unwrap()
        .generate_batch(2000, 50, 8)
        .unwrap();
    let bootstrap = BootstrapCtr::new(200, 9).unwrap();

    let results = apply_tests(&batch, default_battery(bootstrap)).unwrap();

    assert_eq!(results.len(), 5);
    for entry in results.iter() {
        let power = entry.power(0.05);
        assert!(power >= 0.8, "{} has power {power}", entry.name());
    }
}

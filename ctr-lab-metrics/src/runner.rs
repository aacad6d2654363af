use ctr_lab_core::{ExperimentBatch, LabError, Result, StatTest};
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::aggregators::{empirical_cdf, Histogram, MetricAggregator};

/// p-values of one test, one per trial in batch order.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PValues {
    #[serde(skip)]
    name: String,
    p_vals: Vec<f64>,
}

impl PValues {
    pub fn new(name: impl Into<String>, p_vals: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            p_vals,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn p_vals(&self) -> &[f64] {
        &self.p_vals
    }

    pub fn len(&self) -> usize {
        self.p_vals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p_vals.is_empty()
    }

    /// Share of trials rejected at `alpha`.
    pub fn power(&self, alpha: f64) -> f64 {
        MetricAggregator::power(&self.p_vals, alpha)
    }

    pub fn cdf(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        empirical_cdf(&self.p_vals)
    }

    pub fn calibration_gap(&self) -> Result<f64> {
        MetricAggregator::calibration_gap(&self.p_vals)
    }

    /// Histogram over [0, 1].
    pub fn histogram(&self, bins: usize) -> Histogram {
        MetricAggregator::histogram_range(&self.p_vals, bins, 0.0, 1.0)
    }
}

/// p-value arrays keyed by test name, in the order the tests were run.
///
/// Serializes as `{ "<test name>": { "p_vals": [...] }, ... }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestResults {
    entries: Vec<PValues>,
}

impl TestResults {
    pub fn new(entries: Vec<PValues>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&PValues> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PValues> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Number of tests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Power of every test, in run order.
    pub fn powers(&self, alpha: f64) -> Vec<(String, f64)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.power(alpha)))
            .collect()
    }

    /// Power of every test, highest first; equal powers keep run order.
    pub fn power_ranking(&self, alpha: f64) -> Vec<(String, f64)> {
        let mut powers = self.powers(alpha);
        powers.sort_by(|a, b| b.1.total_cmp(&a.1));
        powers
    }
}

impl Serialize for TestResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, entry)?;
        }
        map.end()
    }
}

/// Applies a fixed collection of tests to every trial of a batch.
pub struct TestRunner {
    tests: Vec<Box<dyn StatTest>>,
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("tests", &self.tests.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl TestRunner {
    /// Test names must be unique since they key the results.
    pub fn new(tests: Vec<Box<dyn StatTest>>) -> Result<Self> {
        if tests.is_empty() {
            return Err(LabError::invalid("test runner needs at least one test"));
        }
        let mut seen = HashSet::new();
        for test in &tests {
            if !seen.insert(test.name().to_string()) {
                return Err(LabError::invalid(format!("duplicate test name '{}'", test.name())));
            }
        }
        Ok(Self { tests })
    }

    pub fn test_names(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.name()).collect()
    }

    /// Run every test on every trial.
    ///
    /// Trials run in parallel. Any failure aborts the whole run: the error
    /// reported is the one from the earliest trial, and within that trial
    /// the earliest test, wrapped with both positions.
    #[instrument(skip_all, fields(trials = batch.len(), tests = self.tests.len()))]
    pub fn run(&self, batch: &ExperimentBatch) -> Result<TestResults> {
        if batch.is_empty() {
            return Err(LabError::shape("experiment batch has no trials"));
        }

        let started = Instant::now();
        let per_trial: Vec<Vec<Result<f64>>> = batch
            .trials()
            .par_iter()
            .map(|trial| self.tests.iter().map(|test| test.apply(trial)).collect())
            .collect();

        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(batch.len()); self.tests.len()];
        for (trial_index, results) in per_trial.into_iter().enumerate() {
            for (test, (result, column)) in self.tests.iter().zip(results.into_iter().zip(&mut columns)) {
                let p_value = result
                    .and_then(check_p_value)
                    .map_err(|source| LabError::TrialFailed {
                        test: test.name().to_string(),
                        trial: trial_index,
                        source: Box::new(source),
                    })?;
                column.push(p_value);
            }
        }

        let entries: Vec<PValues> = self
            .tests
            .iter()
            .zip(columns)
            .map(|(test, p_vals)| PValues::new(test.name(), p_vals))
            .collect();
        for entry in &entries {
            debug!(test = entry.name(), rejected_at_5pct = entry.power(0.05), "test applied");
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "applied tests to experiment batch"
        );

        Ok(TestResults::new(entries))
    }
}

fn check_p_value(p_value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&p_value) {
        Ok(p_value)
    } else {
        Err(LabError::invalid(format!("p-value {p_value} outside [0, 1]")))
    }
}

/// Run `tests` over `batch`; see [`TestRunner::run`].
pub fn apply_tests(batch: &ExperimentBatch, tests: Vec<Box<dyn StatTest>>) -> Result<TestResults> {
    TestRunner::new(tests)?.run(batch)
}

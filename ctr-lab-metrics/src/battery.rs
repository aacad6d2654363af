//! The five significance tests compared by the simulator.
//!
//! Zero-view users are excluded from per-user CTR tests and kept in
//! click-count tests; aggregate tests work on sums and need no special case.

use ctr_lab_core::{LabError, Result, StatTest, Trial};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::statistical::{Proportion, StatisticalAnalyzer};

pub const T_TEST_CLICKS: &str = "T-test (Clicks)";
pub const T_TEST_CTR: &str = "T-test (CTR)";
pub const MANN_WHITNEY_CLICKS: &str = "Mann–Whitney (Clicks)";
pub const BINOMIAL_CTR: &str = "Binomial (CTR)";
pub const BOOTSTRAP_CTR: &str = "Bootstrap (CTR)";

pub const DEFAULT_BOOTSTRAP_RESAMPLES: usize = 1000;

/// Student t-test on raw per-user click counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TTestClicks;

impl StatTest for TTestClicks {
    fn name(&self) -> &str {
        T_TEST_CLICKS
    }

    fn apply(&self, trial: &Trial) -> Result<f64> {
        trial.check_shape()?;
        let control = trial.control.clicks_f64();
        let treatment = trial.treatment.clicks_f64();
        Ok(StatisticalAnalyzer::t_test(&control, &treatment).p_value)
    }
}

/// Student t-test on per-user CTR of users with at least one view.
#[derive(Debug, Clone, Copy, Default)]
pub struct TTestCtr;

impl StatTest for TTestCtr {
    fn name(&self) -> &str {
        T_TEST_CTR
    }

    fn apply(&self, trial: &Trial) -> Result<f64> {
        trial.check_shape()?;
        let control = trial.control.observed_ctrs();
        let treatment = trial.treatment.observed_ctrs();
        Ok(StatisticalAnalyzer::t_test(&control, &treatment).p_value)
    }
}

/// Mann-Whitney U test on per-user click counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MannWhitneyClicks;

impl StatTest for MannWhitneyClicks {
    fn name(&self) -> &str {
        MANN_WHITNEY_CLICKS
    }

    fn apply(&self, trial: &Trial) -> Result<f64> {
        trial.check_shape()?;
        let control = trial.control.clicks_f64();
        let treatment = trial.treatment.clicks_f64();
        Ok(StatisticalAnalyzer::mann_whitney_u(&control, &treatment).p_value)
    }
}

/// Two-proportion z-test on total clicks over total views.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialCtr;

impl StatTest for BinomialCtr {
    fn name(&self) -> &str {
        BINOMIAL_CTR
    }

    fn apply(&self, trial: &Trial) -> Result<f64> {
        trial.check_shape()?;
        let control = Proportion::new(trial.control.total_clicks(), trial.control.total_views());
        let treatment = Proportion::new(trial.treatment.total_clicks(), trial.treatment.total_views());
        Ok(StatisticalAnalyzer::two_proportion_z_test(control, treatment).p_value)
    }
}

/// Bootstrap test on the difference in aggregate CTR.
///
/// The resampling stream is seeded from `seed` and the trial's own seed, so a
/// given trial always gets the same p-value.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapCtr {
    resamples: usize,
    seed: u64,
}

impl BootstrapCtr {
    pub fn new(resamples: usize, seed: u64) -> Result<Self> {
        if resamples == 0 {
            return Err(LabError::invalid("bootstrap needs at least one resample"));
        }
        Ok(Self { resamples, seed })
    }

    pub fn resamples(&self) -> usize {
        self.resamples
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn stream_seed(&self, trial: &Trial) -> u64 {
        self.seed ^ trial.seed.rotate_left(32)
    }
}

impl Default for BootstrapCtr {
    fn default() -> Self {
        Self {
            resamples: DEFAULT_BOOTSTRAP_RESAMPLES,
            seed: 0,
        }
    }
}

impl StatTest for BootstrapCtr {
    fn name(&self) -> &str {
        BOOTSTRAP_CTR
    }

    fn apply(&self, trial: &Trial) -> Result<f64> {
        trial.check_shape()?;
        let mut rng = StdRng::seed_from_u64(self.stream_seed(trial));
        let result = StatisticalAnalyzer::bootstrap_ratio_difference(
            (trial.control.clicks(), trial.control.views()),
            (trial.treatment.clicks(), trial.treatment.views()),
            self.resamples,
            &mut rng,
        );
        Ok(result.p_value)
    }
}

/// All five tests in their canonical order.
pub fn default_battery(bootstrap: BootstrapCtr) -> Vec<Box<dyn StatTest>> {
    vec![
        Box::new(TTestClicks),
        Box::new(TTestCtr),
        Box::new(MannWhitneyClicks),
        Box::new(BinomialCtr),
        Box::new(bootstrap),
    ]
}

use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use statrs::statistics::Statistics;

/// p-value reported whenever a test has nothing to compare.
pub const DEGENERATE_P_VALUE: f64 = 1.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StatisticalResult {
    pub statistic: f64,
    pub p_value: f64,
}

impl StatisticalResult {
    fn degenerate() -> Self {
        Self {
            statistic: 0.0,
            p_value: DEGENERATE_P_VALUE,
        }
    }

    fn new(statistic: f64, p_value: f64) -> Self {
        if statistic.is_nan() || p_value.is_nan() {
            return Self::degenerate();
        }
        Self {
            statistic,
            p_value: p_value.clamp(0.0, 1.0),
        }
    }
}

/// Aggregated binomial counts of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proportion {
    pub successes: u64,
    pub trials: u64,
}

impl Proportion {
    pub fn new(successes: u64, trials: u64) -> Self {
        Self { successes, trials }
    }

    pub fn rate(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.successes as f64 / self.trials as f64
    }
}

pub struct StatisticalAnalyzer;

impl StatisticalAnalyzer {
    /// Two-sided two-sample Student t-test with pooled variance.
    ///
    /// Returns the degenerate p-value when either sample is empty, there are
    /// no degrees of freedom, or both samples have zero variance.
    pub fn t_test(sample1: &[f64], sample2: &[f64]) -> StatisticalResult {
        if sample1.is_empty() || sample2.is_empty() || sample1.len() + sample2.len() < 3 {
            return StatisticalResult::degenerate();
        }

        let n1 = sample1.len() as f64;
        let n2 = sample2.len() as f64;
        let mean1 = sample1.mean();
        let mean2 = sample2.mean();
        let ss1 = Self::sum_of_squares(sample1, mean1);
        let ss2 = Self::sum_of_squares(sample2, mean2);

        let df = n1 + n2 - 2.0;
        let pooled_var = (ss1 + ss2) / df;
        if pooled_var <= 0.0 || !pooled_var.is_finite() {
            return StatisticalResult::degenerate();
        }

        let t_stat = (mean2 - mean1) / (pooled_var * (1.0 / n1 + 1.0 / n2)).sqrt();
        let t_dist = match StudentsT::new(0.0, 1.0, df) {
            Ok(dist) => dist,
            Err(_) => return StatisticalResult::degenerate(),
        };
        let p_value = 2.0 * t_dist.sf(t_stat.abs());

        StatisticalResult::new(t_stat, p_value)
    }

    /// Mann-Whitney U test, two-sided, normal approximation with tie and
    /// continuity corrections. The statistic is U of the first sample.
    pub fn mann_whitney_u(sample1: &[f64], sample2: &[f64]) -> StatisticalResult {
        if sample1.is_empty() || sample2.is_empty() {
            return StatisticalResult::degenerate();
        }

        let n1 = sample1.len();
        let n2 = sample2.len();
        let n = (n1 + n2) as f64;

        let mut combined: Vec<(f64, bool)> = sample1
            .iter()
            .map(|&x| (x, true))
            .chain(sample2.iter().map(|&x| (x, false)))
            .collect();
        combined.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Average ranks over tie blocks; accumulate the tie term sum(t^3 - t).
        let mut rank_sum1 = 0.0;
        let mut tie_term = 0.0;
        let mut i = 0;
        while i < combined.len() {
            let mut j = i;
            while j < combined.len() && combined[j].0 == combined[i].0 {
                j += 1;
            }
            let rank = (i + j + 1) as f64 / 2.0;
            let block = (j - i) as f64;
            tie_term += block * block * block - block;
            rank_sum1 += rank * combined[i..j].iter().filter(|(_, first)| *first).count() as f64;
            i = j;
        }

        let n1f = n1 as f64;
        let n2f = n2 as f64;
        let u1 = rank_sum1 - n1f * (n1f + 1.0) / 2.0;
        let mean_u = n1f * n2f / 2.0;
        let var_u = n1f * n2f / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
        if var_u <= 0.0 || !var_u.is_finite() {
            return StatisticalResult::degenerate();
        }

        let z = ((u1 - mean_u).abs() - 0.5).max(0.0) / var_u.sqrt();
        let p_value = 2.0 * Self::standard_normal().sf(z);

        StatisticalResult::new(u1, p_value)
    }

    /// Pooled two-proportion z-test, two-sided.
    ///
    /// Degenerate when either group has no trials or the pooled rate is 0 or 1.
    pub fn two_proportion_z_test(control: Proportion, treatment: Proportion) -> StatisticalResult {
        if control.trials == 0 || treatment.trials == 0 {
            return StatisticalResult::degenerate();
        }

        let n1 = control.trials as f64;
        let n2 = treatment.trials as f64;
        let pooled = (control.successes + treatment.successes) as f64 / (n1 + n2);
        let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
        if se <= 0.0 || !se.is_finite() {
            return StatisticalResult::degenerate();
        }

        let z = (treatment.rate() - control.rate()) / se;
        let p_value = 2.0 * Self::standard_normal().sf(z.abs());

        StatisticalResult::new(z, p_value)
    }

    /// Bootstrap test for the difference in ratio metrics `sum(num) / sum(den)`.
    ///
    /// Users are resampled with replacement inside each group; the p-value is
    /// the share of centred bootstrap differences at least as far from zero
    /// as the observed difference. A group without views or a zero observed
    /// difference is degenerate.
    pub fn bootstrap_ratio_difference<R: Rng + ?Sized>(
        control: (&[u64], &[u64]),
        treatment: (&[u64], &[u64]),
        resamples: usize,
        rng: &mut R,
    ) -> StatisticalResult {
        let (num0, den0) = control;
        let (num1, den1) = treatment;
        if num0.is_empty() || num1.is_empty() || resamples == 0 {
            return StatisticalResult::degenerate();
        }

        let total0: u64 = den0.iter().sum();
        let total1: u64 = den1.iter().sum();
        if total0 == 0 || total1 == 0 {
            return StatisticalResult::degenerate();
        }

        let observed = Self::ratio(num1.iter().sum(), total1) - Self::ratio(num0.iter().sum(), total0);
        if observed == 0.0 || !observed.is_finite() {
            return StatisticalResult::new(observed, DEGENERATE_P_VALUE);
        }

        let mut extreme = 0usize;
        for _ in 0..resamples {
            let diff = Self::resampled_ratio(num1, den1, rng) - Self::resampled_ratio(num0, den0, rng);
            if (diff - observed).abs() >= observed.abs() {
                extreme += 1;
            }
        }

        StatisticalResult::new(observed, extreme as f64 / resamples as f64)
    }

    /// Quantile of the standard normal distribution.
    pub fn normal_quantile(q: f64) -> f64 {
        Self::standard_normal().inverse_cdf(q)
    }

    fn resampled_ratio<R: Rng + ?Sized>(num: &[u64], den: &[u64], rng: &mut R) -> f64 {
        let mut num_sum = 0u64;
        let mut den_sum = 0u64;
        for _ in 0..num.len() {
            let idx = rng.gen_range(0..num.len());
            num_sum += num[idx];
            den_sum += den[idx];
        }
        Self::ratio(num_sum, den_sum)
    }

    fn ratio(num: u64, den: u64) -> f64 {
        if den == 0 {
            return 0.0;
        }
        num as f64 / den as f64
    }

    fn sum_of_squares(values: &[f64], mean: f64) -> f64 {
        values.iter().map(|x| (x - mean).powi(2)).sum()
    }

    fn standard_normal() -> Normal {
        Normal::standard()
    }
}

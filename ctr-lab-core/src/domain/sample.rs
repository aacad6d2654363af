use serde::{Deserialize, Serialize};

use crate::error::{LabError, Result};

// ===== Group =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Control,
    Treatment,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::Control, Group::Treatment];

    /// 0 for control, 1 for treatment.
    pub fn index(&self) -> usize {
        match self {
            Group::Control => 0,
            Group::Treatment => 1,
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Treatment => write!(f, "treatment"),
        }
    }
}

// ===== Group Sample =====

/// Per-user observations of one group in one trial.
///
/// Construction does not check shape; tests call [`GroupSample::check_shape`]
/// so malformed caller data surfaces as a `DataShape` error at test time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupSample {
    views: Vec<u64>,
    clicks: Vec<u64>,
    /// Latent per-user click probabilities, empty when not simulated.
    #[serde(default)]
    true_ctrs: Vec<f64>,
}

impl GroupSample {
    pub fn new(views: Vec<u64>, clicks: Vec<u64>) -> Self {
        Self {
            views,
            clicks,
            true_ctrs: Vec::new(),
        }
    }

    pub fn with_true_ctrs(mut self, true_ctrs: Vec<f64>) -> Self {
        self.true_ctrs = true_ctrs;
        self
    }

    pub fn views(&self) -> &[u64] {
        &self.views
    }

    pub fn clicks(&self) -> &[u64] {
        &self.clicks
    }

    pub fn true_ctrs(&self) -> &[f64] {
        &self.true_ctrs
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Non-empty, views and clicks of equal length, no user with more clicks
    /// than views.
    pub fn check_shape(&self) -> Result<()> {
        if self.views.is_empty() || self.clicks.is_empty() {
            return Err(LabError::shape("group has no users"));
        }
        if self.views.len() != self.clicks.len() {
            return Err(LabError::shape(format!(
                "views has {} users but clicks has {}",
                self.views.len(),
                self.clicks.len()
            )));
        }
        if let Some(user) = self
            .views
            .iter()
            .zip(&self.clicks)
            .position(|(views, clicks)| clicks > views)
        {
            return Err(LabError::shape(format!(
                "user {} has {} clicks but only {} views",
                user, self.clicks[user], self.views[user]
            )));
        }
        Ok(())
    }

    pub fn total_views(&self) -> u64 {
        self.views.iter().fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    pub fn total_clicks(&self) -> u64 {
        self.clicks.iter().fold(0u64, |acc, &c| acc.saturating_add(c))
    }

    /// Total clicks over total views; 0 when the group has no views.
    pub fn aggregate_ctr(&self) -> f64 {
        let views = self.total_views();
        if views == 0 {
            return 0.0;
        }
        self.total_clicks() as f64 / views as f64
    }

    /// Clicks divided by views for every user, 0 for zero-view users.
    pub fn user_ctrs(&self) -> Vec<f64> {
        self.views
            .iter()
            .zip(&self.clicks)
            .map(|(&views, &clicks)| if views == 0 { 0.0 } else { clicks as f64 / views as f64 })
            .collect()
    }

    /// Clicks divided by views for users with at least one view.
    pub fn observed_ctrs(&self) -> Vec<f64> {
        self.views
            .iter()
            .zip(&self.clicks)
            .filter(|(views, _)| **views > 0)
            .map(|(&views, &clicks)| clicks as f64 / views as f64)
            .collect()
    }

    pub fn clicks_f64(&self) -> Vec<f64> {
        self.clicks.iter().map(|&c| c as f64).collect()
    }

    pub fn mean_views(&self) -> f64 {
        if self.views.is_empty() {
            return 0.0;
        }
        self.total_views() as f64 / self.views.len() as f64
    }
}

// ===== Trial =====

/// One simulated experiment: control and treatment observed side by side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trial {
    /// Position of the trial inside its batch.
    pub index: usize,
    /// Seed of the random stream the trial was generated from.
    pub seed: u64,
    pub control: GroupSample,
    pub treatment: GroupSample,
}

impl Trial {
    pub fn new(control: GroupSample, treatment: GroupSample) -> Self {
        Self {
            index: 0,
            seed: 0,
            control,
            treatment,
        }
    }

    pub fn with_origin(mut self, index: usize, seed: u64) -> Self {
        self.index = index;
        self.seed = seed;
        self
    }

    pub fn group(&self, group: Group) -> &GroupSample {
        match group {
            Group::Control => &self.control,
            Group::Treatment => &self.treatment,
        }
    }

    pub fn check_shape(&self) -> Result<()> {
        self.control
            .check_shape()
            .map_err(|e| LabError::shape(format!("control: {}", e.message())))?;
        self.treatment
            .check_shape()
            .map_err(|e| LabError::shape(format!("treatment: {}", e.message())))
    }
}

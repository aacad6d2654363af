use crate::domain::Trial;
use crate::error::Result;

/// A two-sample significance test producing one p-value per trial.
///
/// Implementations must not mutate the trial and must return a value in
/// `[0, 1]`; degenerate inputs resolve to a fixed p-value instead of an error.
pub trait StatTest: Send + Sync {
    /// Display name used as the key in aggregated results.
    fn name(&self) -> &str;

    fn apply(&self, trial: &Trial) -> Result<f64>;
}

impl<T: StatTest + ?Sized> StatTest for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn apply(&self, trial: &Trial) -> Result<f64> {
        (**self).apply(trial)
    }
}

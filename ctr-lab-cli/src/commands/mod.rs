//! Command implementations

pub mod config;
pub mod design;
pub mod simulate;

use clap::ValueEnum;
use ctr_lab_core::EffectConvention;

/// Command-line spelling of [`EffectConvention`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConventionArg {
    /// p1 = p0 * (1 + effect)
    Relative,
    /// p1 = p0 + effect
    Absolute,
}

impl From<ConventionArg> for EffectConvention {
    fn from(arg: ConventionArg) -> Self {
        match arg {
            ConventionArg::Relative => EffectConvention::Relative,
            ConventionArg::Absolute => EffectConvention::Absolute,
        }
    }
}

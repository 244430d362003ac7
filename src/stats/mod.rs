//! Statistics engine
//!
//! Consumes already-filtered numeric observations and produces summary
//! records for report generators:
//!
//! - [`compute_descriptive_stats`] / [`compute_five_number_summary`] / [`StatSummary`]
//! - [`bootstrap_mean_difference_ci`] / [`bootstrap_mean_ci`] (seeded, bit-reproducible)
//! - [`welch_t_test_two_sided`] / [`effect_size_two_sample`] / [`bonferroni_correction`]
//!
//! Quantiles everywhere use linear interpolation between order statistics
//! (`pos = (n - 1) · q`), including the bootstrap percentile bounds.
//!
//! Functions never panic on small samples: undefined statistics are `NaN`
//! so gaps propagate through aggregation instead of aborting it. Only the
//! bootstrap, which cannot resample an empty sample, returns an error.

mod bootstrap;
mod descriptive;
mod distribution;
mod inference;

pub use bootstrap::{
    bootstrap_mean_ci, bootstrap_mean_difference_ci, BootstrapConfig, ConfidenceInterval,
    DifferenceCI,
};
pub use descriptive::{
    compute_descriptive_stats, compute_five_number_summary, numeric_observations,
    quantile_sorted, DescriptiveStats, FiveNumberSummary, StatSummary,
};
pub use distribution::{ln_gamma, regularized_incomplete_beta, student_t_two_sided_p};
pub use inference::{
    bonferroni_correction, effect_size_two_sample, welch_t_test_two_sided, EffectSize,
    TTestResult,
};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Full two-condition comparison (e.g. high anchor vs. low anchor).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleComparison {
    /// Summary of sample A.
    pub a: StatSummary,
    /// Summary of sample B.
    pub b: StatSummary,
    /// Bootstrap CI for `mean(A) - mean(B)`.
    pub difference: DifferenceCI,
    /// Welch's t-test.
    pub t_test: TTestResult,
    /// Standardised effect size.
    pub effect: EffectSize,
}

/// Summaries, bootstrap CI, Welch test and effect size in one pass.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if either sample is empty or the bootstrap
/// configuration is out of range.
///
/// # Examples
///
/// ```rust
/// use anchorlab::stats::{compare_samples, BootstrapConfig};
///
/// let high_anchor = [12.0, 10.0, 14.0, 11.0, 13.0];
/// let low_anchor = [4.0, 6.0, 5.0, 3.0, 6.0];
/// let cmp = compare_samples(&high_anchor, &low_anchor, &BootstrapConfig::default())?;
/// assert!(cmp.difference.lower > 0.0);
/// assert!(cmp.t_test.p_value < 0.05);
/// # Ok::<(), anchorlab::Error>(())
/// ```
pub fn compare_samples(
    sample_a: &[f64],
    sample_b: &[f64],
    config: &BootstrapConfig,
) -> Result<SampleComparison> {
    Ok(SampleComparison {
        a: StatSummary::from_values(sample_a),
        b: StatSummary::from_values(sample_b),
        difference: bootstrap_mean_difference_ci(sample_a, sample_b, config)?,
        t_test: welch_t_test_two_sided(sample_a, sample_b),
        effect: effect_size_two_sample(sample_a, sample_b),
    })
}

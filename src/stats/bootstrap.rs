//! Seeded bootstrap confidence intervals
//!
//! All resampling draws from `StdRng::seed_from_u64(seed)`, never from
//! system entropy, so identical inputs and seed reproduce bit-identical
//! bounds. Indices are drawn from a `u64` range so 32- and 64-bit targets
//! consume the generator identically.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::descriptive::{mean, quantile_sorted};
use crate::{Error, Result};

/// Resampling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Two-sided significance level; the interval covers `1 - alpha`.
    pub alpha: f64,
    /// Number of bootstrap replicates.
    pub iterations: usize,
    /// Generator seed.
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            iterations: 2000,
            seed: 42,
        }
    }
}

impl BootstrapConfig {
    /// Default configuration with an explicit seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Confidence level `1 - alpha`.
    #[must_use]
    pub fn confidence_level(&self) -> f64 {
        1.0 - self.alpha
    }

    fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::InvalidInput(format!(
                "alpha must lie in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.iterations == 0 {
            return Err(Error::InvalidInput(
                "bootstrap needs at least one iteration".to_string(),
            ));
        }
        Ok(())
    }
}

/// Point estimate with a percentile bootstrap interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Statistic on the original sample(s).
    pub point_estimate: f64,
    /// Lower bound (`alpha / 2` quantile of the replicates).
    pub lower: f64,
    /// Upper bound (`1 - alpha / 2` quantile of the replicates).
    pub upper: f64,
    /// `1 - alpha`.
    pub confidence_level: f64,
}

/// Interval for a difference of two means.
pub type DifferenceCI = ConfidenceInterval;

impl ConfidenceInterval {
    /// Whether the interval contains `value`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Percentile bootstrap CI for `mean(A) - mean(B)` of two independent samples.
///
/// Each replicate resamples `|A|` values from A and `|B|` values from B with
/// replacement (within-group, not paired) and records the difference of the
/// resampled means.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if either sample is empty or the
/// configuration is out of range.
///
/// # Examples
///
/// ```rust
/// use anchorlab::stats::{bootstrap_mean_difference_ci, BootstrapConfig};
///
/// let high = [9.0, 8.0, 10.0, 9.0, 11.0];
/// let low = [3.0, 4.0, 2.0, 5.0, 3.0];
/// let config = BootstrapConfig::with_seed(7);
/// let a = bootstrap_mean_difference_ci(&high, &low, &config)?;
/// let b = bootstrap_mean_difference_ci(&high, &low, &config)?;
/// assert_eq!(a.lower.to_bits(), b.lower.to_bits());
/// assert!(a.lower > 0.0);
/// # Ok::<(), anchorlab::Error>(())
/// ```
pub fn bootstrap_mean_difference_ci(
    sample_a: &[f64],
    sample_b: &[f64],
    config: &BootstrapConfig,
) -> Result<DifferenceCI> {
    config.validate()?;
    require_non_empty(sample_a, "sample A")?;
    require_non_empty(sample_b, "sample B")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut differences: Vec<f64> = (0..config.iterations)
        .map(|_| resampled_mean(sample_a, &mut rng) - resampled_mean(sample_b, &mut rng))
        .collect();
    differences.sort_by(f64::total_cmp);

    Ok(percentile_interval(
        mean(sample_a) - mean(sample_b),
        &differences,
        config.alpha,
    ))
}

/// Percentile bootstrap CI for the mean of one sample.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the sample is empty or the configuration
/// is out of range.
pub fn bootstrap_mean_ci(sample: &[f64], config: &BootstrapConfig) -> Result<ConfidenceInterval> {
    config.validate()?;
    require_non_empty(sample, "sample")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut means: Vec<f64> = (0..config.iterations)
        .map(|_| resampled_mean(sample, &mut rng))
        .collect();
    means.sort_by(f64::total_cmp);

    Ok(percentile_interval(mean(sample), &means, config.alpha))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn resampled_mean(sample: &[f64], rng: &mut StdRng) -> f64 {
    let len = sample.len() as u64;
    let sum: f64 = (0..len)
        .map(|_| sample[rng.gen_range(0..len) as usize])
        .sum();
    sum / len as f64
}

fn percentile_interval(point_estimate: f64, sorted: &[f64], alpha: f64) -> ConfidenceInterval {
    ConfidenceInterval {
        point_estimate,
        lower: quantile_sorted(sorted, alpha / 2.0),
        upper: quantile_sorted(sorted, 1.0 - alpha / 2.0),
        confidence_level: 1.0 - alpha,
    }
}

fn require_non_empty(sample: &[f64], name: &str) -> Result<()> {
    if sample.is_empty() {
        Err(Error::InvalidInput(format!("{name} is empty")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIGH: [f64; 8] = [9.0, 12.0, 10.0, 11.0, 9.0, 13.0, 10.0, 12.0];
    const LOW: [f64; 8] = [3.0, 5.0, 4.0, 6.0, 3.0, 4.0, 5.0, 2.0];

    #[test]
    fn test_same_seed_is_bit_identical() {
        let config = BootstrapConfig::with_seed(2024);
        let a = bootstrap_mean_difference_ci(&HIGH, &LOW, &config).unwrap();
        let b = bootstrap_mean_difference_ci(&HIGH, &LOW, &config).unwrap();
        assert_eq!(a.lower.to_bits(), b.lower.to_bits());
        assert_eq!(a.upper.to_bits(), b.upper.to_bits());
    }

    #[test]
    fn test_different_seed_changes_bounds() {
        let a = bootstrap_mean_difference_ci(&HIGH, &LOW, &BootstrapConfig::with_seed(1)).unwrap();
        let b = bootstrap_mean_difference_ci(&HIGH, &LOW, &BootstrapConfig::with_seed(2)).unwrap();
        assert!(a.lower.to_bits() != b.lower.to_bits() || a.upper.to_bits() != b.upper.to_bits());
    }

    #[test]
    fn test_interval_brackets_point_estimate() {
        let ci = bootstrap_mean_difference_ci(&HIGH, &LOW, &BootstrapConfig::default()).unwrap();
        assert!((ci.point_estimate - 6.75).abs() < 1e-12);
        assert!(ci.lower < ci.point_estimate && ci.point_estimate < ci.upper);
        assert!(ci.lower > 0.0);
        assert!((ci.confidence_level - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_constant_samples_collapse() {
        let ci = bootstrap_mean_difference_ci(&[5.0; 4], &[2.0; 6], &BootstrapConfig::default())
            .unwrap();
        assert!((ci.lower - 3.0).abs() < 1e-12);
        assert!((ci.upper - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_input() {
        let config = BootstrapConfig::default();
        assert!(bootstrap_mean_difference_ci(&[], &LOW, &config).is_err());
        assert!(bootstrap_mean_ci(&[], &config).is_err());
        let bad_alpha = BootstrapConfig {
            alpha: 1.5,
            ..config
        };
        assert!(bootstrap_mean_ci(&HIGH, &bad_alpha).is_err());
        let no_iterations = BootstrapConfig {
            iterations: 0,
            ..config
        };
        assert!(bootstrap_mean_ci(&HIGH, &no_iterations).is_err());
    }

    #[test]
    fn test_single_sample_ci_contains_mean() {
        let ci = bootstrap_mean_ci(&HIGH, &BootstrapConfig::with_seed(9)).unwrap();
        assert!(ci.contains(ci.point_estimate));
        assert!((ci.point_estimate - 10.75).abs() < 1e-12);
    }
}

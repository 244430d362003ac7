//! Descriptive statistics and quantiles

use serde::{Deserialize, Serialize};

use crate::experiment::TrialRecord;

/// Sample size, mean and sample standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    /// Number of observations.
    pub n: usize,
    /// Arithmetic mean (`NaN` when `n == 0`).
    pub mean: f64,
    /// Sample standard deviation with an `n - 1` denominator (`NaN` when `n <= 1`).
    pub std_dev: f64,
}

/// Minimum, quartiles and maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiveNumberSummary {
    /// Smallest observation.
    pub min: f64,
    /// First quartile.
    pub q1: f64,
    /// Median.
    pub median: f64,
    /// Third quartile.
    pub q3: f64,
    /// Largest observation.
    pub max: f64,
}

/// Descriptive statistics plus five-number summary for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    /// Number of observations.
    pub n: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Five-number summary.
    #[serde(flatten)]
    pub five: FiveNumberSummary,
}

impl StatSummary {
    /// Summarise a sample. Empty or single-value samples yield `NaN` gaps.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let stats = compute_descriptive_stats(values);
        Self {
            n: stats.n,
            mean: stats.mean,
            std_dev: stats.std_dev,
            five: compute_five_number_summary(values),
        }
    }
}

/// Mean and sample standard deviation.
///
/// Never fails: missing statistics are `NaN` so they propagate as gaps
/// through downstream aggregation.
///
/// # Examples
///
/// ```rust
/// use anchorlab::stats::compute_descriptive_stats;
///
/// let stats = compute_descriptive_stats(&[1.0, 2.0, 3.0, 4.0]);
/// assert_eq!(stats.mean, 2.5);
/// assert!((stats.std_dev - 1.2910).abs() < 1e-4);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_descriptive_stats(values: &[f64]) -> DescriptiveStats {
    let n = values.len();
    if n == 0 {
        return DescriptiveStats {
            n,
            mean: f64::NAN,
            std_dev: f64::NAN,
        };
    }
    let mean = mean(values);
    let std_dev = if n > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };
    DescriptiveStats { n, mean, std_dev }
}

/// Five-number summary using linear interpolation between order statistics.
#[must_use]
pub fn compute_five_number_summary(values: &[f64]) -> FiveNumberSummary {
    let sorted = sorted_copy(values);
    FiveNumberSummary {
        min: quantile_sorted(&sorted, 0.0),
        q1: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q3: quantile_sorted(&sorted, 0.75),
        max: quantile_sorted(&sorted, 1.0),
    }
}

/// Quantile `q` of an ascending-sorted slice.
///
/// `pos = (n - 1) * q`, then interpolate linearly between `sorted[floor(pos)]`
/// and the next order statistic. Not nearest-rank.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let base = pos.floor() as usize;
    let frac = pos - base as f64;
    match sorted.get(base + 1) {
        Some(next) => sorted[base] + frac * (next - sorted[base]),
        None => sorted[base],
    }
}

/// Parsed numeric results of all records that have one.
#[must_use]
pub fn numeric_observations(records: &[TrialRecord]) -> Vec<f64> {
    records.iter().filter_map(TrialRecord::numeric_result).collect()
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (`n - 1` denominator); caller guarantees `n > 1`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub(crate) fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedValue;

    #[test]
    fn test_descriptive_sample_sd() {
        let stats = compute_descriptive_stats(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.n, 4);
        assert!((stats.mean - 2.5).abs() < f64::EPSILON);
        assert!((stats.std_dev - 1.290_994_448_735_805_6).abs() < 1e-12);
    }

    #[test]
    fn test_descriptive_small_samples_are_nan() {
        let empty = compute_descriptive_stats(&[]);
        assert_eq!(empty.n, 0);
        assert!(empty.mean.is_nan());
        assert!(empty.std_dev.is_nan());

        let single = compute_descriptive_stats(&[7.0]);
        assert!((single.mean - 7.0).abs() < f64::EPSILON);
        assert!(single.std_dev.is_nan());
    }

    #[test]
    fn test_five_number_interpolates() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let five = compute_five_number_summary(&values);
        assert!((five.min - 1.0).abs() < f64::EPSILON);
        assert!((five.q1 - 3.25).abs() < 1e-12);
        assert!((five.median - 5.5).abs() < 1e-12);
        assert!((five.q3 - 7.75).abs() < 1e-12);
        assert!((five.max - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_five_number_unsorted_input() {
        let five = compute_five_number_summary(&[9.0, 1.0, 5.0]);
        assert!((five.median - 5.0).abs() < f64::EPSILON);
        assert!((five.q1 - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_quantile_edges() {
        assert!(quantile_sorted(&[], 0.5).is_nan());
        assert!((quantile_sorted(&[4.0], 0.9) - 4.0).abs() < f64::EPSILON);
        assert!((quantile_sorted(&[0.0, 10.0], 0.975) - 9.75).abs() < 1e-12);
    }

    #[test]
    fn test_numeric_observations_skip_unparsed() {
        let records = vec![
            TrialRecord::builder("e", "m", "c", 0).result(ParsedValue::Number(3.0)).build(),
            TrialRecord::builder("e", "m", "c", 1).raw_response("?").build(),
            TrialRecord::builder("e", "m", "c", 2)
                .result(ParsedValue::Category("deny".into()))
                .build(),
        ];
        assert_eq!(numeric_observations(&records), vec![3.0]);
    }

    #[test]
    fn test_summary_serializes_flat() {
        let json = serde_json::to_value(StatSummary::from_values(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(json["median"], 2.0);
        assert_eq!(json["n"], 3);
    }
}

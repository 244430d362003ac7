//! Two-sample hypothesis tests and effect sizes

use serde::{Deserialize, Serialize};

use super::descriptive::{mean, sample_variance};
use super::distribution::student_t_two_sided_p;

/// Result of Welch's unequal-variance t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    /// `mean(A) - mean(B)`.
    pub mean_difference: f64,
    /// Standard error of the difference.
    pub std_error: f64,
    /// t statistic.
    pub t: f64,
    /// Welch–Satterthwaite degrees of freedom.
    pub df: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

impl TTestResult {
    fn undefined(mean_difference: f64) -> Self {
        Self {
            mean_difference,
            std_error: f64::NAN,
            t: f64::NAN,
            df: f64::NAN,
            p_value: f64::NAN,
        }
    }

    /// Whether `p_value < alpha`. `NaN` p-values are never significant.
    #[must_use]
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Standardised mean difference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    /// Cohen's d with pooled standard deviation.
    pub cohens_d: f64,
    /// Hedges' g (small-sample corrected d).
    pub hedges_g: f64,
}

/// Welch's two-sided t-test for independent samples with unequal variances.
///
/// Needs at least two observations per sample and a non-zero standard
/// error; otherwise the statistic fields are `NaN`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn welch_t_test_two_sided(sample_a: &[f64], sample_b: &[f64]) -> TTestResult {
    if sample_a.is_empty() || sample_b.is_empty() {
        return TTestResult::undefined(f64::NAN);
    }
    let mean_difference = mean(sample_a) - mean(sample_b);
    if sample_a.len() < 2 || sample_b.len() < 2 {
        return TTestResult::undefined(mean_difference);
    }

    let na = sample_a.len() as f64;
    let nb = sample_b.len() as f64;
    let va = sample_variance(sample_a) / na;
    let vb = sample_variance(sample_b) / nb;
    let se_sq = va + vb;
    if se_sq <= 0.0 {
        return TTestResult::undefined(mean_difference);
    }

    let std_error = se_sq.sqrt();
    let t = mean_difference / std_error;
    let df = se_sq.powi(2) / (va.powi(2) / (na - 1.0) + vb.powi(2) / (nb - 1.0));
    TTestResult {
        mean_difference,
        std_error,
        t,
        df,
        p_value: student_t_two_sided_p(t, df),
    }
}

/// Cohen's d and Hedges' g for two independent samples.
///
/// Uses the pooled standard deviation
/// `sqrt(((nA-1)·varA + (nB-1)·varB) / (nA+nB-2))`. `NaN` when either
/// sample has fewer than two observations or the pooled deviation is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn effect_size_two_sample(sample_a: &[f64], sample_b: &[f64]) -> EffectSize {
    let undefined = EffectSize {
        cohens_d: f64::NAN,
        hedges_g: f64::NAN,
    };
    if sample_a.len() < 2 || sample_b.len() < 2 {
        return undefined;
    }
    let na = sample_a.len() as f64;
    let nb = sample_b.len() as f64;
    let pooled = (((na - 1.0) * sample_variance(sample_a) + (nb - 1.0) * sample_variance(sample_b))
        / (na + nb - 2.0))
        .sqrt();
    if pooled == 0.0 {
        return undefined;
    }
    let cohens_d = (mean(sample_a) - mean(sample_b)) / pooled;
    let correction = 1.0 - 3.0 / (4.0 * (na + nb) - 9.0);
    EffectSize {
        cohens_d,
        hedges_g: cohens_d * correction,
    }
}

/// Bonferroni-adjusted p-values (`min(1, p · m)`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bonferroni_correction(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len() as f64;
    p_values.iter().map(|p| (p * m).min(1.0)).collect()
}

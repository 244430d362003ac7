//! Property-based tests for the statistics engine
//!
//! - Test mathematical invariants
//! - Run with ProptestConfig::with_cases(100)

use anchorlab::stats::{
    bonferroni_correction, bootstrap_mean_ci, bootstrap_mean_difference_ci,
    compute_descriptive_stats, compute_five_number_summary, welch_t_test_two_sided,
    BootstrapConfig,
};
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Plausible sentence lengths in months.
fn arb_sample(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(0.0f64..120.0, 2..max_len)
}

fn small_bootstrap(seed: u64) -> BootstrapConfig {
    BootstrapConfig {
        iterations: 200,
        ..BootstrapConfig::with_seed(seed)
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: five-number summary is ordered
    #[test]
    fn prop_five_number_summary_is_ordered(values in arb_sample(50)) {
        let s = compute_five_number_summary(&values);
        prop_assert!(s.min <= s.q1);
        prop_assert!(s.q1 <= s.median);
        prop_assert!(s.median <= s.q3);
        prop_assert!(s.q3 <= s.max);
    }

    /// Property: mean lies within [min, max]
    #[test]
    fn prop_mean_within_range(values in arb_sample(50)) {
        let stats = compute_descriptive_stats(&values);
        let s = compute_five_number_summary(&values);
        prop_assert!(stats.mean >= s.min - 1e-9 && stats.mean <= s.max + 1e-9);
        prop_assert!(stats.std_dev >= 0.0);
    }

    /// Property: same seed, same interval (bit-identical)
    #[test]
    fn prop_bootstrap_is_reproducible(
        a in arb_sample(30),
        b in arb_sample(30),
        seed in any::<u64>(),
    ) {
        let config = small_bootstrap(seed);
        let first = bootstrap_mean_difference_ci(&a, &b, &config).unwrap();
        let second = bootstrap_mean_difference_ci(&a, &b, &config).unwrap();
        prop_assert_eq!(first.lower.to_bits(), second.lower.to_bits());
        prop_assert_eq!(first.upper.to_bits(), second.upper.to_bits());
    }

    /// Property: bootstrap bounds are ordered and inside the sample range
    #[test]
    fn prop_bootstrap_mean_ci_bounds(values in arb_sample(30), seed in any::<u64>()) {
        let ci = bootstrap_mean_ci(&values, &small_bootstrap(seed)).unwrap();
        let s = compute_five_number_summary(&values);
        prop_assert!(ci.lower <= ci.upper);
        prop_assert!(ci.lower >= s.min - 1e-9);
        prop_assert!(ci.upper <= s.max + 1e-9);
    }

    /// Property: p-values are probabilities
    #[test]
    fn prop_welch_p_value_in_unit_interval(a in arb_sample(30), b in arb_sample(30)) {
        let result = welch_t_test_two_sided(&a, &b);
        if !result.p_value.is_nan() {
            prop_assert!((0.0..=1.0).contains(&result.p_value));
        }
    }

    /// Property: Welch's test is antisymmetric in its arguments
    #[test]
    fn prop_welch_swap_negates_t(a in arb_sample(30), b in arb_sample(30)) {
        let ab = welch_t_test_two_sided(&a, &b);
        let ba = welch_t_test_two_sided(&b, &a);
        if ab.t.is_finite() {
            prop_assert!((ab.t + ba.t).abs() < 1e-9);
            prop_assert!((ab.p_value - ba.p_value).abs() < 1e-9);
        }
    }

    /// Property: Bonferroni never lowers a p-value and caps at 1
    #[test]
    fn prop_bonferroni_monotone(ps in proptest::collection::vec(0.0f64..=1.0, 1..20)) {
        let adjusted = bonferroni_correction(&ps);
        prop_assert_eq!(adjusted.len(), ps.len());
        for (raw, adj) in ps.iter().zip(&adjusted) {
            prop_assert!(adj >= raw);
            prop_assert!(*adj <= 1.0);
        }
    }
}

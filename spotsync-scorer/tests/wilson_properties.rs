//! Property-based tests for the Wilson lower bound.
//!
//! - **Monotonicity:** for a fixed rating count, a higher rating sum never
//!   lowers the bound.
//! - **Range:** the bound stays within `0.0..=5.0` and never exceeds the
//!   mean rating.
#![expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "properties compare floating-point bounds"
)]

use proptest::prelude::*;
use spotsync_core::RatingStats;
use spotsync_scorer::{RatingStatsExt, wilson_lower_bound};

const TOLERANCE: f64 = 1e-12;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: raising the mean rating at a fixed count never lowers the
    /// Wilson bound.
    #[test]
    fn bound_is_monotonic_in_the_mean(
        count in 1_u64..500,
        low in 0.0_f64..=5.0,
        high in 0.0_f64..=5.0,
    ) {
        let (low_mean, high_mean) = if low <= high { (low, high) } else { (high, low) };
        let n = count as f64;
        let lower = wilson_lower_bound(low_mean * n, count);
        let upper = wilson_lower_bound(high_mean * n, count);
        prop_assert!(
            lower <= upper + TOLERANCE,
            "mean {low_mean} gave {lower} but mean {high_mean} gave {upper}"
        );
    }

    /// Property: derived statistics stay in range and the bound never
    /// exceeds the observed mean.
    #[test]
    fn stats_stay_in_range(values in prop::collection::vec(0.0_f64..=5.0, 0..64)) {
        let stats = RatingStats::from_values(&values);
        prop_assert_eq!(stats.rating_count, values.len() as u64);
        prop_assert!((0.0..=5.0).contains(&stats.wilson_lower_bound));
        prop_assert!((0.0..=5.0).contains(&stats.average_rating));
        prop_assert!(stats.wilson_lower_bound <= stats.average_rating + TOLERANCE);
        if values.is_empty() {
            prop_assert_eq!(stats, RatingStats::ZERO);
        }
    }
}

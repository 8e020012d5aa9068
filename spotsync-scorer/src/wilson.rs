//! Wilson score lower bound on five-star ratings.
//!
//! Ratings are treated as a proportion of the maximum score: `sum / (5n)`.
//! The 95% lower confidence bound of that proportion is rescaled back to
//! the `0.0..=5.0` range so it can be compared with raw ratings.
#![forbid(unsafe_code)]

use spotsync_core::{MAX_RATING, RatingStats};

/// Normal quantile for a two-sided 95% confidence interval.
pub const Z_95: f64 = 1.96;

/// Wilson lower bound for `count` ratings adding up to `sum`.
///
/// Returns `0.0` when there are no ratings or when every rating is zero.
///
/// # Examples
/// ```
/// use spotsync_scorer::wilson_lower_bound;
///
/// assert_eq!(wilson_lower_bound(0.0, 0), 0.0);
/// let few = wilson_lower_bound(10.0, 2);
/// let many = wilson_lower_bound(500.0, 100);
/// assert!(few < many);
/// assert!(many < 5.0);
/// ```
#[must_use]
#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "the Wilson interval is defined over floating-point proportions"
)]
pub fn wilson_lower_bound(sum: f64, count: u64) -> f64 {
    if count == 0 || sum <= 0.0 {
        return 0.0;
    }
    let n = count as f64;
    let p = (sum / (MAX_RATING * n)).clamp(0.0, 1.0);
    let z2 = Z_95 * Z_95;
    let centre = p + z2 / (2.0 * n);
    let margin = Z_95 * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();
    let lower = (centre - margin) / (1.0 + z2 / n);
    (lower * MAX_RATING).clamp(0.0, MAX_RATING)
}

/// Statistics derived from raw rating values.
pub trait RatingStatsExt {
    /// Clamp each value to `0.0..=5.0` and derive count, mean, and Wilson
    /// bound. An empty slice yields [`RatingStats::ZERO`].
    fn from_values(values: &[f64]) -> RatingStats;
}

impl RatingStatsExt for RatingStats {
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "the mean divides the rating sum by the count"
    )]
    fn from_values(values: &[f64]) -> RatingStats {
        if values.is_empty() {
            return Self::ZERO;
        }
        let sum: f64 = values.iter().copied().map(clamp_rating).sum();
        let rating_count = u64::try_from(values.len()).unwrap_or(u64::MAX);
        Self {
            average_rating: sum / rating_count as f64,
            rating_count,
            wilson_lower_bound: wilson_lower_bound(sum, rating_count),
        }
    }
}

const fn clamp_rating(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_RATING)
    }
}

//! Viewport bounds and the rating tiers used by ranked queries.

use std::cmp::Ordering;

use geo::{Coord, Rect};
use thiserror::Error;

use crate::{RatingStats, Spot};

/// A latitude/longitude viewport.
///
/// When `min_lng > max_lng` the box crosses the antimeridian and covers
/// `min_lng..=180` plus `-180..=max_lng`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoBounds {
    /// Southern edge in degrees.
    pub min_lat: f64,
    /// Northern edge in degrees.
    pub max_lat: f64,
    /// Western edge in degrees.
    pub min_lng: f64,
    /// Eastern edge in degrees.
    pub max_lng: f64,
}

/// Errors returned by [`GeoBounds::new`].
#[derive(Debug, Error, PartialEq)]
pub enum BoundsError {
    /// A coordinate was NaN or infinite.
    #[error("bounds must be finite")]
    NotFinite,
    /// Latitudes were outside `-90..=90` or inverted.
    #[error("invalid latitude range {min_lat}..{max_lat}")]
    Latitude {
        /// Southern edge.
        min_lat: f64,
        /// Northern edge.
        max_lat: f64,
    },
    /// A longitude was outside `-180..=180`.
    #[error("longitude {value} is outside -180..=180")]
    Longitude {
        /// Offending value.
        value: f64,
    },
}

impl GeoBounds {
    /// Validate and build a viewport.
    ///
    /// # Examples
    /// ```
    /// use spotsync_core::GeoBounds;
    ///
    /// let pacific = GeoBounds::new(-10.0, 10.0, 170.0, -170.0)?;
    /// assert!(pacific.crosses_antimeridian());
    /// assert_eq!(pacific.rects().len(), 2);
    /// # Ok::<(), spotsync_core::BoundsError>(())
    /// ```
    pub fn new(
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> Result<Self, BoundsError> {
        if ![min_lat, max_lat, min_lng, max_lng]
            .iter()
            .all(|value| value.is_finite())
        {
            return Err(BoundsError::NotFinite);
        }
        if min_lat > max_lat || min_lat < -90.0 || max_lat > 90.0 {
            return Err(BoundsError::Latitude { min_lat, max_lat });
        }
        for value in [min_lng, max_lng] {
            if !(-180.0..=180.0).contains(&value) {
                return Err(BoundsError::Longitude { value });
            }
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Report whether the box wraps across the 180th meridian.
    #[must_use]
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lng > self.max_lng
    }

    /// Axis-aligned rectangles covering the box: one, or two when it
    /// crosses the antimeridian (eastern side first).
    #[must_use]
    pub fn rects(&self) -> Vec<Rect<f64>> {
        if self.crosses_antimeridian() {
            vec![
                Rect::new(
                    Coord { x: self.min_lng, y: self.min_lat },
                    Coord { x: 180.0, y: self.max_lat },
                ),
                Rect::new(
                    Coord { x: -180.0, y: self.min_lat },
                    Coord { x: self.max_lng, y: self.max_lat },
                ),
            ]
        } else {
            vec![Rect::new(
                Coord { x: self.min_lng, y: self.min_lat },
                Coord { x: self.max_lng, y: self.max_lat },
            )]
        }
    }

    /// Boundary-inclusive containment test.
    #[must_use]
    pub fn contains(&self, location: Coord<f64>) -> bool {
        self.rects().iter().any(|rect| rect_contains(rect, location))
    }
}

/// Boundary-inclusive containment of a point in a rectangle.
#[must_use]
pub fn rect_contains(rect: &Rect<f64>, location: Coord<f64>) -> bool {
    let (min, max) = (rect.min(), rect.max());
    (min.x..=max.x).contains(&location.x) && (min.y..=max.y).contains(&location.y)
}

/// One of the three ranked partitions of a bounds query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Tier {
    /// Wilson bound strictly above the pivot.
    Above,
    /// Wilson bound exactly zero.
    Unrated,
    /// Wilson bound in `(0, pivot]`.
    Below,
}

impl Tier {
    /// Tiers in the order they are filled.
    pub const ALL: [Self; 3] = [Self::Above, Self::Unrated, Self::Below];

    /// Report whether statistics belong to this tier for `pivot`.
    ///
    /// # Examples
    /// ```
    /// use spotsync_core::{RatingStats, Tier};
    ///
    /// let stats = RatingStats { average_rating: 4.0, rating_count: 3, wilson_lower_bound: 2.0 };
    /// assert!(Tier::Above.admits(&stats, 1.5));
    /// assert!(Tier::Below.admits(&stats, 2.0));
    /// assert!(!Tier::Unrated.admits(&stats, 2.0));
    /// ```
    #[must_use]
    pub fn admits(self, stats: &RatingStats, pivot: f64) -> bool {
        let wilson = stats.wilson_lower_bound;
        match self {
            Self::Above => wilson > pivot && wilson > 0.0,
            Self::Unrated => wilson == 0.0,
            Self::Below => wilson > 0.0 && wilson <= pivot,
        }
    }

    /// Result ordering within the tier.
    ///
    /// Rated tiers sort by Wilson bound descending, the unrated tier by the
    /// spot's random value ascending. Ties fall back to the id.
    #[must_use]
    pub fn compare(self, left: &Spot, right: &Spot) -> Ordering {
        let primary = match self {
            Self::Above | Self::Below => right
                .rating
                .wilson_lower_bound
                .total_cmp(&left.rating.wilson_lower_bound),
            Self::Unrated => left.random.total_cmp(&right.random),
        };
        primary.then_with(|| left.id.cmp(&right.id))
    }
}

/// A bounded read of one tier inside one rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierQuery {
    /// Partition to read.
    pub tier: Tier,
    /// Global average Wilson bound separating above from below.
    pub pivot: f64,
    /// Maximum number of spots to return.
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(10.0, -10.0, 0.0, 1.0)]
    #[case(-91.0, 0.0, 0.0, 1.0)]
    #[case(0.0, 91.0, 0.0, 1.0)]
    fn rejects_bad_latitudes(
        #[case] min_lat: f64,
        #[case] max_lat: f64,
        #[case] min_lng: f64,
        #[case] max_lng: f64,
    ) {
        assert!(matches!(
            GeoBounds::new(min_lat, max_lat, min_lng, max_lng),
            Err(BoundsError::Latitude { .. })
        ));
    }

    #[rstest]
    fn rejects_non_finite_values() {
        assert_eq!(
            GeoBounds::new(0.0, f64::NAN, 0.0, 1.0),
            Err(BoundsError::NotFinite)
        );
    }

    #[rstest]
    fn splits_antimeridian_boxes() {
        let bounds = GeoBounds::new(-5.0, 5.0, 170.0, -170.0).expect("valid bounds");
        let rects = bounds.rects();
        assert_eq!(rects.len(), 2);
        assert!(bounds.contains(Coord { x: 175.0, y: 0.0 }));
        assert!(bounds.contains(Coord { x: -175.0, y: 0.0 }));
        assert!(bounds.contains(Coord { x: 180.0, y: 5.0 }));
        assert!(!bounds.contains(Coord { x: 0.0, y: 0.0 }));
    }

    #[rstest]
    #[case(Tier::Above, 2.0, 1.0, true)]
    #[case(Tier::Above, 1.0, 1.0, false)]
    #[case(Tier::Below, 1.0, 1.0, true)]
    #[case(Tier::Below, 0.0, 1.0, false)]
    #[case(Tier::Unrated, 0.0, 1.0, true)]
    #[case(Tier::Unrated, 0.5, 1.0, false)]
    #[case(Tier::Above, 0.0, -1.0, false)]
    fn tiers_partition_by_pivot(
        #[case] tier: Tier,
        #[case] wilson: f64,
        #[case] pivot: f64,
        #[case] expected: bool,
    ) {
        let stats = RatingStats {
            wilson_lower_bound: wilson,
            ..RatingStats::ZERO
        };
        assert_eq!(tier.admits(&stats, pivot), expected);
    }
}

//! User ratings attached to spots.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::SpotId;

/// Largest rating value a user may submit.
pub const MAX_RATING: f64 = 5.0;

/// Store-assigned identifier of a [`Rating`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RatingId(pub u64);

impl fmt::Display for RatingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single user rating.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rating {
    /// Store-assigned identifier.
    pub id: RatingId,
    /// Rated spot.
    pub spot_id: SpotId,
    /// Value in `0.0..=5.0`.
    pub value: f64,
    /// Opaque identifier of the author.
    pub author_id: String,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

/// Errors returned by [`RatingDraft::new`].
#[derive(Debug, Error, PartialEq)]
pub enum RatingError {
    /// The value was outside `0.0..=5.0` or not a number.
    #[error("rating {value} is outside 0..=5")]
    OutOfRange {
        /// Rejected value.
        value: f64,
    },
}

/// A rating that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingDraft {
    /// Rated spot.
    pub spot_id: SpotId,
    /// Value in `0.0..=5.0`.
    pub value: f64,
    /// Opaque identifier of the author.
    pub author_id: String,
}

impl RatingDraft {
    /// Validate the value range and build a draft.
    ///
    /// # Examples
    /// ```
    /// use spotsync_core::{RatingDraft, SpotId};
    ///
    /// assert!(RatingDraft::new(SpotId(1), 4.5, "user-1").is_ok());
    /// assert!(RatingDraft::new(SpotId(1), 5.5, "user-1").is_err());
    /// ```
    pub fn new(
        spot_id: SpotId,
        value: f64,
        author_id: impl Into<String>,
    ) -> Result<Self, RatingError> {
        if !(0.0..=MAX_RATING).contains(&value) {
            return Err(RatingError::OutOfRange { value });
        }
        Ok(Self {
            spot_id,
            value,
            author_id: author_id.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(2.5)]
    #[case(5.0)]
    fn accepts_values_in_range(#[case] value: f64) {
        assert!(RatingDraft::new(SpotId(1), value, "a").is_ok());
    }

    #[rstest]
    #[case(-0.1)]
    #[case(5.01)]
    #[case(f64::NAN)]
    fn rejects_values_out_of_range(#[case] value: f64) {
        assert!(matches!(
            RatingDraft::new(SpotId(1), value, "a"),
            Err(RatingError::OutOfRange { .. })
        ));
    }
}

//! Incremental maintenance of per-spot rating statistics.
//!
//! The aggregator never trusts cached counters: every change triggers a full
//! recomputation from the ratings currently stored for the affected spots.
#![forbid(unsafe_code)]

use log::{debug, info, warn};
use serde::Serialize;
use spotsync_core::{RatingStats, RatingStore, SpotId, SpotStore};

use crate::{RatingStatsExt, ScorerError};

/// A rating mutation the aggregator must react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingChange {
    /// A rating was added to `spot`.
    Created {
        /// Rated spot.
        spot: SpotId,
    },
    /// A rating was edited and possibly moved to another spot.
    Updated {
        /// Spot the rating belonged to before the edit.
        previous_spot: SpotId,
        /// Spot the rating belongs to now.
        spot: SpotId,
    },
    /// A rating was removed from `spot`.
    Deleted {
        /// Spot that lost the rating.
        spot: SpotId,
    },
}

impl RatingChange {
    /// Spots whose statistics the change invalidates, without duplicates.
    #[must_use]
    pub fn affected_spots(&self) -> Vec<SpotId> {
        match *self {
            Self::Created { spot } | Self::Deleted { spot } => vec![spot],
            Self::Updated {
                previous_spot,
                spot,
            } if previous_spot != spot => vec![previous_spot, spot],
            Self::Updated { spot, .. } => vec![spot],
        }
    }
}

/// Outcome of [`RatingAggregator::recompute_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeReport {
    /// Spots whose statistics were rewritten.
    pub recomputed: u64,
    /// Spots that could not be recomputed.
    pub failed: Vec<SpotId>,
}

/// Recomputes [`RatingStats`] from stored ratings and writes them onto spots.
#[derive(Clone, Copy)]
pub struct RatingAggregator<'a> {
    spots: &'a dyn SpotStore,
    ratings: &'a dyn RatingStore,
}

impl<'a> RatingAggregator<'a> {
    /// Build an aggregator over the given stores.
    #[must_use]
    pub const fn new(spots: &'a dyn SpotStore, ratings: &'a dyn RatingStore) -> Self {
        Self { spots, ratings }
    }

    /// Recompute and store the statistics of one spot.
    ///
    /// A spot without ratings is reset to [`RatingStats::ZERO`].
    ///
    /// # Errors
    /// Returns [`ScorerError::Store`] when reading the ratings or writing the
    /// statistics fails.
    pub fn recompute(&self, spot: SpotId) -> Result<RatingStats, ScorerError> {
        let values: Vec<f64> = self
            .ratings
            .ratings_for_spot(spot)
            .map_err(ScorerError::store("ratings_for_spot"))?
            .iter()
            .map(|rating| rating.value)
            .collect();
        let stats = RatingStats::from_values(&values);
        self.spots
            .set_rating_stats(spot, stats)
            .map_err(ScorerError::store("set_rating_stats"))?;
        debug!(
            "spot {spot}: {} ratings, wilson {:.4}",
            stats.rating_count, stats.wilson_lower_bound
        );
        Ok(stats)
    }

    /// Recompute every spot affected by `change`.
    ///
    /// # Errors
    /// Stops at and returns the first [`ScorerError`]; spots recomputed
    /// before it keep their new statistics.
    pub fn on_rating_changed(
        &self,
        change: RatingChange,
    ) -> Result<Vec<(SpotId, RatingStats)>, ScorerError> {
        change
            .affected_spots()
            .into_iter()
            .map(|spot| self.recompute(spot).map(|stats| (spot, stats)))
            .collect()
    }

    /// Recompute every spot with at least one rating.
    ///
    /// Individual failures are logged and reported, not propagated. Running
    /// it twice over unchanged ratings writes the same statistics.
    ///
    /// # Errors
    /// Returns [`ScorerError::Store`] only when the rated spots cannot be
    /// listed.
    pub fn recompute_all(&self) -> Result<RecomputeReport, ScorerError> {
        let ids = self
            .ratings
            .rated_spot_ids()
            .map_err(ScorerError::store("rated_spot_ids"))?;
        let mut report = RecomputeReport::default();
        for id in ids {
            match self.recompute(id) {
                Ok(_) => report.recomputed = report.recomputed.saturating_add(1),
                Err(err) => {
                    warn!("failed to recompute ratings of spot {id}: {err}");
                    report.failed.push(id);
                }
            }
        }
        info!(
            "recomputed ratings for {} spots ({} failed)",
            report.recomputed,
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RatingChange::Created { spot: SpotId(1) }, vec![SpotId(1)])]
    #[case(RatingChange::Deleted { spot: SpotId(2) }, vec![SpotId(2)])]
    #[case(
        RatingChange::Updated { previous_spot: SpotId(3), spot: SpotId(3) },
        vec![SpotId(3)]
    )]
    #[case(
        RatingChange::Updated { previous_spot: SpotId(3), spot: SpotId(4) },
        vec![SpotId(3), SpotId(4)]
    )]
    fn lists_affected_spots(#[case] change: RatingChange, #[case] expected: Vec<SpotId>) {
        assert_eq!(change.affected_spots(), expected);
    }
}

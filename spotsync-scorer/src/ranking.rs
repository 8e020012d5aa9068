//! Ranked viewport queries.
//!
//! Results come from three tiers filled strictly in order: spots rated above
//! the global average pivot, unrated spots in their precomputed random
//! order, then rated spots at or below the pivot. Each tier is only asked
//! for the budget the earlier tiers left over. Viewports crossing the
//! antimeridian are read as two rectangles on parallel threads, each side
//! receiving half of the remaining budget rounded up.
#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::thread;

use geo::Rect;
use log::{debug, warn};
use serde::Serialize;
use spotsync_core::{GeoBounds, Spot, SpotStore, Tier, TierQuery};

use crate::ScorerError;

/// Largest number of spots a single query returns.
pub const MAX_LIMIT: usize = 200;

/// `total_count` reported when the count-only read fails.
pub const UNKNOWN_TOTAL_COUNT: i64 = -1;

/// A viewport and the number of spots wanted from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsQuery {
    /// Viewport to search.
    pub bounds: GeoBounds,
    /// Requested result cap; values above [`MAX_LIMIT`] are lowered to it.
    pub limit: usize,
}

impl BoundsQuery {
    /// Pair a viewport with a result cap.
    #[must_use]
    pub const fn new(bounds: GeoBounds, limit: usize) -> Self {
        Self { bounds, limit }
    }

    /// Result cap after applying [`MAX_LIMIT`].
    #[must_use]
    pub const fn effective_limit(&self) -> usize {
        if self.limit > MAX_LIMIT {
            MAX_LIMIT
        } else {
            self.limit
        }
    }
}

/// Answer to a [`BoundsQuery`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSpots {
    /// Spots in tier order.
    pub spots: Vec<Spot>,
    /// Public spots inside the viewport regardless of the cap, or
    /// [`UNKNOWN_TOTAL_COUNT`].
    pub total_count: i64,
    /// Number of entries in `spots`.
    pub shown_count: usize,
    /// Pivot separating the above and below tiers.
    pub average_wilson: f64,
}

/// Serves [`BoundsQuery`] requests from a [`SpotStore`].
///
/// The pivot is read from [`SpotStore::global_average_wilson`] on every
/// query. It is maintained outside this crate and may lag behind the
/// current ratings; queries use whatever value is stored.
#[derive(Clone, Copy)]
pub struct RankingEngine<'a> {
    spots: &'a dyn SpotStore,
}

impl<'a> RankingEngine<'a> {
    /// Build an engine reading from `spots`.
    #[must_use]
    pub const fn new(spots: &'a dyn SpotStore) -> Self {
        Self { spots }
    }

    /// Run a ranked viewport query.
    ///
    /// # Errors
    /// Returns [`ScorerError::Store`] when the pivot or a tier cannot be
    /// read, and [`ScorerError::WorkerPanicked`] when a viewport side's
    /// worker thread panics. A failing count does not fail the query.
    ///
    /// # Examples
    /// ```
    /// use spotsync_core::GeoBounds;
    /// use spotsync_core::test_support::{MemoryStore, spot_draft};
    /// use spotsync_scorer::{BoundsQuery, RankingEngine};
    ///
    /// let store = MemoryStore::with_spots([spot_draft("Ledge", 1.0, 1.0)]);
    /// let bounds = GeoBounds::new(0.0, 2.0, 0.0, 2.0)?;
    /// let ranked = RankingEngine::new(&store).query(&BoundsQuery::new(bounds, 10))?;
    /// assert_eq!(ranked.shown_count, 1);
    /// assert_eq!(ranked.total_count, 1);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn query(&self, query: &BoundsQuery) -> Result<RankedSpots, ScorerError> {
        let limit = query.effective_limit();
        let pivot = self
            .spots
            .global_average_wilson()
            .map_err(ScorerError::store("global_average_wilson"))?;
        let rects = query.bounds.rects();

        let mut spots: Vec<Spot> = Vec::with_capacity(limit);
        for tier in Tier::ALL {
            let remaining = limit.saturating_sub(spots.len());
            if remaining == 0 {
                break;
            }
            let tier_query = TierQuery {
                tier,
                pivot,
                limit: remaining,
            };
            let found = self.read_tier(&rects, &tier_query)?;
            debug!("{} tier returned {} spots", tier_label(tier), found.len());
            spots.extend(found);
        }

        Ok(RankedSpots {
            shown_count: spots.len(),
            spots,
            total_count: self.total_count(&rects),
            average_wilson: pivot,
        })
    }

    fn read_tier(&self, rects: &[Rect<f64>], query: &TierQuery) -> Result<Vec<Spot>, ScorerError> {
        if let [east, west] = rects {
            return self.read_split(east, west, query);
        }
        let mut found = Vec::new();
        for rect in rects {
            found.extend(
                self.spots
                    .spots_in_tier(rect, query)
                    .map_err(ScorerError::store("spots_in_tier"))?,
            );
        }
        Ok(found)
    }

    fn read_split(
        &self,
        east: &Rect<f64>,
        west: &Rect<f64>,
        query: &TierQuery,
    ) -> Result<Vec<Spot>, ScorerError> {
        let share = TierQuery {
            limit: query.limit.div_ceil(2),
            ..*query
        };
        let store = self.spots;
        let (east_joined, west_read) = thread::scope(|scope| {
            let east_worker = scope.spawn(|| store.spots_in_tier(east, &share));
            let west_read = store.spots_in_tier(west, &share);
            (east_worker.join(), west_read)
        });
        let east_spots = east_joined
            .map_err(|_| ScorerError::WorkerPanicked {
                tier: tier_label(query.tier),
            })?
            .map_err(ScorerError::store("spots_in_tier"))?;
        let west_spots = west_read.map_err(ScorerError::store("spots_in_tier"))?;
        Ok(merge_sides(query, east_spots, west_spots))
    }

    fn total_count(&self, rects: &[Rect<f64>]) -> i64 {
        let mut total: u64 = 0;
        for rect in rects {
            match self.spots.count_in_rect(rect) {
                Ok(count) => total = total.saturating_add(count),
                Err(err) => {
                    warn!("viewport count unavailable: {err}");
                    return UNKNOWN_TOTAL_COUNT;
                }
            }
        }
        i64::try_from(total).unwrap_or(i64::MAX)
    }
}

/// Union of both antimeridian sides without repeated ids, in tier order.
fn merge_sides(query: &TierQuery, east: Vec<Spot>, west: Vec<Spot>) -> Vec<Spot> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Spot> = east
        .into_iter()
        .chain(west)
        .filter(|spot| seen.insert(spot.id))
        .collect();
    merged.sort_by(|left, right| query.tier.compare(left, right));
    merged.truncate(query.limit);
    merged
}

const fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Above => "above",
        Tier::Unrated => "unrated",
        Tier::Below => "below",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use spotsync_core::RatingStats;
    use spotsync_core::test_support::{MemoryStore, spot_draft};

    fn rated(wilson: f64) -> RatingStats {
        RatingStats {
            average_rating: wilson,
            rating_count: 4,
            wilson_lower_bound: wilson,
        }
    }

    fn bounds(min_lng: f64, max_lng: f64) -> GeoBounds {
        GeoBounds::new(-10.0, 10.0, min_lng, max_lng).expect("valid bounds")
    }

    #[fixture]
    fn store() -> MemoryStore {
        MemoryStore::default()
    }

    fn insert(store: &MemoryStore, name: &str, lng: f64, wilson: f64, random: f64) -> Spot {
        let mut draft = spot_draft(name, 0.0, lng);
        draft.random = random;
        let spot = store.insert_spot(draft).expect("insert spot");
        store.force_rating(spot.id, rated(wilson));
        spot
    }

    fn names(ranked: &RankedSpots) -> Vec<&str> {
        ranked.spots.iter().map(|spot| spot.name.as_str()).collect()
    }

    #[rstest]
    fn fills_tiers_in_order(store: MemoryStore) {
        store.set_global_average_wilson(2.0).expect("set pivot");
        insert(&store, "low", 1.0, 1.5, 0.1);
        insert(&store, "fresh-b", 1.0, 0.0, 0.9);
        insert(&store, "top", 1.0, 4.0, 0.5);
        insert(&store, "fresh-a", 1.0, 0.0, 0.2);
        insert(&store, "good", 1.0, 3.0, 0.5);
        insert(&store, "pivot", 1.0, 2.0, 0.5);

        let ranked = RankingEngine::new(&store)
            .query(&BoundsQuery::new(bounds(0.0, 2.0), 50))
            .expect("query");

        assert_eq!(
            names(&ranked),
            vec!["top", "good", "fresh-a", "fresh-b", "pivot", "low"]
        );
        assert_eq!(ranked.shown_count, 6);
        assert_eq!(ranked.total_count, 6);
        assert_eq!(ranked.average_wilson, 2.0);
    }

    #[rstest]
    fn later_tiers_only_get_the_remaining_budget(store: MemoryStore) {
        store.set_global_average_wilson(1.0).expect("set pivot");
        insert(&store, "a", 1.0, 3.0, 0.5);
        insert(&store, "b", 1.0, 2.0, 0.5);
        insert(&store, "unrated", 1.0, 0.0, 0.5);

        let ranked = RankingEngine::new(&store)
            .query(&BoundsQuery::new(bounds(0.0, 2.0), 2))
            .expect("query");

        assert_eq!(names(&ranked), vec!["a", "b"]);
        assert_eq!(ranked.total_count, 3);
    }

    #[rstest]
    fn caps_the_limit(store: MemoryStore) {
        for index in 0..205 {
            insert(&store, &format!("spot-{index}"), 1.0, 0.0, 0.5);
        }
        let query = BoundsQuery::new(bounds(0.0, 2.0), 1_000);
        assert_eq!(query.effective_limit(), MAX_LIMIT);

        let ranked = RankingEngine::new(&store).query(&query).expect("query");

        assert_eq!(ranked.shown_count, MAX_LIMIT);
        assert_eq!(ranked.total_count, 205);
    }

    #[rstest]
    fn zero_limit_returns_only_the_count(store: MemoryStore) {
        insert(&store, "a", 1.0, 3.0, 0.5);
        let ranked = RankingEngine::new(&store)
            .query(&BoundsQuery::new(bounds(0.0, 2.0), 0))
            .expect("query");
        assert!(ranked.spots.is_empty());
        assert_eq!(ranked.total_count, 1);
    }

    #[rstest]
    fn antimeridian_sides_share_the_budget(store: MemoryStore) {
        for index in 0..3 {
            insert(&store, &format!("east-{index}"), 175.0, 0.0, 0.1);
            insert(&store, &format!("west-{index}"), -175.0, 0.0, 0.2);
        }
        insert(&store, "far", 0.0, 0.0, 0.0);

        let ranked = RankingEngine::new(&store)
            .query(&BoundsQuery::new(bounds(170.0, -170.0), 3))
            .expect("query");

        // Each side may contribute at most ceil(3 / 2) = 2 spots.
        assert_eq!(names(&ranked), vec!["east-0", "east-1", "west-0"]);
        assert_eq!(ranked.total_count, 6);
    }

    #[rstest]
    fn unknown_count_does_not_fail_the_query(store: MemoryStore) {
        insert(&store, "a", 1.0, 0.0, 0.5);
        store.set_fail_counts(true);

        let ranked = RankingEngine::new(&store)
            .query(&BoundsQuery::new(bounds(0.0, 2.0), 10))
            .expect("query");

        assert_eq!(ranked.total_count, UNKNOWN_TOTAL_COUNT);
        assert_eq!(ranked.shown_count, 1);
    }

    #[rstest]
    fn merge_removes_repeated_ids(store: MemoryStore) {
        let spot = insert(&store, "edge", 180.0, 0.0, 0.5);
        let query = TierQuery {
            tier: Tier::Unrated,
            pivot: 0.0,
            limit: 10,
        };
        let merged = merge_sides(&query, vec![spot.clone()], vec![spot]);
        assert_eq!(merged.len(), 1);
    }
}

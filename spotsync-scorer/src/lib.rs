//! Rating aggregation and ranked viewport queries for spotsync.
//!
//! The crate provides two complementary capabilities:
//! - **Rating aggregation** keeps each spot's [`RatingStats`] in step with
//!   its stored ratings. Quality is summarised by the 95% Wilson lower bound
//!   on the share of the maximum score, so a handful of five-star ratings
//!   ranks below a large body of consistently good ones.
//! - **Ranked viewport queries** return the best spots inside a map
//!   viewport, split into above-average, unrated, and below-average tiers
//!   around an externally maintained global average.
//!
//! # Examples
//!
//! ```
//! use spotsync_core::test_support::{MemoryStore, spot_draft};
//! use spotsync_core::{RatingDraft, RatingStore, SpotStore};
//! use spotsync_scorer::{RatingAggregator, RatingChange};
//!
//! let store = MemoryStore::default();
//! let spot = store.insert_spot(spot_draft("Ledge", 1.0, 1.0))?;
//! store.insert_rating(RatingDraft::new(spot.id, 4.0, "user-1")?)?;
//!
//! let aggregator = RatingAggregator::new(&store, &store);
//! let updated = aggregator.on_rating_changed(RatingChange::Created { spot: spot.id })?;
//! assert_eq!(updated[0].1.rating_count, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`RatingStats`]: spotsync_core::RatingStats

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod aggregate;
mod error;
mod ranking;
mod wilson;

pub use aggregate::{RatingAggregator, RatingChange, RecomputeReport};
pub use error::ScorerError;
pub use ranking::{BoundsQuery, MAX_LIMIT, RankedSpots, RankingEngine, UNKNOWN_TOTAL_COUNT};
pub use wilson::{RatingStatsExt, Z_95, wilson_lower_bound};

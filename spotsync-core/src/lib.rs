//! Core domain types and persistence traits for spotsync.
//!
//! Spots are the canonical points of interest. Sources feed them in, users
//! rate them, and ranked viewport queries read them back. Constructors that
//! can reject input return `Result` so invalid records never reach a store.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bounds;
pub mod image_cache;
pub mod permission;
pub mod rating;
pub mod source;
pub mod spot;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use bounds::{BoundsError, GeoBounds, Tier, TierQuery, rect_contains};
pub use image_cache::ImageCacheEntry;
pub use permission::{Caller, PermissionError, Role, authorise};
pub use rating::{MAX_RATING, Rating, RatingDraft, RatingError, RatingId};
pub use source::{Source, SourceDraft, SourceDraftError, SourceId, SyncRecord, SyncStats};
pub use spot::{RatingStats, Spot, SpotDraft, SpotId, SpotImages, SpotImagesError};
#[cfg(feature = "store-sqlite")]
pub use store::{SCHEMA_VERSION, SqliteStore};
pub use store::{ImageCacheStore, RatingStore, SourceStore, SpotStore, StoreError};

//! Persistence traits for spots, sources, ratings, and the image cache.
//!
//! Each concern gets its own trait so components only depend on what they
//! touch: the sync orchestrator needs [`SpotStore`] and [`SourceStore`], the
//! rating aggregator [`RatingStore`] and [`SpotStore`], the image
//! deduplicator [`ImageCacheStore`]. Stores are shared by reference across
//! threads, so every trait requires `Send + Sync`.

use std::collections::HashSet;

use geo::{Coord, Rect};
use thiserror::Error;

use crate::{
    ImageCacheEntry, Rating, RatingDraft, RatingId, RatingStats, Source, SourceDraft, SourceId,
    Spot, SpotDraft, SpotId, SyncRecord, TierQuery,
};

#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::SCHEMA_VERSION;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteStore;

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Location of the database on disk.
        path: std::path::PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A SQLite statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("SQLite operation '{operation}' failed")]
    Sqlite {
        /// Description of the failing operation.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A JSON list column could not be encoded or decoded.
    #[cfg(feature = "serde")]
    #[error("failed to {operation} JSON column")]
    Json {
        /// Description of the failing operation.
        operation: &'static str,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The database schema was created by an incompatible version.
    #[error("expected schema version {expected} but found {found}")]
    SchemaVersion {
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
    /// The referenced spot does not exist.
    #[error("spot {id} does not exist")]
    MissingSpot {
        /// Identifier that was looked up.
        id: SpotId,
    },
    /// The referenced source does not exist.
    #[error("source {id} does not exist")]
    MissingSource {
        /// Identifier that was looked up.
        id: SourceId,
    },
    /// The referenced rating does not exist.
    #[error("rating {id} does not exist")]
    MissingRating {
        /// Identifier that was looked up.
        id: RatingId,
    },
    /// A stored row carried a value the domain types reject.
    #[error("stored row {id} is invalid: {reason}")]
    Corrupt {
        /// Row identifier.
        id: i64,
        /// What was wrong.
        reason: String,
    },
    /// An identifier does not fit the backend's integer type.
    #[error("identifier {id} is out of range for the store")]
    IdOutOfRange {
        /// Offending identifier.
        id: u64,
    },
    /// A lock guarding the store was poisoned by a panicking thread.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Read and write access to canonical spots.
///
/// Rectangles use WGS84 with `x = longitude` and `y = latitude`;
/// containment includes boundary points. Callers handling antimeridian
/// viewports split them into two rectangles first (see
/// [`GeoBounds::rects`](crate::GeoBounds::rects)).
pub trait SpotStore: Send + Sync {
    /// Fetch one spot.
    fn get_spot(&self, id: SpotId) -> Result<Option<Spot>, StoreError>;

    /// Find the spot a source produced at exactly `location`.
    ///
    /// Coordinates are compared with exact floating-point equality.
    fn find_by_source_location(
        &self,
        source: SourceId,
        location: Coord<f64>,
    ) -> Result<Option<Spot>, StoreError>;

    /// Insert a new spot with zero rating statistics.
    fn insert_spot(&self, draft: SpotDraft) -> Result<Spot, StoreError>;

    /// Rewrite the descriptive fields of an existing spot.
    ///
    /// Rating statistics, `random`, and `created_at` are never written by
    /// this call; the stored values win and are reflected in the returned
    /// spot.
    fn update_spot(&self, spot: &Spot) -> Result<Spot, StoreError>;

    /// Delete a spot. Returns `false` when it did not exist.
    fn delete_spot(&self, id: SpotId) -> Result<bool, StoreError>;

    /// Overwrite the derived rating statistics of a spot.
    fn set_rating_stats(&self, id: SpotId, stats: RatingStats) -> Result<(), StoreError>;

    /// Public spots inside `rect` that fall in the query's tier, ordered by
    /// the tier and truncated to its limit.
    fn spots_in_tier(&self, rect: &Rect<f64>, query: &TierQuery) -> Result<Vec<Spot>, StoreError>;

    /// Number of public spots inside `rect`.
    ///
    /// Spots with `is_public == false` are excluded, matching
    /// [`SpotStore::spots_in_tier`], so the total never counts spots a
    /// viewport query cannot return.
    fn count_in_rect(&self, rect: &Rect<f64>) -> Result<u64, StoreError>;

    /// The externally maintained pivot; `0.0` when never written.
    fn global_average_wilson(&self) -> Result<f64, StoreError>;

    /// Replace the pivot.
    fn set_global_average_wilson(&self, value: f64) -> Result<(), StoreError>;

    /// Every image hash referenced by any spot.
    fn referenced_image_hashes(&self) -> Result<HashSet<String>, StoreError>;

    /// Spots produced by one source, ordered by id.
    fn spots_for_source(&self, source: SourceId) -> Result<Vec<Spot>, StoreError>;
}

/// Read and write access to user ratings.
pub trait RatingStore: Send + Sync {
    /// Ratings of one spot.
    fn ratings_for_spot(&self, spot: SpotId) -> Result<Vec<Rating>, StoreError>;

    /// Distinct ids of spots with at least one rating, ascending.
    fn rated_spot_ids(&self) -> Result<Vec<SpotId>, StoreError>;

    /// Store a new rating.
    fn insert_rating(&self, draft: RatingDraft) -> Result<Rating, StoreError>;

    /// Replace a rating's spot and value, returning the previous rating.
    fn update_rating(&self, id: RatingId, draft: RatingDraft) -> Result<Rating, StoreError>;

    /// Delete a rating, returning it when it existed.
    fn delete_rating(&self, id: RatingId) -> Result<Option<Rating>, StoreError>;
}

/// Administrator-managed sources and their run history.
pub trait SourceStore: Send + Sync {
    /// Every source ordered by id.
    fn list_sources(&self) -> Result<Vec<Source>, StoreError>;

    /// Fetch one source.
    fn get_source(&self, id: SourceId) -> Result<Option<Source>, StoreError>;

    /// Store a new source.
    fn create_source(&self, draft: SourceDraft) -> Result<Source, StoreError>;

    /// Replace the administrator-managed fields of a source. Run history is
    /// preserved.
    fn update_source(&self, id: SourceId, draft: SourceDraft) -> Result<Source, StoreError>;

    /// Delete a source. Its spots remain and lose their source reference.
    fn delete_source(&self, id: SourceId) -> Result<bool, StoreError>;

    /// Write a run's outcome back onto the source.
    fn record_sync(&self, id: SourceId, record: &SyncRecord) -> Result<(), StoreError>;
}

/// URL to content-hash cache used by the image deduplicator.
pub trait ImageCacheStore: Send + Sync {
    /// Look up an entry by its encoded URL key.
    fn get_cache_entry(&self, key: &str) -> Result<Option<ImageCacheEntry>, StoreError>;

    /// Insert or replace an entry.
    fn put_cache_entry(&self, entry: &ImageCacheEntry) -> Result<(), StoreError>;

    /// Remove an entry. Returns `false` when it did not exist.
    fn delete_cache_entry(&self, key: &str) -> Result<bool, StoreError>;

    /// Every cached entry ordered by key.
    fn list_cache_entries(&self) -> Result<Vec<ImageCacheEntry>, StoreError>;
}

//! Facade crate for the spotsync pipeline.
//!
//! This crate re-exports the core domain types and exposes the ingestion
//! pipeline and ranking engine behind feature flags.

#![forbid(unsafe_code)]

pub use spotsync_core::{
    BoundsError, Caller, GeoBounds, ImageCacheStore, PermissionError, Rating, RatingDraft,
    RatingStats, RatingStore, Role, Source, SourceDraft, SourceId, SourceStore, Spot, SpotDraft,
    SpotId, SpotStore, StoreError, SyncStats, Tier, authorise,
};

#[cfg(feature = "store-sqlite")]
pub use spotsync_core::SqliteStore;

#[cfg(feature = "pipeline")]
pub use spotsync_data::{
    FeedFormat, Fetcher, Geocoder, ObjectStorage, Placemark, SyncConfig, SyncOrchestrator,
    SyncServices, detect_format, parse_feed,
};

#[cfg(feature = "ranking")]
pub use spotsync_scorer::{
    BoundsQuery, RankedSpots, RankingEngine, RatingAggregator, RatingChange, wilson_lower_bound,
};

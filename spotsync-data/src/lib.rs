//! Ingestion side of the spot pipeline.
//!
//! Responsibilities:
//! - Detect and parse KMZ, KML and GeoJSON exports into placemarks.
//! - Geocode placemarks between coordinates and addresses.
//! - Store referenced images once per distinct content.
//! - Synchronise sources into the spot store.
//!
//! Boundaries:
//! - Persistence goes through the store traits of `spotsync-core`.
//! - External services are reached only through [`transport::Fetcher`],
//!   [`geocoding::Geocoder`] and [`images::ObjectStorage`], so tests can
//!   swap in the doubles from [`test_support`].
//!
//! Invariants:
//! - No global mutable state; collaborators are passed in explicitly.
//! - A failing placemark or image never aborts its source run.

pub mod formats;
pub mod geocoding;
pub mod images;
pub mod markup;
pub mod sync;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

pub use formats::{FeedFormat, FormatError, Placemark, detect_format, parse_feed};
pub use geocoding::{GeocodeFailure, Geocoder, HttpGeocoder, HttpGeocoderConfig};
pub use images::{CleanupReport, ImageConfig, ImageDeduplicator, LocalObjectStorage, ObjectStorage};
pub use sync::{SyncAllReport, SyncConfig, SyncError, SyncOrchestrator, SyncServices};
pub use transport::{ConfigurationError, Fetcher, HttpFetcher, HttpFetcherConfig, TransportError};

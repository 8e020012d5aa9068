//! Source synchronisation: fetch, parse, geocode, store images, upsert.
//!
//! A run makes progress durable one placemark at a time, so a run cut short
//! by an external deadline leaves every processed placemark stored.
//! Placemark-level failures are counted and skipped; only failures that
//! prevent reading the feed at all abort the run of that source.

mod orchestrator;
mod sanitise;

use std::time::Duration;

use spotsync_core::{SourceId, StoreError, SyncStats};
use thiserror::Error;

use crate::formats::FormatError;
use crate::geocoding::GeocodeFailure;
use crate::images::ImageConfig;
use crate::transport::TransportError;

pub use self::orchestrator::{SyncOrchestrator, SyncServices, error_chain};
pub use self::sanitise::{SanitisedDescription, sanitise_description};

/// Tuning for synchronisation runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Placemarks handled per chunk.
    pub chunk_size: usize,
    /// Spacing between consecutive geocoder calls.
    pub geocode_delay: Duration,
    /// Seed for the `random` ordering value of new spots; entropy when unset.
    pub seed: Option<u64>,
    /// Image processing settings.
    pub images: ImageConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            geocode_delay: Duration::from_millis(200),
            seed: None,
            images: ImageConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Set the chunk size; zero is treated as one.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the spacing between geocoder calls.
    #[must_use]
    pub const fn with_geocode_delay(mut self, delay: Duration) -> Self {
        self.geocode_delay = delay;
        self
    }

    /// Make `random` values of new spots reproducible.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace the image settings.
    #[must_use]
    pub fn with_images(mut self, images: ImageConfig) -> Self {
        self.images = images;
        self
    }
}

/// Failures that abort the run of one source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The feed could not be downloaded.
    #[error("failed to fetch feed {url}")]
    Fetch {
        /// Feed URL.
        url: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// The feed could not be parsed.
    #[error("failed to parse feed {url}")]
    Format {
        /// Feed URL.
        url: String,
        /// Parser failure.
        #[source]
        source: FormatError,
    },
    /// A store operation outside any single placemark failed.
    #[error("store operation {operation} failed")]
    Store {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: StoreError,
    },
}

/// Failures that skip a single placemark.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlacemarkError {
    /// Coordinates or address details could not be geocoded.
    #[error("geocoding {name:?} failed")]
    Geocode {
        /// Placemark name.
        name: String,
        /// Geocoder failure.
        #[source]
        source: GeocodeFailure,
    },
    /// Reading or writing the spot failed.
    #[error("store operation {operation} failed for {name:?}")]
    Store {
        /// Placemark name.
        name: String,
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: StoreError,
    },
}

/// Result of one source within a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceRunReport {
    /// Source identifier.
    pub source: SourceId,
    /// Source name at run time.
    pub name: String,
    /// Counters, when the run completed.
    pub stats: Option<SyncStats>,
    /// Failure description, when the run aborted.
    pub error: Option<String>,
}

impl SourceRunReport {
    /// Report whether the source run completed.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of synchronising every active source.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncAllReport {
    /// Per-source outcomes in run order.
    pub sources: Vec<SourceRunReport>,
    /// Counters summed over completed runs.
    pub totals: SyncStats,
}

impl SyncAllReport {
    /// Number of sources whose run aborted.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.sources.iter().filter(|report| !report.succeeded()).count()
    }
}

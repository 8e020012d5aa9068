//! Content-addressed image storage for spot photos.
//!
//! Images referenced by feeds are downloaded, hashed with SHA-256, and
//! stored once per distinct content. A URL cache short-circuits repeat
//! downloads, and object names embed the content hash so identical bytes
//! from any source resolve to the same public URL.

mod cleanup;
mod dedup;
mod local;
mod naming;
mod optimise;
mod storage;

use spotsync_core::StoreError;
use thiserror::Error;

use crate::transport::TransportError;

pub use self::cleanup::{CleanupReport, cleanup};
pub use self::dedup::{ImageDeduplicator, content_hash};
pub use self::local::LocalObjectStorage;
pub use self::naming::{hash_from_object_name, object_name, slugify};
pub use self::optimise::optimise;
pub use self::storage::{ObjectStorage, StorageError};

/// Hosts whose image links expire, so URL caching would go stale.
pub const DEFAULT_EPHEMERAL_HOSTS: &[&str] =
    &["mymaps.usercontent.google.com", "lh3.googleusercontent.com"];

/// Prefix of every stored spot image.
pub const OBJECT_PREFIX: &str = "spots/";

/// Tuning for image processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    /// Images processed concurrently per group.
    pub group_size: usize,
    /// Maximum stored width in pixels.
    pub max_width: u32,
    /// Maximum stored height in pixels.
    pub max_height: u32,
    /// JPEG quality, `1..=100`.
    pub jpeg_quality: u8,
    /// Hosts that bypass the URL cache.
    pub ephemeral_hosts: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            group_size: 3,
            max_width: 1600,
            max_height: 1600,
            jpeg_quality: 82,
            ephemeral_hosts: DEFAULT_EPHEMERAL_HOSTS
                .iter()
                .map(|host| (*host).to_owned())
                .collect(),
        }
    }
}

impl ImageConfig {
    /// Set the concurrency group size; zero is treated as one.
    #[must_use]
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }

    /// Set the bounding box images are shrunk to fit.
    #[must_use]
    pub fn with_max_dimensions(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    /// Set the JPEG re-encoding quality.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Replace the list of hosts that bypass URL caching.
    #[must_use]
    pub fn with_ephemeral_hosts(mut self, hosts: impl IntoIterator<Item = String>) -> Self {
        self.ephemeral_hosts = hosts.into_iter().collect();
        self
    }

    /// Report whether `url` points at a host with expiring links.
    #[must_use]
    pub fn is_ephemeral(&self, url: &str) -> bool {
        url::Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| {
                self.ephemeral_hosts
                    .iter()
                    .any(|ephemeral| host.eq_ignore_ascii_case(ephemeral))
            })
    }
}

/// A stored image ready to attach to a spot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    /// URL the image is served from.
    pub public_url: String,
    /// SHA-256 hex digest of the original download.
    pub hash: String,
}

/// Failures affecting a single image.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImageError {
    /// The image could not be downloaded.
    #[error("failed to download image")]
    Download {
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// The download is not a decodable image.
    #[error("failed to decode image from {url}")]
    Decode {
        /// Original image URL.
        url: String,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },
    /// The object store rejected an operation.
    #[error("object storage failed during {operation}")]
    Storage {
        /// Storage operation that failed.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: StorageError,
    },
    /// Spot image references could not be loaded.
    #[error("failed to load image references")]
    References {
        /// Underlying error.
        #[source]
        source: StoreError,
    },
    /// The URL cache could not be read or written.
    #[error("image cache failed during {operation}")]
    Cache {
        /// Cache operation that failed.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: StoreError,
    },
}

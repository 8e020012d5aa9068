//! URL to content-hash cache entries kept by the image deduplicator.

use chrono::{DateTime, Utc};

/// Maps an original image URL onto the stored object holding its content.
///
/// `key` is the percent-encoded original URL so it is safe to use as a
/// document or row key. Entries whose object disappears are deleted on
/// sight by the deduplicator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageCacheEntry {
    /// Percent-encoded original URL.
    pub key: String,
    /// SHA-256 hex digest of the downloaded bytes.
    pub hash: String,
    /// Public URL of the stored object.
    pub public_url: String,
    /// Last time the entry was written or confirmed.
    pub last_checked: DateTime<Utc>,
}

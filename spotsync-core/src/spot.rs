//! Canonical spot records and their derived rating statistics.

use std::fmt;

use chrono::{DateTime, Utc};
use geo::Coord;
use thiserror::Error;

use crate::SourceId;

/// Store-assigned identifier of a [`Spot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SpotId(pub u64);

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quality statistics derived from a spot's ratings.
///
/// All three fields are zero for a spot without ratings. A zero
/// `wilson_lower_bound` marks the spot as unrated for ranking purposes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RatingStats {
    /// Mean of the clamped rating values.
    pub average_rating: f64,
    /// Number of ratings contributing to the statistics.
    pub rating_count: u64,
    /// 95% Wilson lower bound rescaled to the `0.0..=5.0` range.
    pub wilson_lower_bound: f64,
}

impl RatingStats {
    /// Statistics for a spot without ratings.
    pub const ZERO: Self = Self {
        average_rating: 0.0,
        rating_count: 0,
        wilson_lower_bound: 0.0,
    };

    /// Report whether the spot counts as unrated when ranking.
    #[must_use]
    pub fn is_unrated(&self) -> bool {
        self.wilson_lower_bound == 0.0
    }
}

/// Stored images of a spot.
///
/// Public URLs and content hashes are kept in parallel: `hashes[i]` is the
/// content hash of the object served at `urls[i]`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpotImages {
    urls: Vec<String>,
    hashes: Vec<String>,
}

/// Errors returned by [`SpotImages::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpotImagesError {
    /// The URL and hash lists differ in length.
    #[error("{urls} image urls paired with {hashes} hashes")]
    LengthMismatch {
        /// Number of URLs supplied.
        urls: usize,
        /// Number of hashes supplied.
        hashes: usize,
    },
}

impl SpotImages {
    /// Pair public URLs with their content hashes.
    ///
    /// # Examples
    /// ```
    /// use spotsync_core::SpotImages;
    ///
    /// let images = SpotImages::new(vec!["https://cdn/a.jpg".into()], vec!["ab12".into()])?;
    /// assert_eq!(images.len(), 1);
    /// assert!(SpotImages::new(vec![], vec!["ab12".into()]).is_err());
    /// # Ok::<(), spotsync_core::SpotImagesError>(())
    /// ```
    pub fn new(urls: Vec<String>, hashes: Vec<String>) -> Result<Self, SpotImagesError> {
        if urls.len() != hashes.len() {
            return Err(SpotImagesError::LengthMismatch {
                urls: urls.len(),
                hashes: hashes.len(),
            });
        }
        Ok(Self { urls, hashes })
    }

    /// Public URLs in display order.
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Content hashes aligned with [`SpotImages::urls`].
    #[must_use]
    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    /// Number of stored images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Report whether the spot has no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Iterate over `(url, hash)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.urls
            .iter()
            .map(String::as_str)
            .zip(self.hashes.iter().map(String::as_str))
    }

    /// Append an image, keeping both lists aligned.
    pub fn push(&mut self, url: String, hash: String) {
        self.urls.push(url);
        self.hashes.push(hash);
    }
}

/// A point of interest in the canonical store.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`. Rating
/// statistics, `random`, and `created_at` are owned by the store and the
/// rating aggregator; sync updates never overwrite them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spot {
    /// Store-assigned identifier.
    pub id: SpotId,
    /// Display name.
    pub name: String,
    /// Plain-text description with line breaks preserved.
    pub description: String,
    /// Geospatial position.
    pub location: Coord<f64>,
    /// Street address, when known.
    pub address: Option<String>,
    /// City or locality, when known.
    pub city: Option<String>,
    /// Two-letter country code, when known.
    pub country_code: Option<String>,
    /// Stored images with their content hashes.
    pub images: SpotImages,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Video identifiers referenced by the original description.
    pub video_ids: Vec<String>,
    /// Originating source; `None` for natively created spots.
    pub source: Option<SourceId>,
    /// Name of the originating source at sync time.
    pub source_name: Option<String>,
    /// Whether the spot is visible to the public map.
    pub is_public: bool,
    /// Derived rating statistics.
    pub rating: RatingStats,
    /// Uniform value in `[0, 1)` used to order unrated spots.
    pub random: f64,
    /// Folder of the source export the spot came from.
    pub folder_name: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Spot {
    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.location.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.location.x
    }
}

/// Field values for a spot that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotDraft {
    /// Display name.
    pub name: String,
    /// Plain-text description.
    pub description: String,
    /// Geospatial position (`x = longitude`, `y = latitude`).
    pub location: Coord<f64>,
    /// Street address, when known.
    pub address: Option<String>,
    /// City or locality, when known.
    pub city: Option<String>,
    /// Two-letter country code, when known.
    pub country_code: Option<String>,
    /// Stored images with their content hashes.
    pub images: SpotImages,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Video identifiers referenced by the description.
    pub video_ids: Vec<String>,
    /// Originating source; `None` for natively created spots.
    pub source: Option<SourceId>,
    /// Name of the originating source.
    pub source_name: Option<String>,
    /// Whether the spot is publicly visible.
    pub is_public: bool,
    /// Uniform value in `[0, 1)` used to order unrated spots.
    pub random: f64,
    /// Folder of the source export.
    pub folder_name: Option<String>,
}

impl SpotDraft {
    /// Materialise the draft with an identifier and timestamps.
    ///
    /// New spots always start with zero rating statistics.
    #[must_use]
    pub fn into_spot(self, id: SpotId, now: DateTime<Utc>) -> Spot {
        Spot {
            id,
            name: self.name,
            description: self.description,
            location: self.location,
            address: self.address,
            city: self.city,
            country_code: self.country_code,
            images: self.images,
            tags: self.tags,
            video_ids: self.video_ids,
            source: self.source,
            source_name: self.source_name,
            is_public: self.is_public,
            rating: RatingStats::ZERO,
            random: self.random,
            folder_name: self.folder_name,
            created_at: now,
            updated_at: now,
        }
    }
}

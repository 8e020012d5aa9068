//! Administrator-configured feeds and their run statistics.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Store-assigned identifier of a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters accumulated by one synchronisation run of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncStats {
    /// Spots inserted during the run.
    pub created: u64,
    /// Existing spots rewritten during the run.
    pub updated: u64,
    /// Placemarks that could not be stored.
    pub skipped: u64,
    /// Successful geocoder calls.
    pub geocoded: u64,
    /// Geocoder calls that returned a failure.
    pub geocoding_failed: u64,
}

impl SyncStats {
    /// Number of placemarks that produced a stored spot.
    #[must_use]
    pub const fn stored(&self) -> u64 {
        self.created.saturating_add(self.updated)
    }

    /// Add another run's counters to these.
    pub fn absorb(&mut self, other: &Self) {
        self.created = self.created.saturating_add(other.created);
        self.updated = self.updated.saturating_add(other.updated);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.geocoded = self.geocoded.saturating_add(other.geocoded);
        self.geocoding_failed = self.geocoding_failed.saturating_add(other.geocoding_failed);
    }
}

/// An external feed periodically synchronised into the spot store.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Source {
    /// Store-assigned identifier.
    pub id: SourceId,
    /// Human-readable name copied onto every spot it produces.
    pub name: String,
    /// URL the export is fetched from.
    pub url: String,
    /// Ordered folder allow-list; empty means every folder is imported.
    pub include_folders: Vec<String>,
    /// Whether spots remember the folder they came from.
    pub record_folder_name: bool,
    /// Inactive sources are skipped by bulk runs.
    pub is_active: bool,
    /// Visibility applied to spots created from this source.
    pub is_public: bool,
    /// Completion time of the last run.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Counters of the last run.
    pub last_sync_stats: Option<SyncStats>,
    /// Distinct folder names seen during the last run.
    pub available_folders: Vec<String>,
}

/// Errors returned when validating a [`SourceDraft`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceDraftError {
    /// The name was empty or whitespace.
    #[error("source name must not be empty")]
    EmptyName,
    /// The URL did not use an HTTP scheme.
    #[error("source url must be http or https: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },
}

/// Administrator-supplied fields of a source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceDraft {
    /// Human-readable name.
    pub name: String,
    /// Export URL.
    pub url: String,
    /// Ordered folder allow-list.
    pub include_folders: Vec<String>,
    /// Whether spots remember their folder.
    pub record_folder_name: bool,
    /// Whether bulk runs include the source.
    pub is_active: bool,
    /// Visibility of created spots.
    pub is_public: bool,
}

impl SourceDraft {
    /// Validate a name and URL, returning an active, public draft.
    ///
    /// # Examples
    /// ```
    /// use spotsync_core::SourceDraft;
    ///
    /// let draft = SourceDraft::new("Street spots", "https://example.com/map.kmz")?
    ///     .with_include_folders(vec!["Ledges".into()]);
    /// assert!(draft.is_active);
    /// assert!(SourceDraft::new("Bad", "ftp://example.com").is_err());
    /// # Ok::<(), spotsync_core::SourceDraftError>(())
    /// ```
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, SourceDraftError> {
        let draft = Self {
            name: name.into(),
            url: url.into(),
            include_folders: Vec::new(),
            record_folder_name: false,
            is_active: true,
            is_public: true,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Check the invariants enforced by [`SourceDraft::new`].
    pub fn validate(&self) -> Result<(), SourceDraftError> {
        if self.name.trim().is_empty() {
            return Err(SourceDraftError::EmptyName);
        }
        let url = self.url.trim().to_ascii_lowercase();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SourceDraftError::InvalidUrl {
                url: self.url.clone(),
            });
        }
        Ok(())
    }

    /// Replace the folder allow-list.
    #[must_use]
    pub fn with_include_folders(mut self, folders: Vec<String>) -> Self {
        self.include_folders = folders;
        self
    }

    /// Toggle folder provenance recording.
    #[must_use]
    pub const fn with_record_folder_name(mut self, record: bool) -> Self {
        self.record_folder_name = record;
        self
    }

    /// Toggle inclusion in bulk runs.
    #[must_use]
    pub const fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Toggle visibility of created spots.
    #[must_use]
    pub const fn with_public(mut self, public: bool) -> Self {
        self.is_public = public;
        self
    }

    /// Materialise the draft under an identifier with no run history.
    #[must_use]
    pub fn into_source(self, id: SourceId) -> Source {
        Source {
            id,
            name: self.name,
            url: self.url,
            include_folders: self.include_folders,
            record_folder_name: self.record_folder_name,
            is_active: self.is_active,
            is_public: self.is_public,
            last_sync_at: None,
            last_sync_stats: None,
            available_folders: Vec::new(),
        }
    }
}

/// Outcome of a run written back onto its source.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRecord {
    /// Completion time.
    pub at: DateTime<Utc>,
    /// Counters accumulated by the run.
    pub stats: SyncStats,
    /// Folder names seen, when the source records them.
    pub available_folders: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "https://example.com", SourceDraftError::EmptyName)]
    #[case("   ", "https://example.com", SourceDraftError::EmptyName)]
    #[case("Spots", "example.com/map.kml", SourceDraftError::InvalidUrl { url: "example.com/map.kml".into() })]
    fn drafts_validate_name_and_url(
        #[case] name: &str,
        #[case] url: &str,
        #[case] expected: SourceDraftError,
    ) {
        assert_eq!(SourceDraft::new(name, url), Err(expected));
    }

    #[rstest]
    fn stats_absorb_sums_every_counter() {
        let mut total = SyncStats {
            created: 1,
            updated: 2,
            skipped: 3,
            geocoded: 4,
            geocoding_failed: 5,
        };
        let copy = total;
        total.absorb(&copy);
        assert_eq!(total.created, 2);
        assert_eq!(total.geocoding_failed, 10);
        assert_eq!(total.stored(), 6);
    }

    #[rstest]
    fn new_sources_have_no_history() {
        let source = SourceDraft::new("Spots", "HTTPS://example.com/x.kmz")
            .expect("valid draft")
            .into_source(SourceId(3));
        assert_eq!(source.last_sync_stats, None);
        assert!(source.available_folders.is_empty());
    }
}

//! Garbage collection of stored images and stale cache entries.

use log::{info, warn};
use spotsync_core::{ImageCacheStore, SpotStore};

use super::naming::hash_from_object_name;
use super::storage::ObjectStorage;
use super::{ImageError, OBJECT_PREFIX};

/// Outcome of a [`cleanup`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CleanupReport {
    /// Cache entries pointing at objects that no longer exist.
    pub cache_entries_removed: u64,
    /// Stored images no spot references any more.
    pub objects_deleted: u64,
    /// Stored images still in use, or not named by the deduplicator.
    pub objects_kept: u64,
}

/// Delete unreferenced images, then drop cache entries left dangling.
///
/// Only objects named by the deduplicator are candidates; anything else
/// under the image prefix is left alone. Images uploaded by a sync that has
/// not written its spot yet look unreferenced, so this should not overlap
/// with a running sync. Individual delete failures are logged and skipped.
///
/// # Errors
///
/// Fails when the references, object listing, or cache listing cannot be
/// read.
pub async fn cleanup(
    storage: &dyn ObjectStorage,
    cache: &dyn ImageCacheStore,
    spots: &dyn SpotStore,
) -> Result<CleanupReport, ImageError> {
    let referenced = spots
        .referenced_image_hashes()
        .map_err(|source| ImageError::References { source })?;
    let names = storage
        .list(OBJECT_PREFIX)
        .await
        .map_err(|source| ImageError::Storage {
            operation: "list",
            source,
        })?;

    let mut report = CleanupReport::default();
    for name in names {
        match hash_from_object_name(&name) {
            Some(hash) if !referenced.contains(hash) => match storage.delete(&name).await {
                Ok(_) => report.objects_deleted += 1,
                Err(err) => warn!("failed to delete unreferenced image {name}: {err}"),
            },
            _ => report.objects_kept += 1,
        }
    }

    let entries = cache
        .list_cache_entries()
        .map_err(|source| ImageError::Cache {
            operation: "list",
            source,
        })?;
    for entry in entries {
        let alive = match storage.object_name(&entry.public_url) {
            Some(name) => storage.exists(&name).await.unwrap_or_else(|err| {
                warn!("could not check {name}, keeping its cache entry: {err}");
                true
            }),
            None => false,
        };
        if alive {
            continue;
        }
        match cache.delete_cache_entry(&entry.key) {
            Ok(_) => report.cache_entries_removed += 1,
            Err(err) => warn!("failed to delete cache entry {}: {err}", entry.key),
        }
    }

    info!(
        "image cleanup: {} objects deleted, {} kept, {} cache entries removed",
        report.objects_deleted, report.objects_kept, report.cache_entries_removed
    );
    Ok(report)
}

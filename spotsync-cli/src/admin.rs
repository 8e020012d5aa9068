//! Administrative operations guarded by the privilege check.
//!
//! Every operation runs [`authorise`] before touching a store or the
//! network. Results are wrapped in [`AdminOutcome`] so callers always get a
//! serialisable `{success, stats, error}` record, even for failures.

use log::{info, warn};
use serde::Serialize;
use spotsync_core::{
    Caller, ImageCacheStore, PermissionError, RatingStore, Source, SourceDraft, SourceDraftError,
    SourceId, SourceStore, SpotStore, StoreError, SyncStats, authorise,
};
use spotsync_data::images::{CleanupReport, ImageError, ObjectStorage, cleanup};
use spotsync_data::sync::error_chain;
use spotsync_data::{
    Fetcher, Geocoder, SyncAllReport, SyncConfig, SyncError, SyncOrchestrator, SyncServices,
};
use spotsync_scorer::{RatingAggregator, RecomputeReport, ScorerError};
use thiserror::Error;

/// Failures of an administrative operation.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The caller may not run administrative operations.
    #[error(transparent)]
    Permission(#[from] PermissionError),
    /// The referenced source does not exist.
    #[error("source {id} does not exist")]
    MissingSource { id: SourceId },
    /// Submitted source details are invalid.
    #[error("invalid source: {0}")]
    InvalidSource(#[from] SourceDraftError),
    /// A store call failed.
    #[error("store operation {operation} failed")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    /// A source run aborted.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// Rating recomputation failed.
    #[error(transparent)]
    Ratings(#[from] ScorerError),
    /// Image cleanup failed.
    #[error(transparent)]
    Images(#[from] ImageError),
    /// The service was built without a collaborator the operation needs.
    #[error("{component} is not configured")]
    Unavailable { component: &'static str },
    /// Some sources of a bulk run failed.
    #[error("{failed} of {total} sources failed")]
    PartialSync { failed: usize, total: usize },
}

fn store_error(operation: &'static str) -> impl FnOnce(StoreError) -> AdminError {
    move |source| AdminError::Store { operation, source }
}

/// Serialisable result of an administrative operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminOutcome<T> {
    /// Whether the operation completed without error.
    pub success: bool,
    /// Operation result, when one was produced.
    pub stats: Option<T>,
    /// Failure description including its causes.
    pub error: Option<String>,
}

impl<T> AdminOutcome<T> {
    fn completed(stats: T) -> Self {
        Self {
            success: true,
            stats: Some(stats),
            error: None,
        }
    }

    fn failed(operation: &'static str, stats: Option<T>, error: &AdminError) -> Self {
        let message = error_chain(error);
        warn!("{operation} failed: {message}");
        Self {
            success: false,
            stats,
            error: Some(message),
        }
    }

    fn from_result(operation: &'static str, result: Result<T, AdminError>) -> Self {
        match result {
            Ok(stats) => Self::completed(stats),
            Err(err) => Self::failed(operation, None, &err),
        }
    }
}

/// Stores an [`AdminService`] works against.
#[derive(Clone, Copy)]
pub struct AdminStores<'a> {
    /// Spot records.
    pub spots: &'a dyn SpotStore,
    /// Source records.
    pub sources: &'a dyn SourceStore,
    /// User ratings.
    pub ratings: &'a dyn RatingStore,
    /// URL to content-hash cache.
    pub image_cache: &'a dyn ImageCacheStore,
}

impl<'a> AdminStores<'a> {
    /// Use one backend for every concern.
    #[must_use]
    pub fn shared<S>(store: &'a S) -> Self
    where
        S: SpotStore + SourceStore + RatingStore + ImageCacheStore,
    {
        Self {
            spots: store,
            sources: store,
            ratings: store,
            image_cache: store,
        }
    }
}

/// Entry point for administrative operations.
///
/// Feed access and object storage are optional so commands that only touch
/// the stores do not need network credentials. Operations needing a missing
/// collaborator fail with [`AdminError::Unavailable`].
pub struct AdminService<'a> {
    stores: AdminStores<'a>,
    feeds: Option<(&'a dyn Fetcher, &'a dyn Geocoder)>,
    storage: Option<&'a dyn ObjectStorage>,
    sync_config: SyncConfig,
}

impl<'a> AdminService<'a> {
    /// Build a service over the stores only.
    #[must_use]
    pub fn new(stores: AdminStores<'a>) -> Self {
        Self {
            stores,
            feeds: None,
            storage: None,
            sync_config: SyncConfig::default(),
        }
    }

    /// Attach the feed fetcher and geocoder used by sync operations.
    #[must_use]
    pub fn with_feeds(mut self, fetcher: &'a dyn Fetcher, geocoder: &'a dyn Geocoder) -> Self {
        self.feeds = Some((fetcher, geocoder));
        self
    }

    /// Attach the image object storage.
    #[must_use]
    pub fn with_storage(mut self, storage: &'a dyn ObjectStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the sync configuration.
    #[must_use]
    pub fn with_sync_config(mut self, config: SyncConfig) -> Self {
        self.sync_config = config;
        self
    }

    fn storage(&self) -> Result<&'a dyn ObjectStorage, AdminError> {
        self.storage.ok_or(AdminError::Unavailable {
            component: "object storage",
        })
    }

    fn orchestrator(&self) -> Result<SyncOrchestrator<'a>, AdminError> {
        let (fetcher, geocoder) = self.feeds.ok_or(AdminError::Unavailable {
            component: "feed access",
        })?;
        let services = SyncServices {
            spots: self.stores.spots,
            sources: self.stores.sources,
            image_cache: self.stores.image_cache,
            fetcher,
            geocoder,
            storage: self.storage()?,
        };
        Ok(SyncOrchestrator::new(services, self.sync_config.clone()))
    }

    /// Synchronise one source.
    pub async fn sync_source(
        &self,
        caller: Option<&Caller>,
        id: SourceId,
    ) -> AdminOutcome<SyncStats> {
        let result = async {
            let caller = authorise(caller)?;
            let source = self
                .stores
                .sources
                .get_source(id)
                .map_err(store_error("get_source"))?
                .ok_or(AdminError::MissingSource { id })?;
            info!("{} requested sync of source {id}", caller.id);
            Ok::<_, AdminError>(self.orchestrator()?.sync_source(&source).await?)
        }
        .await;
        AdminOutcome::from_result("sync_source", result)
    }

    /// Synchronise every active source.
    ///
    /// The outcome carries the per-source report even when some sources
    /// failed; `success` is only set when all of them completed.
    pub async fn sync_all(&self, caller: Option<&Caller>) -> AdminOutcome<SyncAllReport> {
        if let Err(err) = authorise(caller) {
            return AdminOutcome::failed("sync_all", None, &err.into());
        }
        let orchestrator = match self.orchestrator() {
            Ok(orchestrator) => orchestrator,
            Err(err) => return AdminOutcome::failed("sync_all", None, &err),
        };
        let report = match orchestrator.sync_all().await {
            Ok(report) => report,
            Err(err) => return AdminOutcome::failed("sync_all", None, &err.into()),
        };
        let failed = report.failed();
        if failed == 0 {
            return AdminOutcome::completed(report);
        }
        let error = AdminError::PartialSync {
            failed,
            total: report.sources.len(),
        };
        AdminOutcome::failed("sync_all", Some(report), &error)
    }

    /// Register a new source.
    pub fn create_source(&self, caller: Option<&Caller>, draft: SourceDraft) -> AdminOutcome<Source> {
        let result = authorise(caller)
            .map_err(AdminError::from)
            .and_then(|_| {
                draft.validate()?;
                self.stores
                    .sources
                    .create_source(draft)
                    .map_err(store_error("create_source"))
            });
        AdminOutcome::from_result("create_source", result)
    }

    /// Replace the administrator-managed fields of a source.
    pub fn update_source(
        &self,
        caller: Option<&Caller>,
        id: SourceId,
        draft: SourceDraft,
    ) -> AdminOutcome<Source> {
        let result = authorise(caller)
            .map_err(AdminError::from)
            .and_then(|_| {
                draft.validate()?;
                self.stores
                    .sources
                    .update_source(id, draft)
                    .map_err(|source| match source {
                        StoreError::MissingSource { id: missing } => {
                            AdminError::MissingSource { id: missing }
                        }
                        other => AdminError::Store {
                            operation: "update_source",
                            source: other,
                        },
                    })
            });
        AdminOutcome::from_result("update_source", result)
    }

    /// Delete a source. Its spots stay and lose their source reference.
    pub fn delete_source(&self, caller: Option<&Caller>, id: SourceId) -> AdminOutcome<bool> {
        let result = authorise(caller)
            .map_err(AdminError::from)
            .and_then(|_| {
                let removed = self
                    .stores
                    .sources
                    .delete_source(id)
                    .map_err(store_error("delete_source"))?;
                if removed {
                    Ok(true)
                } else {
                    Err(AdminError::MissingSource { id })
                }
            });
        AdminOutcome::from_result("delete_source", result)
    }

    /// List every source with its last run.
    pub fn list_sources(&self, caller: Option<&Caller>) -> AdminOutcome<Vec<Source>> {
        let result = authorise(caller)
            .map_err(AdminError::from)
            .and_then(|_| {
                self.stores
                    .sources
                    .list_sources()
                    .map_err(store_error("list_sources"))
            });
        AdminOutcome::from_result("list_sources", result)
    }

    /// Recompute the rating statistics of every rated spot.
    pub fn recompute_ratings(&self, caller: Option<&Caller>) -> AdminOutcome<RecomputeReport> {
        let result = authorise(caller)
            .map_err(AdminError::from)
            .and_then(|_| {
                RatingAggregator::new(self.stores.spots, self.stores.ratings)
                    .recompute_all()
                    .map_err(AdminError::from)
            });
        AdminOutcome::from_result("recompute_ratings", result)
    }

    /// Delete unreferenced images and dangling cache entries.
    ///
    /// Must not overlap with a running sync.
    pub async fn cleanup_images(&self, caller: Option<&Caller>) -> AdminOutcome<CleanupReport> {
        let result = async {
            authorise(caller)?;
            let storage = self.storage()?;
            Ok::<_, AdminError>(
                cleanup(storage, self.stores.image_cache, self.stores.spots).await?,
            )
        }
        .await;
        AdminOutcome::from_result("cleanup_images", result)
    }
}

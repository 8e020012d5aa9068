//! Per-source synchronisation pipeline.

use std::cell::RefCell;

use chrono::Utc;
use geo::Coord;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spotsync_core::{
    ImageCacheStore, Source, SourceStore, Spot, SpotDraft, SpotImages, SpotStore, SyncRecord,
    SyncStats,
};

use super::sanitise::sanitise_description;
use super::{PlacemarkError, SourceRunReport, SyncAllReport, SyncConfig, SyncError};
use crate::formats::{
    FeedDocument, Placemark, PlacemarkLocation, distinct_folder_names, filter_and_order,
    parse_feed,
};
use crate::geocoding::{AddressDetails, GeocodeThrottle, Geocoder};
use crate::images::{ImageDeduplicator, ObjectStorage};
use crate::transport::Fetcher;

/// Collaborators a sync run reads from and writes to.
#[derive(Clone, Copy)]
pub struct SyncServices<'a> {
    /// Canonical spot store.
    pub spots: &'a dyn SpotStore,
    /// Source registry.
    pub sources: &'a dyn SourceStore,
    /// Image URL cache.
    pub image_cache: &'a dyn ImageCacheStore,
    /// Downloads feeds and images.
    pub fetcher: &'a dyn Fetcher,
    /// Resolves coordinates and addresses.
    pub geocoder: &'a dyn Geocoder,
    /// Stores image objects.
    pub storage: &'a dyn ObjectStorage,
}

/// What happened to a placemark that was stored.
enum Upsert {
    Created,
    Updated,
}

/// Drives synchronisation of sources into the spot store.
pub struct SyncOrchestrator<'a> {
    services: SyncServices<'a>,
    config: SyncConfig,
    rng: RefCell<StdRng>,
}

impl<'a> SyncOrchestrator<'a> {
    /// Create an orchestrator over the given services.
    #[must_use]
    pub fn new(services: SyncServices<'a>, config: SyncConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            services,
            config,
            rng: RefCell::new(rng),
        }
    }

    /// Synchronise every active source, isolating failures per source.
    ///
    /// # Errors
    ///
    /// Fails only when the source list itself cannot be read.
    pub async fn sync_all(&self) -> Result<SyncAllReport, SyncError> {
        let sources = self
            .services
            .sources
            .list_sources()
            .map_err(|source| SyncError::Store {
                operation: "list_sources",
                source,
            })?;

        let mut report = SyncAllReport::default();
        for source in sources.iter().filter(|source| source.is_active) {
            let outcome = self.sync_source(source).await;
            let run = match outcome {
                Ok(stats) => {
                    report.totals.absorb(&stats);
                    SourceRunReport {
                        source: source.id,
                        name: source.name.clone(),
                        stats: Some(stats),
                        error: None,
                    }
                }
                Err(err) => {
                    warn!("sync of source {} ({}) failed: {err}", source.id, source.name);
                    SourceRunReport {
                        source: source.id,
                        name: source.name.clone(),
                        stats: None,
                        error: Some(error_chain(&err)),
                    }
                }
            };
            report.sources.push(run);
        }
        info!(
            "synchronised {} sources, {} failed",
            report.sources.len(),
            report.failed()
        );
        Ok(report)
    }

    /// Synchronise one source and record its statistics.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the feed cannot be fetched or parsed, or
    /// when the run statistics cannot be written back. Placemark failures
    /// are counted in [`SyncStats::skipped`] instead.
    pub async fn sync_source(&self, source: &Source) -> Result<SyncStats, SyncError> {
        info!("syncing source {} ({})", source.id, source.name);
        let placemarks = self.load_placemarks(&source.url).await?;
        let available_folders = distinct_folder_names(&placemarks);
        let mut pending = filter_and_order(placemarks, &source.include_folders);
        debug!("{} placemarks selected from {}", pending.len(), source.url);

        let mut stats = SyncStats::default();
        let mut throttle = GeocodeThrottle::new(self.config.geocode_delay);
        let chunk_size = self.config.chunk_size.max(1);
        while !pending.is_empty() {
            let take = chunk_size.min(pending.len());
            let chunk: Vec<Placemark> = pending.drain(..take).collect();
            for placemark in chunk {
                match self
                    .sync_placemark(source, placemark, &mut throttle, &mut stats)
                    .await
                {
                    Ok(Upsert::Created) => stats.created += 1,
                    Ok(Upsert::Updated) => stats.updated += 1,
                    Err(err) => {
                        warn!("skipping placemark: {}", error_chain(&err));
                        stats.skipped += 1;
                    }
                }
            }
            debug!("chunk done, {} placemarks remaining", pending.len());
        }

        let record = SyncRecord {
            at: Utc::now(),
            stats,
            available_folders: source.record_folder_name.then_some(available_folders),
        };
        self.services
            .sources
            .record_sync(source.id, &record)
            .map_err(|err| SyncError::Store {
                operation: "record_sync",
                source: err,
            })?;
        info!(
            "source {} synced: {} created, {} updated, {} skipped",
            source.id, stats.created, stats.updated, stats.skipped
        );
        Ok(stats)
    }

    /// Fetch and parse a feed, following datalayer indexes one level deep.
    async fn load_placemarks(&self, url: &str) -> Result<Vec<Placemark>, SyncError> {
        let bytes = self
            .services
            .fetcher
            .fetch(url)
            .await
            .map_err(|source| SyncError::Fetch {
                url: url.to_owned(),
                source,
            })?;
        let document = parse_feed(&bytes, url).map_err(|source| SyncError::Format {
            url: url.to_owned(),
            source,
        })?;
        drop(bytes);

        let layers = match document {
            FeedDocument::Placemarks(placemarks) => return Ok(placemarks),
            FeedDocument::Datalayers(layers) => layers,
        };
        let mut placemarks = Vec::new();
        for layer in layers {
            let layer_url = match layer.resolve_url(url) {
                Ok(layer_url) => layer_url,
                Err(err) => {
                    warn!("skipping datalayer {:?}: {err}", layer.name);
                    continue;
                }
            };
            let parsed = match self.services.fetcher.fetch(&layer_url).await {
                Ok(bytes) => parse_feed(&bytes, &layer_url),
                Err(err) => {
                    warn!("skipping datalayer {:?}: {err}", layer.name);
                    continue;
                }
            };
            match parsed {
                Ok(FeedDocument::Placemarks(found)) => {
                    placemarks.extend(found.into_iter().map(|mut placemark| {
                        placemark.folder_path = vec![layer.name.clone()];
                        placemark
                    }));
                }
                Ok(FeedDocument::Datalayers(_)) => {
                    warn!("ignoring nested datalayer index at {layer_url}");
                }
                Err(err) => warn!("skipping datalayer {:?}: {err}", layer.name),
            }
        }
        Ok(placemarks)
    }

    async fn sync_placemark(
        &self,
        source: &Source,
        placemark: Placemark,
        throttle: &mut GeocodeThrottle,
        stats: &mut SyncStats,
    ) -> Result<Upsert, PlacemarkError> {
        let store_error = |operation: &'static str, name: &str| {
            let name = name.to_owned();
            move |err| PlacemarkError::Store {
                name,
                operation,
                source: err,
            }
        };

        let location = match &placemark.location {
            PlacemarkLocation::Coordinates(coord) => *coord,
            PlacemarkLocation::Address(address) => {
                throttle.wait().await;
                self.geocoded(stats, &placemark.name, self.services.geocoder.reverse(address).await)?
            }
        };

        let existing = self
            .services
            .spots
            .find_by_source_location(source.id, location)
            .map_err(store_error("find_by_source_location", &placemark.name))?;

        let details = match &existing {
            Some(_) => None,
            None => {
                throttle.wait().await;
                let forward = self.services.geocoder.forward(location).await;
                Some(self.geocoded(stats, &placemark.name, forward)?)
            }
        };

        let prior_hashes = existing
            .as_ref()
            .map(|spot| spot.images.hashes().to_vec())
            .unwrap_or_default();
        let dedup = ImageDeduplicator::new(
            self.services.storage,
            self.services.image_cache,
            self.services.fetcher,
            &self.config.images,
        );
        let processed = dedup
            .process_images(&placemark.name, &placemark.image_urls, &prior_hashes)
            .await;
        let mut images = SpotImages::default();
        for image in processed {
            images.push(image.public_url, image.hash);
        }

        let fields = SpotFields::from_placemark(source, placemark, images);
        match existing {
            Some(spot) => {
                let merged = fields.merge_into(spot);
                self.services
                    .spots
                    .update_spot(&merged)
                    .map_err(store_error("update_spot", &merged.name))?;
                Ok(Upsert::Updated)
            }
            None => {
                let random = self.rng.borrow_mut().gen_range(0.0..1.0);
                let draft = fields.into_draft(source, location, details.unwrap_or_default(), random);
                let name = draft.name.clone();
                self.services
                    .spots
                    .insert_spot(draft)
                    .map_err(store_error("insert_spot", &name))?;
                Ok(Upsert::Created)
            }
        }
    }

    /// Count a geocoder outcome and turn failures into placemark errors.
    fn geocoded<T>(
        &self,
        stats: &mut SyncStats,
        name: &str,
        outcome: Result<T, crate::geocoding::GeocodeFailure>,
    ) -> Result<T, PlacemarkError> {
        match outcome {
            Ok(value) => {
                stats.geocoded += 1;
                Ok(value)
            }
            Err(failure) => {
                stats.geocoding_failed += 1;
                Err(PlacemarkError::Geocode {
                    name: name.to_owned(),
                    source: failure,
                })
            }
        }
    }
}

/// Descriptive fields a placemark contributes to its spot.
struct SpotFields {
    name: String,
    description: String,
    video_ids: Vec<String>,
    tags: Vec<String>,
    images: SpotImages,
    address: Option<String>,
    folder_name: Option<String>,
    source_name: String,
}

impl SpotFields {
    fn from_placemark(source: &Source, placemark: Placemark, images: SpotImages) -> Self {
        let cleaned = sanitise_description(&placemark.description);
        let folder_name = if source.record_folder_name {
            placemark.folder_name().map(str::to_owned)
        } else {
            None
        };
        Self {
            address: placemark.address().map(str::to_owned),
            folder_name,
            name: placemark.name,
            description: cleaned.text,
            video_ids: cleaned.video_ids,
            tags: placemark.tags,
            images,
            source_name: source.name.clone(),
        }
    }

    /// Overwrite descriptive fields, keeping identity, ratings and any
    /// stored address details.
    fn merge_into(self, mut spot: Spot) -> Spot {
        spot.name = self.name;
        spot.description = self.description;
        spot.video_ids = self.video_ids;
        spot.tags = self.tags;
        spot.images = self.images;
        spot.source_name = Some(self.source_name);
        spot.folder_name = self.folder_name;
        if spot.address.is_none() {
            spot.address = self.address;
        }
        spot.updated_at = Utc::now();
        spot
    }

    fn into_draft(
        self,
        source: &Source,
        location: Coord<f64>,
        details: AddressDetails,
        random: f64,
    ) -> SpotDraft {
        SpotDraft {
            name: self.name,
            description: self.description,
            location,
            address: self.address.or(details.address),
            city: details.city,
            country_code: details.country_code,
            images: self.images,
            tags: self.tags,
            video_ids: self.video_ids,
            source: Some(source.id),
            source_name: Some(self.source_name),
            is_public: source.is_public,
            random,
            folder_name: self.folder_name,
        }
    }
}

/// Render an error with its sources for log lines and reports.
#[must_use]
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut cause = error.source();
    while let Some(inner) = cause {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        cause = inner.source();
    }
    rendered
}

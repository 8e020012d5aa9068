//! In-memory store implementations used by unit and behaviour tests.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use chrono::Utc;
use geo::{Coord, Rect};

use crate::{
    ImageCacheEntry, ImageCacheStore, Rating, RatingDraft, RatingId, RatingStats, RatingStore,
    Source, SourceDraft, SourceId, SourceStore, Spot, SpotDraft, SpotId, SpotImages, SpotStore,
    StoreError, SyncRecord, TierQuery, rect_contains,
};

#[derive(Debug, Default)]
struct MemoryState {
    spots: BTreeMap<SpotId, Spot>,
    sources: BTreeMap<SourceId, Source>,
    ratings: BTreeMap<RatingId, Rating>,
    cache: BTreeMap<String, ImageCacheEntry>,
    global_average: Option<f64>,
    next_id: u64,
    fail_counts: bool,
    failing_stats: HashSet<SpotId>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Store implementing every persistence trait over in-memory maps.
///
/// Lookups are linear scans, so it only suits small test datasets. Failure
/// switches let tests exercise error paths of the components using it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create a store seeded with spots; ids are reassigned in order.
    pub fn with_spots<I>(drafts: I) -> Self
    where
        I: IntoIterator<Item = SpotDraft>,
    {
        let store = Self::default();
        for draft in drafts {
            if let Err(err) = store.insert_spot(draft) {
                log::warn!("failed to seed memory store: {err}");
            }
        }
        store
    }

    /// Make [`SpotStore::count_in_rect`] fail until reset.
    pub fn set_fail_counts(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_counts = fail;
        }
    }

    /// Make [`SpotStore::set_rating_stats`] fail for one spot.
    pub fn fail_rating_stats_for(&self, id: SpotId) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_stats.insert(id);
        }
    }

    /// Overwrite a spot's rating statistics directly.
    pub fn force_rating(&self, id: SpotId, stats: RatingStats) {
        if let Ok(mut state) = self.state.lock()
            && let Some(spot) = state.spots.get_mut(&id)
        {
            spot.rating = stats;
        }
    }

    /// Every stored spot ordered by id.
    #[must_use]
    pub fn all_spots(&self) -> Vec<Spot> {
        self.state
            .lock()
            .map(|state| state.spots.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Build a public, unrated spot draft at `(latitude, longitude)`.
#[must_use]
pub fn spot_draft(name: &str, latitude: f64, longitude: f64) -> SpotDraft {
    SpotDraft {
        name: name.to_owned(),
        description: String::new(),
        location: Coord {
            x: longitude,
            y: latitude,
        },
        address: None,
        city: None,
        country_code: None,
        images: SpotImages::default(),
        tags: Vec::new(),
        video_ids: Vec::new(),
        source: None,
        source_name: None,
        is_public: true,
        random: 0.5,
        folder_name: None,
    }
}

impl SpotStore for MemoryStore {
    fn get_spot(&self, id: SpotId) -> Result<Option<Spot>, StoreError> {
        Ok(self.lock()?.spots.get(&id).cloned())
    }

    fn find_by_source_location(
        &self,
        source: SourceId,
        location: Coord<f64>,
    ) -> Result<Option<Spot>, StoreError> {
        Ok(self
            .lock()?
            .spots
            .values()
            .find(|spot| spot.source == Some(source) && spot.location == location)
            .cloned())
    }

    fn insert_spot(&self, draft: SpotDraft) -> Result<Spot, StoreError> {
        let mut state = self.lock()?;
        let id = SpotId(state.allocate_id());
        let spot = draft.into_spot(id, Utc::now());
        state.spots.insert(id, spot.clone());
        Ok(spot)
    }

    fn update_spot(&self, spot: &Spot) -> Result<Spot, StoreError> {
        let mut state = self.lock()?;
        let stored = state
            .spots
            .get_mut(&spot.id)
            .ok_or(StoreError::MissingSpot { id: spot.id })?;
        *stored = Spot {
            rating: stored.rating,
            random: stored.random,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..spot.clone()
        };
        Ok(stored.clone())
    }

    fn delete_spot(&self, id: SpotId) -> Result<bool, StoreError> {
        Ok(self.lock()?.spots.remove(&id).is_some())
    }

    fn set_rating_stats(&self, id: SpotId, stats: RatingStats) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.failing_stats.contains(&id) {
            return Err(StoreError::Corrupt {
                id: i64::try_from(id.0).unwrap_or(i64::MAX),
                reason: "injected failure".into(),
            });
        }
        let spot = state
            .spots
            .get_mut(&id)
            .ok_or(StoreError::MissingSpot { id })?;
        spot.rating = stats;
        Ok(())
    }

    fn spots_in_tier(&self, rect: &Rect<f64>, query: &TierQuery) -> Result<Vec<Spot>, StoreError> {
        let state = self.lock()?;
        let mut found: Vec<Spot> = state
            .spots
            .values()
            .filter(|spot| {
                spot.is_public
                    && rect_contains(rect, spot.location)
                    && query.tier.admits(&spot.rating, query.pivot)
            })
            .cloned()
            .collect();
        found.sort_by(|left, right| query.tier.compare(left, right));
        found.truncate(query.limit);
        Ok(found)
    }

    fn count_in_rect(&self, rect: &Rect<f64>) -> Result<u64, StoreError> {
        let state = self.lock()?;
        if state.fail_counts {
            return Err(StoreError::Corrupt {
                id: 0,
                reason: "injected count failure".into(),
            });
        }
        let count = state
            .spots
            .values()
            .filter(|spot| spot.is_public && rect_contains(rect, spot.location))
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn global_average_wilson(&self) -> Result<f64, StoreError> {
        Ok(self.lock()?.global_average.unwrap_or_default())
    }

    fn set_global_average_wilson(&self, value: f64) -> Result<(), StoreError> {
        self.lock()?.global_average = Some(value);
        Ok(())
    }

    fn referenced_image_hashes(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .lock()?
            .spots
            .values()
            .flat_map(|spot| spot.images.hashes().iter().cloned())
            .collect())
    }

    fn spots_for_source(&self, source: SourceId) -> Result<Vec<Spot>, StoreError> {
        Ok(self
            .lock()?
            .spots
            .values()
            .filter(|spot| spot.source == Some(source))
            .cloned()
            .collect())
    }
}

impl RatingStore for MemoryStore {
    fn ratings_for_spot(&self, spot: SpotId) -> Result<Vec<Rating>, StoreError> {
        Ok(self
            .lock()?
            .ratings
            .values()
            .filter(|rating| rating.spot_id == spot)
            .cloned()
            .collect())
    }

    fn rated_spot_ids(&self) -> Result<Vec<SpotId>, StoreError> {
        let mut ids: Vec<SpotId> = self
            .lock()?
            .ratings
            .values()
            .map(|rating| rating.spot_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn insert_rating(&self, draft: RatingDraft) -> Result<Rating, StoreError> {
        let mut state = self.lock()?;
        if !state.spots.contains_key(&draft.spot_id) {
            return Err(StoreError::MissingSpot { id: draft.spot_id });
        }
        let id = RatingId(state.allocate_id());
        let rating = Rating {
            id,
            spot_id: draft.spot_id,
            value: draft.value,
            author_id: draft.author_id,
            created_at: Utc::now(),
        };
        state.ratings.insert(id, rating.clone());
        Ok(rating)
    }

    fn update_rating(&self, id: RatingId, draft: RatingDraft) -> Result<Rating, StoreError> {
        let mut state = self.lock()?;
        if !state.spots.contains_key(&draft.spot_id) {
            return Err(StoreError::MissingSpot { id: draft.spot_id });
        }
        let rating = state
            .ratings
            .get_mut(&id)
            .ok_or(StoreError::MissingRating { id })?;
        let previous = rating.clone();
        rating.spot_id = draft.spot_id;
        rating.value = draft.value;
        rating.author_id = draft.author_id;
        Ok(previous)
    }

    fn delete_rating(&self, id: RatingId) -> Result<Option<Rating>, StoreError> {
        Ok(self.lock()?.ratings.remove(&id))
    }
}

impl SourceStore for MemoryStore {
    fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        Ok(self.lock()?.sources.values().cloned().collect())
    }

    fn get_source(&self, id: SourceId) -> Result<Option<Source>, StoreError> {
        Ok(self.lock()?.sources.get(&id).cloned())
    }

    fn create_source(&self, draft: SourceDraft) -> Result<Source, StoreError> {
        let mut state = self.lock()?;
        let id = SourceId(state.allocate_id());
        let source = draft.into_source(id);
        state.sources.insert(id, source.clone());
        Ok(source)
    }

    fn update_source(&self, id: SourceId, draft: SourceDraft) -> Result<Source, StoreError> {
        let mut state = self.lock()?;
        let source = state
            .sources
            .get_mut(&id)
            .ok_or(StoreError::MissingSource { id })?;
        source.name = draft.name;
        source.url = draft.url;
        source.include_folders = draft.include_folders;
        source.record_folder_name = draft.record_folder_name;
        source.is_active = draft.is_active;
        source.is_public = draft.is_public;
        Ok(source.clone())
    }

    fn delete_source(&self, id: SourceId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let removed = state.sources.remove(&id).is_some();
        for spot in state.spots.values_mut() {
            if spot.source == Some(id) {
                spot.source = None;
            }
        }
        Ok(removed)
    }

    fn record_sync(&self, id: SourceId, record: &SyncRecord) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let source = state
            .sources
            .get_mut(&id)
            .ok_or(StoreError::MissingSource { id })?;
        source.last_sync_at = Some(record.at);
        source.last_sync_stats = Some(record.stats);
        if let Some(folders) = &record.available_folders {
            source.available_folders.clone_from(folders);
        }
        Ok(())
    }
}

impl ImageCacheStore for MemoryStore {
    fn get_cache_entry(&self, key: &str) -> Result<Option<ImageCacheEntry>, StoreError> {
        Ok(self.lock()?.cache.get(key).cloned())
    }

    fn put_cache_entry(&self, entry: &ImageCacheEntry) -> Result<(), StoreError> {
        self.lock()?.cache.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn delete_cache_entry(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.cache.remove(key).is_some())
    }

    fn list_cache_entries(&self) -> Result<Vec<ImageCacheEntry>, StoreError> {
        Ok(self.lock()?.cache.values().cloned().collect())
    }
}

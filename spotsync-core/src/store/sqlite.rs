//! SQLite-backed implementation of every store trait.

use std::{
    collections::HashSet,
    fmt,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use chrono::Utc;
use geo::{Coord, Rect};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use serde::{Serialize, de::DeserializeOwned};

use super::schema::initialise_schema;
use super::{ImageCacheStore, RatingStore, SourceStore, SpotStore, StoreError};
use crate::{
    ImageCacheEntry, Rating, RatingDraft, RatingId, RatingStats, Source, SourceDraft, SourceId,
    Spot, SpotDraft, SpotId, SpotImages, SyncRecord, Tier, TierQuery,
};

const SPOT_COLUMNS: &str = "id, name, description, lat, lng, address, city, country_code, \
    image_urls, image_hashes, tags, video_ids, source_id, source_name, is_public, \
    average_rating, rating_count, wilson_lower_bound, random, folder_name, created_at, updated_at";

const SOURCE_COLUMNS: &str = "id, name, url, include_folders, record_folder_name, is_active, \
    is_public, last_sync_at, last_sync_stats, available_folders";

const RATING_COLUMNS: &str = "id, spot_id, value, author_id, created_at";

const GLOBAL_AVERAGE_SETTING: &str = "global_average_wilson";

/// Store backed by a single SQLite connection.
///
/// The connection sits behind a mutex so the store can be shared between
/// the sync orchestrator, the rating aggregator, and the query threads.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a database file and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(connection)
    }

    /// Create a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Sqlite {
            operation: "open in-memory database",
            source,
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(mut connection: Connection) -> Result<Self, StoreError> {
        initialise_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn sqlite(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Sqlite { operation, source }
}

fn to_sql_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::IdOutOfRange { id })
}

fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Json {
        operation: "encode",
        source,
    })
}

fn conversion_error(
    index: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, index: usize) -> rusqlite::Result<T> {
    let text: String = row.get(index)?;
    serde_json::from_str(&text).map_err(|error| conversion_error(index, error))
}

fn id_column(row: &Row<'_>, index: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(index)?;
    u64::try_from(raw).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(error))
    })
}

fn spot_from_row(row: &Row<'_>) -> rusqlite::Result<Spot> {
    let images = SpotImages::new(json_column(row, 8)?, json_column(row, 9)?)
        .map_err(|error| conversion_error(8, error))?;
    let source = row
        .get::<_, Option<i64>>(12)?
        .map(|raw| {
            u64::try_from(raw).map(SourceId).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(12, Type::Integer, Box::new(error))
            })
        })
        .transpose()?;
    Ok(Spot {
        id: SpotId(id_column(row, 0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        location: Coord {
            x: row.get(4)?,
            y: row.get(3)?,
        },
        address: row.get(5)?,
        city: row.get(6)?,
        country_code: row.get(7)?,
        images,
        tags: json_column(row, 10)?,
        video_ids: json_column(row, 11)?,
        source,
        source_name: row.get(13)?,
        is_public: row.get(14)?,
        rating: RatingStats {
            average_rating: row.get(15)?,
            rating_count: id_column(row, 16)?,
            wilson_lower_bound: row.get(17)?,
        },
        random: row.get(18)?,
        folder_name: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    let stats: Option<String> = row.get(8)?;
    let last_sync_stats = stats
        .map(|text| serde_json::from_str(&text).map_err(|error| conversion_error(8, error)))
        .transpose()?;
    Ok(Source {
        id: SourceId(id_column(row, 0)?),
        name: row.get(1)?,
        url: row.get(2)?,
        include_folders: json_column(row, 3)?,
        record_folder_name: row.get(4)?,
        is_active: row.get(5)?,
        is_public: row.get(6)?,
        last_sync_at: row.get(7)?,
        last_sync_stats,
        available_folders: json_column(row, 9)?,
    })
}

fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: RatingId(id_column(row, 0)?),
        spot_id: SpotId(id_column(row, 1)?),
        value: row.get(2)?,
        author_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn load_spot(connection: &Connection, id: SpotId) -> Result<Option<Spot>, StoreError> {
    connection
        .query_row(
            &format!("SELECT {SPOT_COLUMNS} FROM spots WHERE id = ?1"),
            [to_sql_id(id.0)?],
            spot_from_row,
        )
        .optional()
        .map_err(sqlite("load spot"))
}

fn load_source(connection: &Connection, id: SourceId) -> Result<Option<Source>, StoreError> {
    connection
        .query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
            [to_sql_id(id.0)?],
            source_from_row,
        )
        .optional()
        .map_err(sqlite("load source"))
}

fn load_rating(connection: &Connection, id: RatingId) -> Result<Option<Rating>, StoreError> {
    connection
        .query_row(
            &format!("SELECT {RATING_COLUMNS} FROM ratings WHERE id = ?1"),
            [to_sql_id(id.0)?],
            rating_from_row,
        )
        .optional()
        .map_err(sqlite("load rating"))
}

fn ensure_spot_exists(connection: &Connection, id: SpotId) -> Result<(), StoreError> {
    let found: Option<i64> = connection
        .query_row("SELECT 1 FROM spots WHERE id = ?1", [to_sql_id(id.0)?], |row| {
            row.get(0)
        })
        .optional()
        .map_err(sqlite("check spot exists"))?;
    found.map(|_| ()).ok_or(StoreError::MissingSpot { id })
}

fn optional_sql_id<T>(id: Option<T>, raw: impl Fn(T) -> u64) -> Result<Option<i64>, StoreError> {
    id.map(|value| to_sql_id(raw(value))).transpose()
}

impl SpotStore for SqliteStore {
    fn get_spot(&self, id: SpotId) -> Result<Option<Spot>, StoreError> {
        let connection = self.lock()?;
        load_spot(&connection, id)
    }

    fn find_by_source_location(
        &self,
        source: SourceId,
        location: Coord<f64>,
    ) -> Result<Option<Spot>, StoreError> {
        let connection = self.lock()?;
        connection
            .query_row(
                &format!(
                    "SELECT {SPOT_COLUMNS} FROM spots
                     WHERE source_id = ?1 AND lat = ?2 AND lng = ?3
                     ORDER BY id LIMIT 1"
                ),
                params![to_sql_id(source.0)?, location.y, location.x],
                spot_from_row,
            )
            .optional()
            .map_err(sqlite("find spot by source location"))
    }

    fn insert_spot(&self, draft: SpotDraft) -> Result<Spot, StoreError> {
        let connection = self.lock()?;
        let now = Utc::now();
        connection
            .execute(
                "INSERT INTO spots (
                    name, description, lat, lng, address, city, country_code,
                    image_urls, image_hashes, tags, video_ids, source_id, source_name,
                    is_public, random, folder_name, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
                params![
                    draft.name,
                    draft.description,
                    draft.location.y,
                    draft.location.x,
                    draft.address,
                    draft.city,
                    draft.country_code,
                    encode_json(draft.images.urls())?,
                    encode_json(draft.images.hashes())?,
                    encode_json(&draft.tags)?,
                    encode_json(&draft.video_ids)?,
                    optional_sql_id(draft.source, |id| id.0)?,
                    draft.source_name,
                    draft.is_public,
                    draft.random,
                    draft.folder_name,
                    now,
                ],
            )
            .map_err(sqlite("insert spot"))?;
        let raw = connection.last_insert_rowid();
        let id = u64::try_from(raw).map_err(|_| StoreError::Corrupt {
            id: raw,
            reason: "negative row id".into(),
        })?;
        Ok(draft.into_spot(SpotId(id), now))
    }

    fn update_spot(&self, spot: &Spot) -> Result<Spot, StoreError> {
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE spots SET
                    name = ?1, description = ?2, lat = ?3, lng = ?4, address = ?5, city = ?6,
                    country_code = ?7, image_urls = ?8, image_hashes = ?9, tags = ?10,
                    video_ids = ?11, source_id = ?12, source_name = ?13, is_public = ?14,
                    folder_name = ?15, updated_at = ?16
                 WHERE id = ?17",
                params![
                    spot.name,
                    spot.description,
                    spot.location.y,
                    spot.location.x,
                    spot.address,
                    spot.city,
                    spot.country_code,
                    encode_json(spot.images.urls())?,
                    encode_json(spot.images.hashes())?,
                    encode_json(&spot.tags)?,
                    encode_json(&spot.video_ids)?,
                    optional_sql_id(spot.source, |id| id.0)?,
                    spot.source_name,
                    spot.is_public,
                    spot.folder_name,
                    Utc::now(),
                    to_sql_id(spot.id.0)?,
                ],
            )
            .map_err(sqlite("update spot"))?;
        if changed == 0 {
            return Err(StoreError::MissingSpot { id: spot.id });
        }
        load_spot(&connection, spot.id)?.ok_or(StoreError::MissingSpot { id: spot.id })
    }

    fn delete_spot(&self, id: SpotId) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        connection
            .execute("DELETE FROM spots WHERE id = ?1", [to_sql_id(id.0)?])
            .map(|changed| changed > 0)
            .map_err(sqlite("delete spot"))
    }

    fn set_rating_stats(&self, id: SpotId, stats: RatingStats) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let count = i64::try_from(stats.rating_count).map_err(|_| StoreError::IdOutOfRange {
            id: stats.rating_count,
        })?;
        let changed = connection
            .execute(
                "UPDATE spots SET average_rating = ?1, rating_count = ?2, wilson_lower_bound = ?3
                 WHERE id = ?4",
                params![
                    stats.average_rating,
                    count,
                    stats.wilson_lower_bound,
                    to_sql_id(id.0)?
                ],
            )
            .map_err(sqlite("set rating stats"))?;
        if changed == 0 {
            return Err(StoreError::MissingSpot { id });
        }
        Ok(())
    }

    fn spots_in_tier(&self, rect: &Rect<f64>, query: &TierQuery) -> Result<Vec<Spot>, StoreError> {
        let connection = self.lock()?;
        let (min, max) = (rect.min(), rect.max());
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let base = format!(
            "SELECT {SPOT_COLUMNS} FROM spots
             WHERE is_public = 1 AND lat BETWEEN ?1 AND ?2 AND lng BETWEEN ?3 AND ?4"
        );
        let mut statement;
        let rows = match query.tier {
            Tier::Above | Tier::Below => {
                let clause = if query.tier == Tier::Above {
                    "wilson_lower_bound > ?5 AND wilson_lower_bound > 0"
                } else {
                    "wilson_lower_bound > 0 AND wilson_lower_bound <= ?5"
                };
                statement = connection
                    .prepare(&format!(
                        "{base} AND {clause} ORDER BY wilson_lower_bound DESC, id ASC LIMIT ?6"
                    ))
                    .map_err(sqlite("prepare tier query"))?;
                statement.query_map(
                    params![min.y, max.y, min.x, max.x, query.pivot, limit],
                    spot_from_row,
                )
            }
            Tier::Unrated => {
                statement = connection
                    .prepare(&format!(
                        "{base} AND wilson_lower_bound = 0 ORDER BY random ASC, id ASC LIMIT ?5"
                    ))
                    .map_err(sqlite("prepare tier query"))?;
                statement.query_map(params![min.y, max.y, min.x, max.x, limit], spot_from_row)
            }
        }
        .map_err(sqlite("run tier query"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite("read tier rows"))
    }

    /// Count public spots inside `rect`; hidden spots never contribute to
    /// the total a viewport reports.
    fn count_in_rect(&self, rect: &Rect<f64>) -> Result<u64, StoreError> {
        let connection = self.lock()?;
        let (min, max) = (rect.min(), rect.max());
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM spots
                 WHERE is_public = 1 AND lat BETWEEN ?1 AND ?2 AND lng BETWEEN ?3 AND ?4",
                params![min.y, max.y, min.x, max.x],
                |row| row.get(0),
            )
            .map_err(sqlite("count spots"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn global_average_wilson(&self) -> Result<f64, StoreError> {
        let connection = self.lock()?;
        let value: Option<f64> = connection
            .query_row(
                "SELECT value FROM settings WHERE name = ?1",
                [GLOBAL_AVERAGE_SETTING],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite("read global average"))?;
        Ok(value.unwrap_or_default())
    }

    fn set_global_average_wilson(&self, value: f64) -> Result<(), StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO settings (name, value) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value",
                params![GLOBAL_AVERAGE_SETTING, value],
            )
            .map(|_| ())
            .map_err(sqlite("write global average"))
    }

    fn referenced_image_hashes(&self) -> Result<HashSet<String>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT image_hashes FROM spots")
            .map_err(sqlite("prepare image hash scan"))?;
        let lists = statement
            .query_map([], |row| json_column::<Vec<String>>(row, 0))
            .map_err(sqlite("scan image hashes"))?;
        let mut hashes = HashSet::new();
        for list in lists {
            hashes.extend(list.map_err(sqlite("read image hashes"))?);
        }
        Ok(hashes)
    }

    fn spots_for_source(&self, source: SourceId) -> Result<Vec<Spot>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT {SPOT_COLUMNS} FROM spots WHERE source_id = ?1 ORDER BY id"
            ))
            .map_err(sqlite("prepare source spots"))?;
        let rows = statement
            .query_map([to_sql_id(source.0)?], spot_from_row)
            .map_err(sqlite("query source spots"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite("read source spots"))
    }
}

impl RatingStore for SqliteStore {
    fn ratings_for_spot(&self, spot: SpotId) -> Result<Vec<Rating>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT {RATING_COLUMNS} FROM ratings WHERE spot_id = ?1 ORDER BY id"
            ))
            .map_err(sqlite("prepare spot ratings"))?;
        let rows = statement
            .query_map([to_sql_id(spot.0)?], rating_from_row)
            .map_err(sqlite("query spot ratings"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite("read spot ratings"))
    }

    fn rated_spot_ids(&self) -> Result<Vec<SpotId>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT DISTINCT spot_id FROM ratings ORDER BY spot_id")
            .map_err(sqlite("prepare rated spots"))?;
        let rows = statement
            .query_map([], |row| id_column(row, 0).map(SpotId))
            .map_err(sqlite("query rated spots"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite("read rated spots"))
    }

    fn insert_rating(&self, draft: RatingDraft) -> Result<Rating, StoreError> {
        let connection = self.lock()?;
        ensure_spot_exists(&connection, draft.spot_id)?;
        let now = Utc::now();
        connection
            .execute(
                "INSERT INTO ratings (spot_id, value, author_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![to_sql_id(draft.spot_id.0)?, draft.value, draft.author_id, now],
            )
            .map_err(sqlite("insert rating"))?;
        let raw = connection.last_insert_rowid();
        let id = u64::try_from(raw).map_err(|_| StoreError::Corrupt {
            id: raw,
            reason: "negative row id".into(),
        })?;
        Ok(Rating {
            id: RatingId(id),
            spot_id: draft.spot_id,
            value: draft.value,
            author_id: draft.author_id,
            created_at: now,
        })
    }

    fn update_rating(&self, id: RatingId, draft: RatingDraft) -> Result<Rating, StoreError> {
        let connection = self.lock()?;
        let previous = load_rating(&connection, id)?.ok_or(StoreError::MissingRating { id })?;
        ensure_spot_exists(&connection, draft.spot_id)?;
        connection
            .execute(
                "UPDATE ratings SET spot_id = ?1, value = ?2, author_id = ?3 WHERE id = ?4",
                params![
                    to_sql_id(draft.spot_id.0)?,
                    draft.value,
                    draft.author_id,
                    to_sql_id(id.0)?
                ],
            )
            .map_err(sqlite("update rating"))?;
        Ok(previous)
    }

    fn delete_rating(&self, id: RatingId) -> Result<Option<Rating>, StoreError> {
        let connection = self.lock()?;
        let Some(previous) = load_rating(&connection, id)? else {
            return Ok(None);
        };
        connection
            .execute("DELETE FROM ratings WHERE id = ?1", [to_sql_id(id.0)?])
            .map_err(sqlite("delete rating"))?;
        Ok(Some(previous))
    }
}

impl SourceStore for SqliteStore {
    fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(&format!("SELECT {SOURCE_COLUMNS} FROM sources ORDER BY id"))
            .map_err(sqlite("prepare source listing"))?;
        let rows = statement
            .query_map([], source_from_row)
            .map_err(sqlite("list sources"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite("read sources"))
    }

    fn get_source(&self, id: SourceId) -> Result<Option<Source>, StoreError> {
        let connection = self.lock()?;
        load_source(&connection, id)
    }

    fn create_source(&self, draft: SourceDraft) -> Result<Source, StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO sources (name, url, include_folders, record_folder_name, is_active, is_public)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    draft.name,
                    draft.url,
                    encode_json(&draft.include_folders)?,
                    draft.record_folder_name,
                    draft.is_active,
                    draft.is_public,
                ],
            )
            .map_err(sqlite("insert source"))?;
        let raw = connection.last_insert_rowid();
        let id = u64::try_from(raw).map_err(|_| StoreError::Corrupt {
            id: raw,
            reason: "negative row id".into(),
        })?;
        Ok(draft.into_source(SourceId(id)))
    }

    fn update_source(&self, id: SourceId, draft: SourceDraft) -> Result<Source, StoreError> {
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE sources SET name = ?1, url = ?2, include_folders = ?3,
                    record_folder_name = ?4, is_active = ?5, is_public = ?6
                 WHERE id = ?7",
                params![
                    draft.name,
                    draft.url,
                    encode_json(&draft.include_folders)?,
                    draft.record_folder_name,
                    draft.is_active,
                    draft.is_public,
                    to_sql_id(id.0)?,
                ],
            )
            .map_err(sqlite("update source"))?;
        if changed == 0 {
            return Err(StoreError::MissingSource { id });
        }
        load_source(&connection, id)?.ok_or(StoreError::MissingSource { id })
    }

    fn delete_source(&self, id: SourceId) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        connection
            .execute("DELETE FROM sources WHERE id = ?1", [to_sql_id(id.0)?])
            .map(|changed| changed > 0)
            .map_err(sqlite("delete source"))
    }

    fn record_sync(&self, id: SourceId, record: &SyncRecord) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let folders = record
            .available_folders
            .as_ref()
            .map(encode_json)
            .transpose()?;
        let changed = connection
            .execute(
                "UPDATE sources SET last_sync_at = ?1, last_sync_stats = ?2,
                    available_folders = COALESCE(?3, available_folders)
                 WHERE id = ?4",
                params![
                    record.at,
                    encode_json(&record.stats)?,
                    folders,
                    to_sql_id(id.0)?
                ],
            )
            .map_err(sqlite("record sync"))?;
        if changed == 0 {
            return Err(StoreError::MissingSource { id });
        }
        Ok(())
    }
}

impl ImageCacheStore for SqliteStore {
    fn get_cache_entry(&self, key: &str) -> Result<Option<ImageCacheEntry>, StoreError> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT key, hash, public_url, last_checked FROM image_cache WHERE key = ?1",
                [key],
                |row| {
                    Ok(ImageCacheEntry {
                        key: row.get(0)?,
                        hash: row.get(1)?,
                        public_url: row.get(2)?,
                        last_checked: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(sqlite("read image cache entry"))
    }

    fn put_cache_entry(&self, entry: &ImageCacheEntry) -> Result<(), StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT OR REPLACE INTO image_cache (key, hash, public_url, last_checked)
                 VALUES (?1, ?2, ?3, ?4)",
                params![entry.key, entry.hash, entry.public_url, entry.last_checked],
            )
            .map(|_| ())
            .map_err(sqlite("write image cache entry"))
    }

    fn delete_cache_entry(&self, key: &str) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        connection
            .execute("DELETE FROM image_cache WHERE key = ?1", [key])
            .map(|changed| changed > 0)
            .map_err(sqlite("delete image cache entry"))
    }

    fn list_cache_entries(&self) -> Result<Vec<ImageCacheEntry>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT key, hash, public_url, last_checked FROM image_cache ORDER BY key")
            .map_err(sqlite("prepare image cache listing"))?;
        let rows = statement
            .query_map([], |row| {
                Ok(ImageCacheEntry {
                    key: row.get(0)?,
                    hash: row.get(1)?,
                    public_url: row.get(2)?,
                    last_checked: row.get(3)?,
                })
            })
            .map_err(sqlite("list image cache"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite("read image cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spot_draft;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open in-memory store")
    }

    #[rstest]
    fn reopening_a_database_keeps_its_schema() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("spots.db");
        {
            let store = SqliteStore::open(&path).expect("create store");
            store
                .insert_spot(spot_draft("Ledge", 1.0, 2.0))
                .expect("insert spot");
        }
        let store = SqliteStore::open(&path).expect("reopen store");
        assert!(store.get_spot(SpotId(1)).expect("load").is_some());
    }

    #[rstest]
    fn rejects_databases_from_other_versions() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("spots.db");
        drop(SqliteStore::open(&path).expect("create store"));
        let connection = Connection::open(&path).expect("raw open");
        connection
            .execute("UPDATE schema_version SET version = 99", [])
            .expect("stamp version");
        drop(connection);

        let err = SqliteStore::open(&path).expect_err("version mismatch");
        assert!(matches!(err, StoreError::SchemaVersion { found: 99, .. }));
    }

    #[rstest]
    fn spot_round_trips_list_columns(store: SqliteStore) {
        let mut draft = spot_draft("Rail", 51.5, -0.12);
        draft.images = SpotImages::new(vec!["https://cdn/a.jpg".into()], vec!["abc".into()])
            .expect("aligned images");
        draft.tags = vec!["rail".into(), "night".into()];
        draft.video_ids = vec!["dQw4w9WgXcQ".into()];
        let inserted = store.insert_spot(draft).expect("insert");
        let loaded = store
            .get_spot(inserted.id)
            .expect("load")
            .expect("spot exists");
        assert_eq!(loaded, inserted);
    }

    #[rstest]
    fn unrated_tier_orders_by_random(store: SqliteStore) {
        for (name, random) in [("b", 0.7), ("a", 0.2), ("c", 0.4)] {
            let mut draft = spot_draft(name, 0.0, 0.0);
            draft.random = random;
            store.insert_spot(draft).expect("insert");
        }
        let rect = Rect::new(Coord { x: -1.0, y: -1.0 }, Coord { x: 1.0, y: 1.0 });
        let query = TierQuery {
            tier: Tier::Unrated,
            pivot: 1.0,
            limit: 2,
        };
        let names: Vec<_> = store
            .spots_in_tier(&rect, &query)
            .expect("tier read")
            .into_iter()
            .map(|spot| spot.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[rstest]
    fn rect_counts_exclude_hidden_spots(store: SqliteStore) {
        let mut hidden = spot_draft("Hidden", 0.5, 0.5);
        hidden.is_public = false;
        store.insert_spot(hidden).expect("insert hidden");
        store
            .insert_spot(spot_draft("Open", 0.2, 0.2))
            .expect("insert public");
        store
            .insert_spot(spot_draft("Far", 10.0, 10.0))
            .expect("insert outside");
        let rect = Rect::new(Coord { x: -1.0, y: -1.0 }, Coord { x: 1.0, y: 1.0 });
        assert_eq!(store.count_in_rect(&rect).expect("count"), 1);
    }

    #[rstest]
    fn record_sync_keeps_folders_when_not_recorded(store: SqliteStore) {
        let source = store
            .create_source(SourceDraft::new("Feed", "https://example.com/a.kml").expect("draft"))
            .expect("create source");
        let first = SyncRecord {
            at: Utc::now(),
            stats: crate::SyncStats::default(),
            available_folders: Some(vec!["Ledges".into()]),
        };
        store.record_sync(source.id, &first).expect("record");
        let second = SyncRecord {
            available_folders: None,
            ..first
        };
        store.record_sync(source.id, &second).expect("record");
        let loaded = store
            .get_source(source.id)
            .expect("load")
            .expect("source exists");
        assert_eq!(loaded.available_folders, vec!["Ledges".to_owned()]);
        assert!(loaded.last_sync_stats.is_some());
    }

    #[rstest]
    fn deleting_a_source_detaches_its_spots(store: SqliteStore) {
        let source = store
            .create_source(SourceDraft::new("Feed", "https://example.com/a.kml").expect("draft"))
            .expect("create source");
        let mut draft = spot_draft("Gap", 3.0, 4.0);
        draft.source = Some(source.id);
        let spot = store.insert_spot(draft).expect("insert");
        assert!(store.delete_source(source.id).expect("delete"));
        let loaded = store.get_spot(spot.id).expect("load").expect("spot kept");
        assert_eq!(loaded.source, None);
    }
}

//! Idempotent creation of the spotsync SQLite schema.

use rusqlite::{Connection, OptionalExtension, Transaction};

use super::StoreError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Create every table and index inside one transaction and record the
/// schema version. Databases stamped with another version are rejected.
pub(crate) fn initialise_schema(connection: &mut Connection) -> Result<(), StoreError> {
    connection
        .pragma_update(None, "foreign_keys", true)
        .map_err(|source| StoreError::Sqlite {
            operation: "enable foreign keys",
            source,
        })?;

    let transaction = connection
        .transaction()
        .map_err(|source| StoreError::Sqlite {
            operation: "begin schema transaction",
            source,
        })?;

    create_tables(&transaction)?;
    create_indexes(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction.commit().map_err(|source| StoreError::Sqlite {
        operation: "commit schema transaction",
        source,
    })
}

fn create_tables(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "create sources",
        "CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK (length(trim(name)) > 0),
            url TEXT NOT NULL,
            include_folders TEXT NOT NULL DEFAULT '[]',
            record_folder_name INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_public INTEGER NOT NULL DEFAULT 1,
            last_sync_at TEXT,
            last_sync_stats TEXT,
            available_folders TEXT NOT NULL DEFAULT '[]'
        )",
    )?;
    run_migration_step(
        transaction,
        "create spots",
        "CREATE TABLE IF NOT EXISTS spots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            lat REAL NOT NULL,
            lng REAL NOT NULL,
            address TEXT,
            city TEXT,
            country_code TEXT,
            image_urls TEXT NOT NULL DEFAULT '[]',
            image_hashes TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            video_ids TEXT NOT NULL DEFAULT '[]',
            source_id INTEGER REFERENCES sources(id) ON DELETE SET NULL,
            source_name TEXT,
            is_public INTEGER NOT NULL DEFAULT 1,
            average_rating REAL NOT NULL DEFAULT 0,
            rating_count INTEGER NOT NULL DEFAULT 0,
            wilson_lower_bound REAL NOT NULL DEFAULT 0,
            random REAL NOT NULL CHECK (random >= 0 AND random < 1),
            folder_name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )?;
    run_migration_step(
        transaction,
        "create ratings",
        "CREATE TABLE IF NOT EXISTS ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            spot_id INTEGER NOT NULL REFERENCES spots(id) ON DELETE CASCADE,
            value REAL NOT NULL CHECK (value >= 0 AND value <= 5),
            author_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )?;
    run_migration_step(
        transaction,
        "create image_cache",
        "CREATE TABLE IF NOT EXISTS image_cache (
            key TEXT PRIMARY KEY,
            hash TEXT NOT NULL,
            public_url TEXT NOT NULL,
            last_checked TEXT NOT NULL
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "create settings",
        "CREATE TABLE IF NOT EXISTS settings (
            name TEXT PRIMARY KEY,
            value REAL NOT NULL
        ) WITHOUT ROWID",
    )
}

fn create_indexes(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "index spots by source location",
        "CREATE INDEX IF NOT EXISTS idx_spots_source_location
            ON spots(source_id, lat, lng)",
    )?;
    run_migration_step(
        transaction,
        "index spots by wilson bound",
        "CREATE INDEX IF NOT EXISTS idx_spots_wilson
            ON spots(is_public, wilson_lower_bound DESC, id)",
    )?;
    run_migration_step(
        transaction,
        "index spots by random",
        "CREATE INDEX IF NOT EXISTS idx_spots_random
            ON spots(is_public, wilson_lower_bound, random, id)",
    )?;
    run_migration_step(
        transaction,
        "index ratings by spot",
        "CREATE INDEX IF NOT EXISTS idx_ratings_spot ON ratings(spot_id)",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing: Option<i64> = transaction
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|source| StoreError::Sqlite {
            operation: "read schema version",
            source,
        })?;

    match existing {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(StoreError::SchemaVersion {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    operation: &'static str,
    sql: &str,
) -> Result<(), StoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| StoreError::Sqlite { operation, source })
}

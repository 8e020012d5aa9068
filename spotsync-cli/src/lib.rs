//! Command-line interface for spotsync administration and queries.
#![forbid(unsafe_code)]

use std::future::Future;
use std::io::Write;

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sha2::{Digest, Sha256};
use spotsync_core::{Caller, SqliteStore};

pub mod admin;
mod error;
pub mod logging;
mod maintenance;
mod query;
mod sources;
mod sync;

pub use admin::{AdminError, AdminOutcome, AdminService, AdminStores};
pub use error::CliError;
pub use logging::init_logging;

use maintenance::{CleanupArgs, RecomputeArgs};
use query::QueryArgs;
use sources::SourcesArgs;
use sync::SyncArgs;

const ARG_DATABASE: &str = "database";
const ARG_TOKEN: &str = "token";
const ARG_ADMIN_TOKEN: &str = "admin-token";
const ARG_STORAGE_DIR: &str = "storage-dir";
const ARG_PUBLIC_BASE_URL: &str = "public-base-url";
const ARG_GEOCODER_KEY: &str = "geocoder-key";
const ARG_GEOCODE_DELAY_MS: &str = "geocode-delay-ms";
const ARG_SOURCE_ID: &str = "source-id";
const ARG_NAME: &str = "name";
const ARG_URL: &str = "url";
const ARG_INCLUDE_FOLDER: &str = "include-folder";
const ARG_MIN_LAT: &str = "min-lat";
const ARG_MAX_LAT: &str = "max-lat";
const ARG_MIN_LNG: &str = "min-lng";
const ARG_MAX_LNG: &str = "max-lng";
const ARG_LIMIT: &str = "limit";

const ENV_SYNC_GEOCODER_KEY: &str = "SPOTSYNC_CMDS_SYNC_GEOCODER_KEY";
const ENV_SYNC_PUBLIC_BASE_URL: &str = "SPOTSYNC_CMDS_SYNC_PUBLIC_BASE_URL";
const ENV_CLEANUP_PUBLIC_BASE_URL: &str = "SPOTSYNC_CMDS_CLEANUP_IMAGES_PUBLIC_BASE_URL";
const ENV_SOURCES_SOURCE_ID: &str = "SPOTSYNC_CMDS_SOURCES_SOURCE_ID";
const ENV_SOURCES_NAME: &str = "SPOTSYNC_CMDS_SOURCES_NAME";
const ENV_SOURCES_URL: &str = "SPOTSYNC_CMDS_SOURCES_URL";
const ENV_QUERY_MIN_LAT: &str = "SPOTSYNC_CMDS_QUERY_MIN_LAT";
const ENV_QUERY_MAX_LAT: &str = "SPOTSYNC_CMDS_QUERY_MAX_LAT";
const ENV_QUERY_MIN_LNG: &str = "SPOTSYNC_CMDS_QUERY_MIN_LNG";
const ENV_QUERY_MAX_LNG: &str = "SPOTSYNC_CMDS_QUERY_MAX_LNG";

const DEFAULT_DATABASE: &str = "spotsync.db";
const DEFAULT_STORAGE_DIR: &str = "images";
const DEFAULT_QUERY_LIMIT: usize = 50;
const OPERATOR_ID: &str = "cli";

/// Run the spotsync CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli, &mut stdout)
}

fn dispatch(cli: Cli, writer: &mut dyn Write) -> Result<(), CliError> {
    match cli.command {
        Command::Sync(args) => sync::run_sync(args, writer),
        Command::Sources(args) => sources::run_sources(args, writer),
        Command::RecomputeRatings(args) => maintenance::run_recompute(args, writer),
        Command::CleanupImages(args) => maintenance::run_cleanup(args, writer),
        Command::Query(args) => query::run_query(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "spotsync",
    about = "Synchronise spot feeds, maintain ratings, and run ranked viewport queries",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Synchronise one source or every active source.
    Sync(SyncArgs),
    /// List, add, update, or remove sources.
    Sources(SourcesArgs),
    /// Recompute rating statistics for every rated spot.
    RecomputeRatings(RecomputeArgs),
    /// Delete unreferenced images and stale cache entries.
    CleanupImages(CleanupArgs),
    /// Print the ranked spots inside a viewport as JSON.
    Query(QueryArgs),
}

/// Map the presented token onto a caller.
///
/// Only a token equal to a configured, non-empty admin token yields an
/// administrator. A presented token that does not match yields an ordinary
/// caller, and no token yields no caller at all, so the privilege check
/// rejects both.
pub(crate) fn resolve_caller(token: Option<&str>, admin_token: Option<&str>) -> Option<Caller> {
    let presented = token?;
    match admin_token {
        Some(expected) if !expected.is_empty() && tokens_match(presented, expected) => {
            Some(Caller::admin(OPERATOR_ID))
        }
        _ => Some(Caller::user(OPERATOR_ID)),
    }
}

/// Compare tokens through their SHA-256 digests, touching every byte, so
/// the time taken does not depend on the length of the shared prefix.
pub(crate) fn tokens_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0_u8, |diff, (left, right)| diff | (left ^ right))
        == 0
}

pub(crate) fn open_store(path: &Utf8Path) -> Result<SqliteStore, CliError> {
    SqliteStore::open(path.as_std_path()).map_err(|source| CliError::OpenStore {
        path: path.to_path_buf(),
        source,
    })
}

/// Drive a future to completion on a single-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output, CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    Ok(runtime.block_on(future))
}

pub(crate) fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

/// Print an admin outcome and turn a reported failure into an error.
pub(crate) fn finish<T: Serialize>(
    operation: &'static str,
    outcome: &AdminOutcome<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    write_json(writer, outcome)?;
    if outcome.success {
        Ok(())
    } else {
        Err(CliError::AdminFailed {
            operation,
            message: outcome.error.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests;

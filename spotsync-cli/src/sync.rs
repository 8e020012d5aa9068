//! Sync command implementation for the spotsync CLI.

use std::io::Write;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use spotsync_core::{Caller, SourceId};
use spotsync_data::{
    HttpFetcher, HttpFetcherConfig, HttpGeocoder, HttpGeocoderConfig, LocalObjectStorage,
    SyncConfig,
};

use crate::{
    ARG_ADMIN_TOKEN, ARG_DATABASE, ARG_GEOCODE_DELAY_MS, ARG_GEOCODER_KEY, ARG_PUBLIC_BASE_URL,
    ARG_SOURCE_ID, ARG_STORAGE_DIR, ARG_TOKEN, AdminService, AdminStores, CliError,
    DEFAULT_DATABASE, DEFAULT_STORAGE_DIR, ENV_SYNC_GEOCODER_KEY, ENV_SYNC_PUBLIC_BASE_URL,
    block_on, finish, open_store, resolve_caller,
};

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch source exports, parse their placemarks, store images once per \
                  distinct content and merge the results into the spot database. \
                  Without --source-id every active source is synchronised in turn.",
    about = "Synchronise one source or every active source"
)]
#[ortho_config(prefix = "SPOTSYNC")]
pub(crate) struct SyncArgs {
    /// Path to the SQLite spot database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Token presented by the operator.
    #[arg(long = ARG_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) token: Option<String>,
    /// Token that grants administrator rights.
    #[arg(long = ARG_ADMIN_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) admin_token: Option<String>,
    /// Directory stored images are written to.
    #[arg(long = ARG_STORAGE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) storage_dir: Option<Utf8PathBuf>,
    /// URL prefix the image directory is served from.
    #[arg(long = ARG_PUBLIC_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) public_base_url: Option<String>,
    /// API key for the geocoding service.
    #[arg(long = ARG_GEOCODER_KEY, value_name = "key")]
    #[serde(default)]
    pub(crate) geocoder_key: Option<String>,
    /// Minimum spacing between geocoder calls in milliseconds.
    #[arg(long = ARG_GEOCODE_DELAY_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) geocode_delay_ms: Option<u64>,
    /// Synchronise only this source.
    #[arg(long = ARG_SOURCE_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) source_id: Option<u64>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncCommandConfig::try_from(merged)
    }
}

/// Which sources a sync run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncTarget {
    One(SourceId),
    All,
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncCommandConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) caller: Option<Caller>,
    pub(crate) storage_dir: Utf8PathBuf,
    pub(crate) public_base_url: String,
    pub(crate) geocoder_key: String,
    pub(crate) geocode_delay: Duration,
    pub(crate) target: SyncTarget,
}

impl TryFrom<SyncArgs> for SyncCommandConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let geocoder_key = args
            .geocoder_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(CliError::MissingArgument {
                field: ARG_GEOCODER_KEY,
                env: ENV_SYNC_GEOCODER_KEY,
            })?;
        let public_base_url = args.public_base_url.ok_or(CliError::MissingArgument {
            field: ARG_PUBLIC_BASE_URL,
            env: ENV_SYNC_PUBLIC_BASE_URL,
        })?;
        let geocode_delay = args
            .geocode_delay_ms
            .map_or(SyncConfig::default().geocode_delay, Duration::from_millis);
        let target = args
            .source_id
            .map_or(SyncTarget::All, |id| SyncTarget::One(SourceId(id)));

        Ok(Self {
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            caller: resolve_caller(args.token.as_deref(), args.admin_token.as_deref()),
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STORAGE_DIR)),
            public_base_url,
            geocoder_key,
            geocode_delay,
            target,
        })
    }
}

pub(crate) fn run_sync(args: SyncArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let store = open_store(&config.database)?;
    let fetcher = HttpFetcher::with_config(HttpFetcherConfig::default()).map_err(|source| {
        CliError::BuildClient {
            client: "feed fetcher",
            source,
        }
    })?;
    let geocoder = HttpGeocoder::with_config(HttpGeocoderConfig::new(config.geocoder_key.clone()))
        .map_err(|source| CliError::BuildClient {
            client: "geocoder",
            source,
        })?;
    let storage = LocalObjectStorage::open(&config.storage_dir, config.public_base_url.clone())
        .map_err(|source| CliError::OpenStorage {
            path: config.storage_dir.clone(),
            source,
        })?;

    let service = AdminService::new(AdminStores::shared(&store))
        .with_feeds(&fetcher, &geocoder)
        .with_storage(&storage)
        .with_sync_config(SyncConfig::default().with_geocode_delay(config.geocode_delay));
    let caller = config.caller.as_ref();
    match config.target {
        SyncTarget::One(id) => {
            let outcome = block_on(service.sync_source(caller, id))?;
            finish("sync_source", &outcome, writer)
        }
        SyncTarget::All => {
            let outcome = block_on(service.sync_all(caller))?;
            finish("sync_all", &outcome, writer)
        }
    }
}

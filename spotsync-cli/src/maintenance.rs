//! Rating recomputation and image cleanup commands.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use spotsync_core::Caller;
use spotsync_data::LocalObjectStorage;

use crate::{
    ARG_ADMIN_TOKEN, ARG_DATABASE, ARG_PUBLIC_BASE_URL, ARG_STORAGE_DIR, ARG_TOKEN, AdminService,
    AdminStores, CliError, DEFAULT_DATABASE, DEFAULT_STORAGE_DIR, ENV_CLEANUP_PUBLIC_BASE_URL,
    block_on, finish, open_store, resolve_caller,
};

/// CLI arguments for the `recompute-ratings` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Recompute rating statistics for every rated spot")]
#[ortho_config(prefix = "SPOTSYNC")]
pub(crate) struct RecomputeArgs {
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
}

pub(crate) fn run_recompute(args: RecomputeArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let database = merged
        .database
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE));
    let caller = resolve_caller(merged.token.as_deref(), merged.admin_token.as_deref());
    let store = open_store(&database)?;
    let service = AdminService::new(AdminStores::shared(&store));
    finish(
        "recompute_ratings",
        &service.recompute_ratings(caller.as_ref()),
        writer,
    )
}

/// CLI arguments for the `cleanup-images` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Delete stored images no spot references and drop cache entries whose \
                  object is gone. Do not run this while a sync is in progress: images \
                  uploaded for spots that are not written yet look unreferenced.",
    about = "Delete unreferenced images and stale cache entries"
)]
#[ortho_config(prefix = "SPOTSYNC")]
pub(crate) struct CleanupArgs {
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
    /// Directory stored images live in.
    #[arg(long = ARG_STORAGE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) storage_dir: Option<Utf8PathBuf>,
    /// URL prefix the image directory is served from.
    #[arg(long = ARG_PUBLIC_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) public_base_url: Option<String>,
}

/// Resolved `cleanup-images` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CleanupConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) caller: Option<Caller>,
    pub(crate) storage_dir: Utf8PathBuf,
    pub(crate) public_base_url: String,
}

impl TryFrom<CleanupArgs> for CleanupConfig {
    type Error = CliError;

    fn try_from(args: CleanupArgs) -> Result<Self, Self::Error> {
        let public_base_url = args.public_base_url.ok_or(CliError::MissingArgument {
            field: ARG_PUBLIC_BASE_URL,
            env: ENV_CLEANUP_PUBLIC_BASE_URL,
        })?;
        Ok(Self {
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            caller: resolve_caller(args.token.as_deref(), args.admin_token.as_deref()),
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STORAGE_DIR)),
            public_base_url,
        })
    }
}

pub(crate) fn run_cleanup(args: CleanupArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = CleanupConfig::try_from(merged)?;
    let store = open_store(&config.database)?;
    let storage = LocalObjectStorage::open(&config.storage_dir, config.public_base_url.clone())
        .map_err(|source| CliError::OpenStorage {
            path: config.storage_dir.clone(),
            source,
        })?;
    let service = AdminService::new(AdminStores::shared(&store)).with_storage(&storage);
    let outcome = block_on(service.cleanup_images(config.caller.as_ref()))?;
    finish("cleanup_images", &outcome, writer)
}

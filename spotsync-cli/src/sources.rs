//! Source administration commands.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use spotsync_core::{Caller, SourceDraft, SourceId};

use crate::{
    ARG_ADMIN_TOKEN, ARG_DATABASE, ARG_INCLUDE_FOLDER, ARG_NAME, ARG_SOURCE_ID, ARG_TOKEN, ARG_URL,
    AdminService, AdminStores, CliError, DEFAULT_DATABASE, ENV_SOURCES_NAME,
    ENV_SOURCES_SOURCE_ID, ENV_SOURCES_URL, finish, open_store, resolve_caller,
};

/// Operation performed by `spotsync sources`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum SourceAction {
    /// Print every source with its last run.
    #[default]
    List,
    /// Register a new source.
    Add,
    /// Replace the settings of an existing source.
    Update,
    /// Delete a source, keeping its spots.
    Remove,
}

/// CLI arguments for the `sources` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "List, add, update, or remove sources")]
#[ortho_config(prefix = "SPOTSYNC")]
pub(crate) struct SourcesArgs {
    /// Operation to perform; defaults to `list`.
    #[arg(value_enum, value_name = "action")]
    #[serde(default)]
    pub(crate) action: Option<SourceAction>,
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
    /// Source to update or remove.
    #[arg(long = ARG_SOURCE_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) source_id: Option<u64>,
    /// Display name of the source.
    #[arg(long = ARG_NAME, value_name = "name")]
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// URL of the source export.
    #[arg(long = ARG_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) url: Option<String>,
    /// Folder to import; repeat to import several, in order.
    #[arg(long = ARG_INCLUDE_FOLDER, value_name = "folder")]
    #[serde(default)]
    pub(crate) include_folders: Vec<String>,
    /// Record the originating folder on each spot.
    #[arg(long)]
    #[serde(default)]
    pub(crate) record_folder_name: bool,
    /// Leave the source out of bulk runs.
    #[arg(long)]
    #[serde(default)]
    pub(crate) inactive: bool,
    /// Create the source's spots hidden from the public map.
    #[arg(long)]
    #[serde(default)]
    pub(crate) private: bool,
}

impl SourcesArgs {
    pub(crate) fn into_config(self) -> Result<SourcesConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SourcesConfig::try_from(merged)
    }

    fn source_id(&self) -> Result<SourceId, CliError> {
        self.source_id.map(SourceId).ok_or(CliError::MissingArgument {
            field: ARG_SOURCE_ID,
            env: ENV_SOURCES_SOURCE_ID,
        })
    }

    fn draft(&self) -> Result<SourceDraft, CliError> {
        let name = self.name.clone().ok_or(CliError::MissingArgument {
            field: ARG_NAME,
            env: ENV_SOURCES_NAME,
        })?;
        let url = self.url.clone().ok_or(CliError::MissingArgument {
            field: ARG_URL,
            env: ENV_SOURCES_URL,
        })?;
        Ok(SourceDraft::new(name, url)?
            .with_include_folders(self.include_folders.clone())
            .with_record_folder_name(self.record_folder_name)
            .with_active(!self.inactive)
            .with_public(!self.private))
    }
}

/// Fully validated request of a `sources` invocation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SourcesRequest {
    List,
    Add(SourceDraft),
    Update(SourceId, SourceDraft),
    Remove(SourceId),
}

/// Resolved `sources` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SourcesConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) caller: Option<Caller>,
    pub(crate) request: SourcesRequest,
}

impl TryFrom<SourcesArgs> for SourcesConfig {
    type Error = CliError;

    fn try_from(args: SourcesArgs) -> Result<Self, Self::Error> {
        let request = match args.action.unwrap_or_default() {
            SourceAction::List => SourcesRequest::List,
            SourceAction::Add => SourcesRequest::Add(args.draft()?),
            SourceAction::Update => SourcesRequest::Update(args.source_id()?, args.draft()?),
            SourceAction::Remove => SourcesRequest::Remove(args.source_id()?),
        };
        Ok(Self {
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            caller: resolve_caller(args.token.as_deref(), args.admin_token.as_deref()),
            request,
        })
    }
}

pub(crate) fn run_sources(args: SourcesArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let store = open_store(&config.database)?;
    let service = AdminService::new(AdminStores::shared(&store));
    execute_sources(&service, &config, writer)
}

pub(crate) fn execute_sources(
    service: &AdminService<'_>,
    config: &SourcesConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let caller = config.caller.as_ref();
    match &config.request {
        SourcesRequest::List => finish("list_sources", &service.list_sources(caller), writer),
        SourcesRequest::Add(draft) => finish(
            "create_source",
            &service.create_source(caller, draft.clone()),
            writer,
        ),
        SourcesRequest::Update(id, draft) => finish(
            "update_source",
            &service.update_source(caller, *id, draft.clone()),
            writer,
        ),
        SourcesRequest::Remove(id) => {
            finish("delete_source", &service.delete_source(caller, *id), writer)
        }
    }
}

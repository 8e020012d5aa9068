//! Error types emitted by the spotsync CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use spotsync_core::{BoundsError, SourceDraftError, StoreError};
use spotsync_data::images::StorageError;
use spotsync_data::ConfigurationError;
use spotsync_scorer::ScorerError;
use thiserror::Error;

/// Errors emitted by the spotsync CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// Source details supplied on the command line were rejected.
    #[error("invalid source: {0}")]
    InvalidSource(#[from] SourceDraftError),
    /// The query viewport was rejected.
    #[error("invalid bounds: {0}")]
    InvalidBounds(#[from] BoundsError),
    /// Opening the spot database failed.
    #[error("failed to open spot database at {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: StoreError,
    },
    /// Opening the image directory failed.
    #[error("failed to open image storage at {path:?}: {source}")]
    OpenStorage {
        path: Utf8PathBuf,
        #[source]
        source: StorageError,
    },
    /// Building an HTTP client failed.
    #[error("failed to build {client}: {source}")]
    BuildClient {
        client: &'static str,
        #[source]
        source: ConfigurationError,
    },
    /// Starting the async runtime failed.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The ranked query failed.
    #[error("ranked query failed: {0}")]
    Query(#[source] ScorerError),
    /// An administrative operation reported failure.
    #[error("{operation} failed: {message}")]
    AdminFailed {
        operation: &'static str,
        message: String,
    },
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
    /// Installing the log subscriber failed.
    #[error("failed to initialise logging: {message}")]
    Logging { message: String },
}


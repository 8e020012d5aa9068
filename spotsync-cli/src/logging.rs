//! Log output for the `spotsync` binary.
//!
//! Library crates log through the `log` facade; the subscriber installed
//! here also captures those records.

use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install a formatted subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Logs go to stderr so JSON written to stdout stays machine-readable.
pub fn init_logging(default_filter: &str) -> Result<(), crate::CliError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| crate::CliError::Logging {
            message: err.to_string(),
        })
}

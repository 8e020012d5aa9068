//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use spotsync_cli::logging::DEFAULT_LOG_FILTER;

fn main() {
    if let Err(err) = spotsync_cli::init_logging(DEFAULT_LOG_FILTER) {
        eprintln!("spotsync: {err}");
    }
    if let Err(err) = spotsync_cli::run() {
        eprintln!("spotsync: {err}");
        std::process::exit(1);
    }
}

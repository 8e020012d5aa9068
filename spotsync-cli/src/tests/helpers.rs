//! Fixtures shared by the CLI unit and behaviour tests.

use super::*;
use camino::Utf8PathBuf;
use spotsync_core::{SpotDraft, SpotId, SpotStore};
use tempfile::TempDir;

/// A SQLite spot database inside a temporary directory.
#[derive(Debug)]
pub(super) struct TempDatabase {
    _tmp: TempDir,
    path: Utf8PathBuf,
}

impl TempDatabase {
    pub(super) fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        let path = root.join("spots.db");
        Self { _tmp: tmp, path }
    }

    pub(super) fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub(super) fn open(&self) -> SqliteStore {
        open_store(&self.path).expect("open temp database")
    }

    pub(super) fn insert(&self, draft: SpotDraft) -> SpotId {
        self.open().insert_spot(draft).expect("insert spot").id
    }
}

/// Parse `argv` and run the selected command, capturing stdout.
pub(super) fn run_cli<I, T>(argv: I) -> (Result<(), CliError>, String)
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let mut stdout = Vec::new();
    let result = Cli::try_parse_from(argv)
        .map_err(CliError::from)
        .and_then(|cli| dispatch(cli, &mut stdout));
    (result, String::from_utf8(stdout).expect("utf-8 output"))
}

pub(super) fn parse_json(output: &str) -> serde_json::Value {
    serde_json::from_str(output).expect("command should print JSON")
}

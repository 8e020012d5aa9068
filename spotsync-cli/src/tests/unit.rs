//! Focused unit tests covering CLI configuration resolution and commands.

use super::helpers::{TempDatabase, parse_json, run_cli};
use super::*;
use crate::maintenance::CleanupConfig;
use crate::sources::{SourceAction, SourcesConfig, SourcesRequest};
use crate::sync::{SyncCommandConfig, SyncTarget};
use rstest::rstest;
use spotsync_core::{Role, SourceId};
use std::time::Duration;

const ADMIN_TOKEN: &str = "s3cret";

#[rstest]
#[case(None, Some(ADMIN_TOKEN), None)]
#[case(Some(ADMIN_TOKEN), Some(ADMIN_TOKEN), Some(Role::Admin))]
#[case(Some("guess"), Some(ADMIN_TOKEN), Some(Role::User))]
#[case(Some(""), Some(""), Some(Role::User))]
#[case(Some(ADMIN_TOKEN), None, Some(Role::User))]
fn tokens_resolve_to_callers(
    #[case] token: Option<&str>,
    #[case] admin_token: Option<&str>,
    #[case] expected: Option<Role>,
) {
    let caller = resolve_caller(token, admin_token);
    assert_eq!(caller.map(|found| found.role), expected);
}

#[rstest]
#[case(ADMIN_TOKEN, ADMIN_TOKEN, true)]
#[case("s3cres", ADMIN_TOKEN, false)]
#[case("s3cret-and-more", ADMIN_TOKEN, false)]
#[case("", ADMIN_TOKEN, false)]
#[case("S3CRET", ADMIN_TOKEN, false)]
fn tokens_match_only_when_identical(
    #[case] presented: &str,
    #[case] expected: &str,
    #[case] matches: bool,
) {
    assert_eq!(tokens_match(presented, expected), matches);
}

#[rstest]
#[case(Some("s3cre"))]
#[case(Some("s3cret "))]
fn token_prefixes_and_extensions_stay_ordinary(#[case] token: Option<&str>) {
    let caller = resolve_caller(token, Some(ADMIN_TOKEN));
    assert_eq!(caller.map(|found| found.role), Some(Role::User));
}

fn sync_args() -> sync::SyncArgs {
    sync::SyncArgs {
        geocoder_key: Some("key".into()),
        public_base_url: Some("https://cdn.example/images".into()),
        ..sync::SyncArgs::default()
    }
}

#[rstest]
fn sync_requires_a_geocoder_key() {
    let args = sync::SyncArgs {
        geocoder_key: Some("  ".into()),
        ..sync_args()
    };
    let err = SyncCommandConfig::try_from(args).expect_err("blank key should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_GEOCODER_KEY);
            assert_eq!(env, ENV_SYNC_GEOCODER_KEY);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn sync_requires_a_public_base_url() {
    let args = sync::SyncArgs {
        public_base_url: None,
        ..sync_args()
    };
    let err = SyncCommandConfig::try_from(args).expect_err("missing url should error");
    assert!(matches!(
        err,
        CliError::MissingArgument {
            field: ARG_PUBLIC_BASE_URL,
            env: ENV_SYNC_PUBLIC_BASE_URL,
        }
    ));
}

#[rstest]
fn sync_defaults_to_every_source() {
    let config = SyncCommandConfig::try_from(sync_args()).expect("config should build");
    assert_eq!(config.target, SyncTarget::All);
    assert_eq!(config.database, Utf8Path::new(DEFAULT_DATABASE));
    assert_eq!(config.storage_dir, Utf8Path::new(DEFAULT_STORAGE_DIR));
    assert_eq!(config.geocode_delay, Duration::from_millis(200));
    assert!(config.caller.is_none());
}

#[rstest]
fn sync_targets_one_source_with_custom_delay() {
    let args = sync::SyncArgs {
        source_id: Some(7),
        geocode_delay_ms: Some(50),
        token: Some(ADMIN_TOKEN.into()),
        admin_token: Some(ADMIN_TOKEN.into()),
        ..sync_args()
    };
    let config = SyncCommandConfig::try_from(args).expect("config should build");
    assert_eq!(config.target, SyncTarget::One(SourceId(7)));
    assert_eq!(config.geocode_delay, Duration::from_millis(50));
    assert_eq!(config.caller.map(|caller| caller.role), Some(Role::Admin));
}

#[rstest]
fn sources_default_to_listing() {
    let config =
        SourcesConfig::try_from(sources::SourcesArgs::default()).expect("config should build");
    assert_eq!(config.request, SourcesRequest::List);
}

#[rstest]
#[case(SourceAction::Add, None, ARG_NAME)]
#[case(SourceAction::Update, None, ARG_SOURCE_ID)]
#[case(SourceAction::Update, Some(3), ARG_NAME)]
#[case(SourceAction::Remove, None, ARG_SOURCE_ID)]
fn sources_report_missing_arguments(
    #[case] action: SourceAction,
    #[case] source_id: Option<u64>,
    #[case] missing: &'static str,
) {
    let args = sources::SourcesArgs {
        action: Some(action),
        source_id,
        ..sources::SourcesArgs::default()
    };
    match SourcesConfig::try_from(args) {
        Err(CliError::MissingArgument { field, .. }) => assert_eq!(field, missing),
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn sources_reject_non_http_urls() {
    let args = sources::SourcesArgs {
        action: Some(SourceAction::Add),
        name: Some("Street feed".into()),
        url: Some("ftp://feeds.example/street.kml".into()),
        ..sources::SourcesArgs::default()
    };
    let err = SourcesConfig::try_from(args).expect_err("ftp should be rejected");
    assert!(matches!(err, CliError::InvalidSource(_)));
}

#[rstest]
fn sources_build_drafts_from_flags() {
    let args = sources::SourcesArgs {
        action: Some(SourceAction::Update),
        source_id: Some(4),
        name: Some("Street feed".into()),
        url: Some("https://feeds.example/street.kmz".into()),
        include_folders: vec!["Rails".into(), "Ledges".into()],
        record_folder_name: true,
        private: true,
        ..sources::SourcesArgs::default()
    };
    let config = SourcesConfig::try_from(args).expect("config should build");
    let SourcesRequest::Update(id, draft) = config.request else {
        panic!("expected an update request");
    };
    assert_eq!(id, SourceId(4));
    assert_eq!(draft.include_folders, vec!["Rails", "Ledges"]);
    assert!(draft.record_folder_name);
    assert!(draft.is_active);
    assert!(!draft.is_public);
}

#[rstest]
fn cleanup_requires_a_public_base_url() {
    let err = CleanupConfig::try_from(maintenance::CleanupArgs::default())
        .expect_err("missing url should error");
    assert!(matches!(
        err,
        CliError::MissingArgument {
            field: ARG_PUBLIC_BASE_URL,
            env: ENV_CLEANUP_PUBLIC_BASE_URL,
        }
    ));
}

fn admin_argv(database: &TempDatabase, command: &[&str]) -> Vec<String> {
    let mut argv = vec!["spotsync".to_owned()];
    argv.extend(command.iter().map(|arg| (*arg).to_owned()));
    argv.extend([
        format!("--{ARG_DATABASE}"),
        database.path().as_str().to_owned(),
        format!("--{ARG_TOKEN}"),
        ADMIN_TOKEN.to_owned(),
        format!("--{ARG_ADMIN_TOKEN}"),
        ADMIN_TOKEN.to_owned(),
    ]);
    argv
}

#[rstest]
fn sources_command_adds_and_lists_sources() {
    let database = TempDatabase::new();
    let (added, stdout) = run_cli(admin_argv(
        &database,
        &[
            "sources",
            "add",
            "--name",
            "Street feed",
            "--url",
            "https://feeds.example/street.kml",
            "--include-folder",
            "Rails",
        ],
    ));
    added.expect("add should succeed");
    let created = parse_json(&stdout);
    assert_eq!(created["success"], true);
    assert_eq!(created["stats"]["name"], "Street feed");

    let (listed, stdout) = run_cli(admin_argv(&database, &["sources"]));
    listed.expect("list should succeed");
    let sources = parse_json(&stdout);
    assert_eq!(sources["stats"].as_array().map(Vec::len), Some(1));
    assert_eq!(sources["stats"][0]["include_folders"][0], "Rails");
}

#[rstest]
fn admin_commands_fail_for_ordinary_tokens() {
    let database = TempDatabase::new();
    let argv = vec![
        "spotsync".to_owned(),
        "recompute-ratings".to_owned(),
        format!("--{ARG_DATABASE}"),
        database.path().as_str().to_owned(),
        format!("--{ARG_TOKEN}"),
        "guess".to_owned(),
        format!("--{ARG_ADMIN_TOKEN}"),
        ADMIN_TOKEN.to_owned(),
    ];
    let (result, stdout) = run_cli(argv);
    match result {
        Err(CliError::AdminFailed { operation, message }) => {
            assert_eq!(operation, "recompute_ratings");
            assert!(message.contains("not an administrator"), "{message}");
        }
        other => panic!("expected AdminFailed, found {other:?}"),
    }
    assert_eq!(parse_json(&stdout)["success"], false);
}

#[rstest]
fn recompute_command_reports_counts() {
    let database = TempDatabase::new();
    let (result, stdout) = run_cli(admin_argv(&database, &["recompute-ratings"]));
    result.expect("recompute should succeed");
    let outcome = parse_json(&stdout);
    assert_eq!(outcome["stats"]["recomputed"], 0);
    assert_eq!(outcome["stats"]["failed"].as_array().map(Vec::len), Some(0));
}

#[rstest]
fn unknown_subcommands_fail_to_parse() {
    let (result, stdout) = run_cli(["spotsync", "rebuild"]);
    assert!(matches!(result, Err(CliError::ArgumentParsing(_))));
    assert!(stdout.is_empty());
}

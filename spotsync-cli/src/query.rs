//! Ranked viewport query command.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use spotsync_core::{GeoBounds, SpotStore};
use spotsync_scorer::{BoundsQuery, RankedSpots, RankingEngine};

use crate::{
    ARG_DATABASE, ARG_LIMIT, ARG_MAX_LAT, ARG_MAX_LNG, ARG_MIN_LAT, ARG_MIN_LNG, CliError,
    DEFAULT_DATABASE, DEFAULT_QUERY_LIMIT, ENV_QUERY_MAX_LAT, ENV_QUERY_MAX_LNG,
    ENV_QUERY_MIN_LAT, ENV_QUERY_MIN_LNG, open_store, write_json,
};

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print the public spots inside a bounding box, best rated first, then \
                  unrated spots, then the rest. A box whose west edge is east of its \
                  east edge wraps across the 180th meridian.",
    about = "Print the ranked spots inside a viewport as JSON"
)]
#[ortho_config(prefix = "SPOTSYNC")]
pub(crate) struct QueryArgs {
    /// Path to the SQLite spot database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Southern edge in degrees.
    #[arg(long = ARG_MIN_LAT, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) min_lat: Option<f64>,
    /// Northern edge in degrees.
    #[arg(long = ARG_MAX_LAT, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) max_lat: Option<f64>,
    /// Western edge in degrees.
    #[arg(long = ARG_MIN_LNG, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) min_lng: Option<f64>,
    /// Eastern edge in degrees.
    #[arg(long = ARG_MAX_LNG, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) max_lng: Option<f64>,
    /// Maximum number of spots to print.
    #[arg(long = ARG_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

/// Resolved `query` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) query: BoundsQuery,
}

fn required(value: Option<f64>, field: &'static str, env: &'static str) -> Result<f64, CliError> {
    value.ok_or(CliError::MissingArgument { field, env })
}

impl TryFrom<QueryArgs> for QueryConfig {
    type Error = CliError;

    fn try_from(args: QueryArgs) -> Result<Self, Self::Error> {
        let bounds = GeoBounds::new(
            required(args.min_lat, ARG_MIN_LAT, ENV_QUERY_MIN_LAT)?,
            required(args.max_lat, ARG_MAX_LAT, ENV_QUERY_MAX_LAT)?,
            required(args.min_lng, ARG_MIN_LNG, ENV_QUERY_MIN_LNG)?,
            required(args.max_lng, ARG_MAX_LNG, ENV_QUERY_MAX_LNG)?,
        )?;
        Ok(Self {
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            query: BoundsQuery::new(bounds, args.limit.unwrap_or(DEFAULT_QUERY_LIMIT)),
        })
    }
}

pub(crate) fn run_query(args: QueryArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = QueryConfig::try_from(merged)?;
    let store = open_store(&config.database)?;
    let ranked = execute_query(&store, &config.query)?;
    write_json(writer, &ranked)
}

pub(crate) fn execute_query(
    spots: &dyn SpotStore,
    query: &BoundsQuery,
) -> Result<RankedSpots, CliError> {
    RankingEngine::new(spots)
        .query(query)
        .map_err(CliError::Query)
}

//! Behaviour-driven steps running the `query` command against SQLite.

use super::helpers::{TempDatabase, parse_json, run_cli};
use super::*;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use spotsync_core::test_support::spot_draft;
use spotsync_core::{RatingStats, SpotStore};
use std::cell::RefCell;

struct QueryWorld {
    database: TempDatabase,
    result: RefCell<Option<Result<(), CliError>>>,
    stdout: RefCell<String>,
}

impl QueryWorld {
    fn new() -> Self {
        Self {
            database: TempDatabase::new(),
            result: RefCell::new(None),
            stdout: RefCell::new(String::new()),
        }
    }

    fn rate(&self, name: &str, wilson: f64) {
        let id = self.database.insert(spot_draft(name, 41.15, -8.61));
        let stats = RatingStats {
            average_rating: wilson,
            rating_count: 4,
            wilson_lower_bound: wilson,
        };
        self.database
            .open()
            .set_rating_stats(id, stats)
            .expect("set rating stats");
    }

    fn query(&self, bounds: &[&str]) {
        let mut argv = vec![
            "spotsync".to_owned(),
            "query".to_owned(),
            format!("--{ARG_DATABASE}"),
            self.database.path().as_str().to_owned(),
        ];
        argv.extend(bounds.iter().map(|arg| (*arg).to_owned()));
        let (result, stdout) = run_cli(argv);
        *self.result.borrow_mut() = Some(result);
        *self.stdout.borrow_mut() = stdout;
    }

    fn take_result(&self) -> Result<(), CliError> {
        self.result
            .borrow_mut()
            .take()
            .expect("the command should have run")
    }
}

#[fixture]
fn world() -> QueryWorld {
    QueryWorld::new()
}

#[given("a database with a well rated, an unrated, and a poorly rated spot")]
fn mixed_database(#[from(world)] world: &QueryWorld) {
    world.rate("Rated poorly", 0.5);
    world.database.insert(spot_draft("Unrated", 41.16, -8.62));
    world.rate("Rated well", 3.0);
    world
        .database
        .open()
        .set_global_average_wilson(1.5)
        .expect("set pivot");
}

#[given("a database with spots on both sides of the dateline")]
fn dateline_database(#[from(world)] world: &QueryWorld) {
    world.database.insert(spot_draft("Fiji east", 0.0, 179.5));
    world.database.insert(spot_draft("Samoa west", 0.0, -179.5));
    world.database.insert(spot_draft("Greenwich", 0.0, 0.0));
}

#[when("I query the box around Porto with limit 2")]
fn query_porto(#[from(world)] world: &QueryWorld) {
    world.query(&[
        "--min-lat", "41.0", "--max-lat", "41.3", "--min-lng", "-8.8", "--max-lng", "-8.4",
        "--limit", "2",
    ]);
}

#[when("I query a box wrapping the dateline")]
fn query_dateline(#[from(world)] world: &QueryWorld) {
    world.query(&[
        "--min-lat", "-10", "--max-lat", "10", "--min-lng", "170", "--max-lng", "-170",
    ]);
}

#[when("I query without a southern edge")]
fn query_without_south(#[from(world)] world: &QueryWorld) {
    world.query(&["--max-lat", "41.3", "--min-lng", "-8.8", "--max-lng", "-8.4"]);
}

#[when("I query with inverted latitudes")]
fn query_inverted(#[from(world)] world: &QueryWorld) {
    world.query(&[
        "--min-lat", "42", "--max-lat", "41", "--min-lng", "-8.8", "--max-lng", "-8.4",
    ]);
}

#[then("the command succeeds")]
fn command_succeeds(#[from(world)] world: &QueryWorld) {
    if let Err(err) = world.take_result() {
        panic!("query failed: {err}");
    }
}

#[then("the output shows 2 of 3 spots")]
fn shows_two_of_three(#[from(world)] world: &QueryWorld) {
    assert_counts(world, 2, 3);
}

#[then("the output shows 2 of 2 spots")]
fn shows_two_of_two(#[from(world)] world: &QueryWorld) {
    assert_counts(world, 2, 2);
}

fn assert_counts(world: &QueryWorld, shown: u64, total: i64) {
    let output = parse_json(&world.stdout.borrow());
    assert_eq!(output["shownCount"].as_u64(), Some(shown), "{output}");
    assert_eq!(output["totalCount"].as_i64(), Some(total), "{output}");
    let printed = output["spots"].as_array().map_or(0, Vec::len);
    assert_eq!(u64::try_from(printed).ok(), Some(shown));
}

#[then("the first printed spot is \"Rated well\"")]
fn first_is_rated_well(#[from(world)] world: &QueryWorld) {
    let output = parse_json(&world.stdout.borrow());
    assert_eq!(output["spots"][0]["name"], "Rated well");
    assert_eq!(output["spots"][1]["name"], "Unrated");
}

#[then("the command fails with a missing argument for \"min-lat\"")]
fn fails_missing_min_lat(#[from(world)] world: &QueryWorld) {
    match world.take_result() {
        Err(CliError::MissingArgument { field, env }) => {
            assert_eq!(field, ARG_MIN_LAT);
            assert_eq!(env, ENV_QUERY_MIN_LAT);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
    assert!(world.stdout.borrow().is_empty());
}

#[then("the command fails with invalid bounds")]
fn fails_invalid_bounds(#[from(world)] world: &QueryWorld) {
    match world.take_result() {
        Err(CliError::InvalidBounds(_)) => {}
        other => panic!("expected InvalidBounds, found {other:?}"),
    }
}

macro_rules! register_query_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/query_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: QueryWorld) {
            let _ = world;
        }
    };
}

register_query_scenario!(query_prints_ranked_json, "printing ranked spots as JSON");
register_query_scenario!(query_wraps_dateline, "querying across the antimeridian");
register_query_scenario!(query_requires_south_edge, "rejecting a query without a southern edge");
register_query_scenario!(query_rejects_inverted_latitudes, "rejecting inverted latitudes");

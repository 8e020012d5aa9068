//! Behavioural coverage for incremental rating aggregation.
#![expect(clippy::expect_used, reason = "scenario steps fail fast on setup errors")]

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use spotsync_core::test_support::{MemoryStore, spot_draft};
use spotsync_core::{RatingDraft, RatingId, RatingStats, RatingStore, SpotId, SpotStore};
use spotsync_scorer::{RatingAggregator, RatingChange, RecomputeReport};

struct RatingWorld {
    store: MemoryStore,
    spots: RefCell<Vec<SpotId>>,
    ratings: RefCell<Vec<RatingId>>,
    report: RefCell<Option<RecomputeReport>>,
}

impl RatingWorld {
    fn aggregator(&self) -> RatingAggregator<'_> {
        RatingAggregator::new(&self.store, &self.store)
    }

    fn spot(&self, index: usize) -> SpotId {
        *self
            .spots
            .borrow()
            .get(index)
            .expect("spot should have been created")
    }

    fn stats(&self, index: usize) -> RatingStats {
        self.store
            .get_spot(self.spot(index))
            .expect("load spot")
            .expect("spot exists")
            .rating
    }

    fn add_spot(&self, name: &str) -> SpotId {
        let spot = self
            .store
            .insert_spot(spot_draft(name, 0.0, 0.0))
            .expect("insert spot");
        self.spots.borrow_mut().push(spot.id);
        spot.id
    }

    fn rate(&self, spot: SpotId, value: f64) -> RatingId {
        let draft = RatingDraft::new(spot, value, "author").expect("valid rating");
        let rating = self.store.insert_rating(draft).expect("insert rating");
        self.ratings.borrow_mut().push(rating.id);
        rating.id
    }
}

#[fixture]
fn world() -> RatingWorld {
    RatingWorld {
        store: MemoryStore::default(),
        spots: RefCell::new(Vec::new()),
        ratings: RefCell::new(Vec::new()),
        report: RefCell::new(None),
    }
}

#[given("a spot rated 5.0 and 3.0")]
fn rated_spot(world: &RatingWorld) {
    let spot = world.add_spot("Ledge");
    world.rate(spot, 5.0);
    world.rate(spot, 3.0);
}

#[given("a second spot without ratings")]
fn second_spot(world: &RatingWorld) {
    world.add_spot("Gap");
}

#[given("three rated spots whose stored statistics are stale")]
fn stale_spots(world: &RatingWorld) {
    for (name, value) in [("a", 1.0), ("b", 4.0), ("c", 5.0)] {
        let spot = world.add_spot(name);
        world.rate(spot, value);
    }
}

#[given("writing statistics fails for the second spot")]
fn failing_write(world: &RatingWorld) {
    world.store.fail_rating_stats_for(world.spot(1));
}

#[when("the aggregator handles a created rating")]
fn handle_created(world: &RatingWorld) {
    let spot = world.spot(0);
    let updated = world
        .aggregator()
        .on_rating_changed(RatingChange::Created { spot })
        .expect("recompute");
    assert_eq!(updated.len(), 1);
}

#[when("one rating moves to the second spot")]
fn move_rating(world: &RatingWorld) {
    let (from, to) = (world.spot(0), world.spot(1));
    let moved = *world.ratings.borrow().first().expect("a rating exists");
    let draft = RatingDraft::new(to, 5.0, "author").expect("valid rating");
    let previous = world.store.update_rating(moved, draft).expect("update rating");
    assert_eq!(previous.spot_id, from);
    world
        .aggregator()
        .on_rating_changed(RatingChange::Updated {
            previous_spot: previous.spot_id,
            spot: to,
        })
        .expect("recompute");
}

#[when("every rating of the spot is deleted")]
fn delete_ratings(world: &RatingWorld) {
    let spot = world.spot(0);
    world
        .aggregator()
        .on_rating_changed(RatingChange::Created { spot })
        .expect("recompute");
    for id in world.ratings.borrow().iter() {
        world.store.delete_rating(*id).expect("delete rating");
        world
            .aggregator()
            .on_rating_changed(RatingChange::Deleted { spot })
            .expect("recompute");
    }
}

#[when("every rated spot is recomputed")]
fn recompute_all(world: &RatingWorld) {
    let report = world.aggregator().recompute_all().expect("bulk recompute");
    world.report.replace(Some(report));
}

#[then("the spot has 2 ratings averaging 4.0")]
fn two_ratings(world: &RatingWorld) {
    let stats = world.stats(0);
    assert_eq!(stats.rating_count, 2);
    assert_eq!(stats.average_rating, 4.0);
}

#[then("its Wilson bound is above zero and below 4.0")]
fn bounded(world: &RatingWorld) {
    let wilson = world.stats(0).wilson_lower_bound;
    assert!(wilson > 0.0 && wilson < 4.0, "unexpected bound {wilson}");
}

#[then("the first spot has 1 rating")]
fn first_has_one(world: &RatingWorld) {
    let stats = world.stats(0);
    assert_eq!(stats.rating_count, 1);
    assert_eq!(stats.average_rating, 3.0);
}

#[then("the second spot has 1 rating")]
fn second_has_one(world: &RatingWorld) {
    let stats = world.stats(1);
    assert_eq!(stats.rating_count, 1);
    assert_eq!(stats.average_rating, 5.0);
}

#[then("the spot's statistics are zero")]
fn zeroed(world: &RatingWorld) {
    assert_eq!(world.stats(0), RatingStats::ZERO);
}

#[then("2 spots were recomputed and 1 failed")]
fn report_counts(world: &RatingWorld) {
    let report = world.report.borrow().clone().expect("a bulk run happened");
    assert_eq!(report.recomputed, 2);
    assert_eq!(report.failed, vec![world.spot(1)]);
    assert_eq!(world.stats(0).rating_count, 1);
    assert_eq!(world.stats(1), RatingStats::ZERO);
    assert_eq!(world.stats(2).average_rating, 5.0);
}

#[then("running the bulk recomputation again gives the same statistics")]
fn idempotent(world: &RatingWorld) {
    let before: Vec<RatingStats> = (0..3).map(|index| world.stats(index)).collect();
    let report = world.aggregator().recompute_all().expect("bulk recompute");
    let after: Vec<RatingStats> = (0..3).map(|index| world.stats(index)).collect();
    assert_eq!(report.recomputed, 2);
    assert_eq!(before, after);
}

#[scenario(path = "tests/features/ratings.feature", index = 0)]
fn created_rating(world: RatingWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/ratings.feature", index = 1)]
fn moved_rating(world: RatingWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/ratings.feature", index = 2)]
fn deleted_ratings(world: RatingWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/ratings.feature", index = 3)]
fn bulk_recompute(world: RatingWorld) {
    let _ = world;
}

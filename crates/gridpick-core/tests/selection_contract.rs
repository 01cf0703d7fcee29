//! Contract Test: Pick Selection
//!
//! Constraints verified:
//! - A pick and its usage counter change together
//! - The usage cap rejects picks without mutating anything
//! - Resubmitting the same driver is a no-op
//! - A round locks on its date
//! - Unknown users, rounds and drivers are rejected

mod common;

use common::*;
use gridpick_core::config::{PlayerConfig, PlayerRole};
use gridpick_core::traits::{CacheKind, CacheStore, LedgerStore, Pick};
use gridpick_core::{Error, LedgerEvent, MemoryStore, PickOutcome, UsagePolicy};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

async fn assert_counters_match_picks(harness: &Harness) {
    let mut expected: BTreeMap<(String, String), u32> = BTreeMap::new();
    for pick in harness.store.all_picks().await.unwrap() {
        if let Some(driver) = pick.driver {
            *expected.entry((pick.user, driver)).or_insert(0) += 1;
        }
    }

    let recorded: BTreeMap<(String, String), u32> = harness
        .store
        .usage_counters()
        .await
        .unwrap()
        .into_iter()
        .map(|c| ((c.user, c.driver), c.count))
        .collect();

    assert_eq!(recorded, expected, "usage counters diverged from live picks");
}

#[tokio::test]
async fn simple_cap_rejects_third_pick_of_same_driver() {
    let harness = Harness::new(UsagePolicy::SimpleCap { cap: 2 });

    assert_eq!(
        assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await),
        PickOutcome::Created
    );
    assert_ok!(harness.engine.submit_pick("alice", 2, "VER").await);

    let err = assert_err!(harness.engine.submit_pick("alice", 3, "VER").await);
    assert!(matches!(
        err,
        Error::ConstraintViolation { ref driver, count: 2, .. } if driver == "VER"
    ));

    // Rejected submission left no trace
    assert_eq!(harness.store.get_pick("alice", 3).await.unwrap(), None);
    assert_eq!(harness.store.usage("alice").await.unwrap().count("VER"), 2);

    // Other players are unaffected
    assert_ok!(harness.engine.submit_pick("bob", 3, "VER").await);
}

#[tokio::test]
async fn same_driver_resubmission_is_noop() {
    let mut harness = Harness::new(UsagePolicy::default());

    assert_ok!(harness.engine.submit_pick("alice", 1, "HAM").await);
    let outcome = assert_ok!(harness.engine.submit_pick("alice", 1, "HAM").await);

    assert_eq!(outcome, PickOutcome::Unchanged);
    assert_eq!(harness.store.usage("alice").await.unwrap().count("HAM"), 1);

    let events = harness.drain_events();
    assert!(matches!(events.last(), Some(LedgerEvent::PickUnchanged { .. })));
}

#[tokio::test]
async fn resubmission_at_cap_is_still_a_noop() {
    let harness = Harness::new(UsagePolicy::SimpleCap { cap: 1 });

    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);
    assert_eq!(
        assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await),
        PickOutcome::Unchanged
    );
}

#[tokio::test]
async fn changing_a_pick_frees_the_previous_driver() {
    let harness = Harness::new(UsagePolicy::SimpleCap { cap: 2 });

    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);
    assert_ok!(harness.engine.submit_pick("alice", 2, "VER").await);

    let outcome = assert_ok!(harness.engine.submit_pick("alice", 2, "HAM").await);
    assert_eq!(
        outcome,
        PickOutcome::Changed {
            previous: "VER".to_string()
        }
    );

    assert_ok!(harness.engine.submit_pick("alice", 3, "VER").await);
    assert_counters_match_picks(&harness).await;
}

#[tokio::test]
async fn replacing_a_capped_driver_within_its_own_slot_is_allowed() {
    let harness = Harness::new(UsagePolicy::SimpleCap { cap: 2 });

    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);
    assert_ok!(harness.engine.submit_pick("alice", 2, "VER").await);
    assert_ok!(harness.engine.submit_pick("alice", 2, "HAM").await);
    // VER is back to one use, so the slot can take it again
    assert_ok!(harness.engine.submit_pick("alice", 2, "VER").await);

    assert_eq!(harness.store.usage("alice").await.unwrap().count("VER"), 2);
    assert_eq!(harness.store.usage("alice").await.unwrap().count("HAM"), 0);
}

#[tokio::test]
async fn usage_counters_match_live_picks_after_every_submission() {
    let harness = Harness::new(UsagePolicy::SimpleCap { cap: 2 });
    let script = [
        ("alice", 1, "VER"),
        ("alice", 2, "VER"),
        ("bob", 1, "LEC"),
        ("alice", 3, "VER"),
        ("alice", 1, "HAM"),
        ("alice", 3, "VER"),
        ("bob", 1, "LEC"),
        ("bob", 2, "NOR"),
        ("bob", 1, "NOR"),
        ("bob", 3, "NOR"),
    ];

    for (user, round, driver) in script {
        let _ = harness.engine.submit_pick(user, round, driver).await;
        assert_counters_match_picks(&harness).await;
    }

    assert_eq!(harness.store.usage("alice").await.unwrap().count("VER"), 2);
    assert_eq!(harness.store.usage("bob").await.unwrap().count("NOR"), 2);
}

#[tokio::test]
async fn locked_round_rejects_submission() {
    let mut harness = Harness::new(UsagePolicy::default());
    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);

    // The round locks on its own date
    harness.set_today(date(YEAR, 3, 16));
    let err = assert_err!(harness.engine.submit_pick("alice", 1, "HAM").await);
    assert!(matches!(err, Error::RoundLocked { round: 1, .. }));

    let pick = harness.store.get_pick("alice", 1).await.unwrap().unwrap();
    assert_eq!(pick.driver.as_deref(), Some("VER"));

    // Later rounds are still open
    assert_ok!(harness.engine.submit_pick("alice", 2, "HAM").await);

    let rejected = harness
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, LedgerEvent::PickRejected { .. }))
        .count();
    assert_eq!(rejected, 1);
}

#[tokio::test]
async fn editing_an_open_round_resets_points() {
    let harness = Harness::new(UsagePolicy::default());
    assert_ok!(harness.engine.submit_pick("alice", 2, "VER").await);
    assert!(harness.store.resolve_points("alice", 2, "VER", 25).await.unwrap());

    assert_ok!(harness.engine.submit_pick("alice", 2, "HAM").await);

    let pick = harness.store.get_pick("alice", 2).await.unwrap().unwrap();
    assert_eq!(
        pick,
        Pick {
            user: "alice".to_string(),
            round: 2,
            driver: Some("HAM".to_string()),
            points: None,
        }
    );
}

#[tokio::test]
async fn unknown_user_round_and_driver_are_not_found() {
    let mut config = league(&["alice", "bob"], UsagePolicy::default());
    config.players.push(PlayerConfig {
        username: "admin".to_string(),
        role: PlayerRole::Admin,
    });
    let harness = Harness::build(FakeRaceData::new(), Arc::new(MemoryStore::new()), config);

    let err = assert_err!(harness.engine.submit_pick("mallory", 1, "VER").await);
    assert!(matches!(err, Error::NotFound(_)));

    let err = assert_err!(harness.engine.submit_pick("admin", 1, "VER").await);
    assert!(matches!(err, Error::NotFound(_)));

    let err = assert_err!(harness.engine.submit_pick("alice", 99, "VER").await);
    assert!(matches!(err, Error::NotFound(_)));

    let err = assert_err!(harness.engine.submit_pick("alice", 1, "XXX").await);
    assert!(matches!(err, Error::NotFound(_)));

    assert!(harness.store.all_picks().await.unwrap().is_empty());
}

#[tokio::test]
async fn submission_needs_schedule_and_roster() {
    let harness = Harness::new(UsagePolicy::default());
    harness.provider.set_failing(true);

    let err = assert_err!(harness.engine.submit_pick("alice", 1, "VER").await);
    assert!(err.is_provider_unavailable());

    // Once both lookups are cached, an outage no longer blocks submissions
    harness.provider.set_failing(false);
    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);
    harness.provider.set_failing(true);
    assert_ok!(harness.engine.submit_pick("alice", 2, "HAM").await);
    assert_eq!(harness.provider.schedule_calls(), 2);
}

#[tokio::test]
async fn stale_listings_are_served_during_an_outage() {
    let harness = Harness::new(UsagePolicy::default());
    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);

    // Past the 24 hour listing lifetime
    harness.clock.advance(chrono::Duration::days(2));
    harness.provider.set_failing(true);

    assert_ok!(harness.engine.submit_pick("alice", 2, "HAM").await);
    assert!(
        harness
            .store
            .get_entry(CacheKind::Roster, "2025")
            .await
            .unwrap()
            .is_some()
    );
}

//! Contract Test: Standings and Read Models
//!
//! Constraints verified:
//! - Totals equal the sum of resolved points, unresolved counting as 0
//! - Ties break by ascending username; players without picks appear with 0
//! - Picks naming off-roster drivers are excluded and reported
//! - Picks whose usage counter disagrees with the ledger score nothing and
//!   block further picks of that driver
//! - Boards, availability, reminders and team lookups reflect the ledger

mod common;

use common::*;
use gridpick_core::traits::{LedgerStore, TeamInfo};
use gridpick_core::{Error, FileStore, LedgerEvent, MemoryStore, UsagePolicy};
use std::sync::Arc;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};

fn three_players() -> Harness {
    Harness::build(
        FakeRaceData::new(),
        Arc::new(MemoryStore::new()),
        league(&["carol", "bob", "alice"], UsagePolicy::default()),
    )
}

#[tokio::test]
async fn ties_break_by_username_and_empty_players_score_zero() {
    let harness = three_players();
    let engine = &harness.engine;

    assert_ok!(engine.submit_pick("carol", 1, "VER").await);
    assert_ok!(engine.submit_pick("bob", 1, "VER").await);
    harness.set_today(date(YEAR, 3, 17));
    harness.provider.publish_results(1, &["VER"]);

    let standings = assert_ok!(engine.standings().await);
    let order: Vec<_> = standings
        .iter()
        .map(|s| (s.user.as_str(), s.total))
        .collect();
    assert_eq!(order, vec![("bob", 25), ("carol", 25), ("alice", 0)]);
}

#[tokio::test]
async fn totals_equal_sum_of_resolved_points() {
    let harness = three_players();
    let engine = &harness.engine;

    for (user, round, driver) in [
        ("alice", 1, "VER"),
        ("alice", 2, "HAM"),
        ("alice", 3, "LEC"),
        ("bob", 1, "NOR"),
        ("bob", 2, "VER"),
    ] {
        assert_ok!(engine.submit_pick(user, round, driver).await);
    }
    harness.provider.publish_results(1, &["VER", "NOR"]);
    harness.provider.publish_results(2, &["HAM", "LEC", "VER"]);
    harness.set_today(date(YEAR, 3, 24));

    let standings = assert_ok!(engine.standings().await);
    for entry in &standings {
        let expected: u32 = harness
            .store
            .picks_for_user(&entry.user)
            .await
            .unwrap()
            .iter()
            .map(|p| p.points.unwrap_or(0))
            .sum();
        assert_eq!(entry.total, expected, "total of {}", entry.user);
    }
    assert_eq!(standings[0].user, "alice");
    assert_eq!(standings[0].total, 50);
    assert_eq!(standings[1].total, 18 + 15);

    let progression = assert_ok!(engine.progression().await);
    let alice = progression.iter().find(|p| p.user == "alice").unwrap();
    assert_eq!(alice.rounds, vec![1, 2, 3]);
    assert_eq!(alice.cumulative, vec![25, 50, 50]);

    let sheets = assert_ok!(engine.season_sheets().await);
    let bob = sheets.iter().find(|s| s.user == "bob").unwrap();
    assert_eq!(bob.picks.len(), 2);
    assert_eq!(bob.total, 33);
}

#[tokio::test]
async fn off_roster_picks_are_excluded_and_reported() {
    let mut harness = Harness::new(UsagePolicy::default());
    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);

    // A pick written behind the engine's back, naming a driver the roster lacks
    harness.store.commit_selection("bob", 1, "ZZZ").await.unwrap();
    assert!(harness.store.resolve_points("bob", 1, "ZZZ", 25).await.unwrap());

    harness.set_today(date(YEAR, 3, 17));
    harness.provider.publish_results(1, &["HAM", "VER"]);

    let standings = assert_ok!(harness.engine.standings().await);
    let order: Vec<_> = standings
        .iter()
        .map(|s| (s.user.as_str(), s.total))
        .collect();
    assert_eq!(order, vec![("alice", 18), ("bob", 0)]);

    let reported = harness
        .drain_events()
        .into_iter()
        .any(|e| matches!(e, LedgerEvent::InconsistencyDetected { .. }));
    assert!(reported);

    let findings = assert_ok!(harness.engine.audit().await);
    assert_eq!(findings.len(), 1);
    assert!(matches!(findings[0], Error::DataInconsistency(ref msg) if msg.contains("ZZZ")));
}

#[tokio::test]
async fn picks_with_drifted_counters_score_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let ledger = serde_json::json!({
        "version": "1.0",
        "picks": [
            { "user": "alice", "round": 1, "driver": "VER", "points": 25 },
            { "user": "alice", "round": 2, "driver": "VER", "points": null },
            { "user": "bob", "round": 1, "driver": "HAM", "points": 18 }
        ],
        "usage": [
            { "user": "alice", "driver": "VER", "count": 1 },
            { "user": "bob", "driver": "HAM", "count": 1 }
        ]
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&ledger).unwrap()).unwrap();

    let store = Arc::new(FileStore::new(&path).await.unwrap());
    let mut harness = Harness::build(
        FakeRaceData::new(),
        store,
        league(&["alice", "bob"], UsagePolicy::SimpleCap { cap: 2 }),
    );
    harness.provider.publish_results(1, &["VER", "HAM"]);
    harness.provider.publish_results(2, &["VER"]);
    harness.set_today(date(YEAR, 3, 24));

    let standings = assert_ok!(harness.engine.standings().await);
    let order: Vec<_> = standings
        .iter()
        .map(|s| (s.user.as_str(), s.total))
        .collect();
    assert_eq!(order, vec![("bob", 18), ("alice", 0)]);

    let progression = assert_ok!(harness.engine.progression().await);
    let alice = progression.iter().find(|p| p.user == "alice").unwrap();
    assert!(alice.cumulative.iter().all(|total| *total == 0));

    let sheets = assert_ok!(harness.engine.season_sheets().await);
    let alice = sheets.iter().find(|s| s.user == "alice").unwrap();
    assert_eq!(alice.total, 0);

    let reported = harness
        .drain_events()
        .into_iter()
        .any(|e| matches!(e, LedgerEvent::InconsistencyDetected { ref detail } if detail.contains("alice/VER")));
    assert!(reported);

    // The stale counter must not open a third VER slot under a cap of 2
    let err = assert_err!(harness.engine.submit_pick("alice", 3, "VER").await);
    assert!(matches!(err, Error::DataInconsistency(_)));
    let live = harness
        .store
        .picks_for_user("alice")
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.driver.as_deref() == Some("VER"))
        .count();
    assert_eq!(live, 2);

    // Other drivers are unaffected
    assert_ok!(harness.engine.submit_pick("alice", 3, "LEC").await);
}

#[tokio::test]
async fn audit_of_a_clean_ledger_is_empty() {
    let harness = Harness::new(UsagePolicy::default());
    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);
    assert_ok!(harness.engine.submit_pick("alice", 1, "HAM").await);
    assert_ok!(harness.engine.submit_pick("bob", 2, "HAM").await);

    let findings = assert_ok!(harness.engine.audit().await);
    assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
}

#[tokio::test]
async fn season_board_shows_picks_points_and_lock_state() {
    let harness = Harness::new(UsagePolicy::default());
    assert_ok!(harness.engine.submit_pick("alice", 1, "VER").await);
    assert_ok!(harness.engine.submit_pick("alice", 3, "LEC").await);
    harness.provider.publish_results(1, &["VER"]);
    harness.set_today(date(YEAR, 3, 20));

    let board = assert_ok!(harness.engine.season_board("alice").await);
    assert_eq!(board.len(), 6);

    assert_eq!(board[0].round.number, 1);
    assert_eq!(board[0].driver.as_deref(), Some("VER"));
    assert_eq!(board[0].points, Some(25));
    assert!(!board[0].open);

    assert_eq!(board[1].driver, None);
    assert!(board[1].open);

    assert_eq!(board[2].driver.as_deref(), Some("LEC"));
    assert_eq!(board[2].points, None);

    assert!(harness.engine.season_board("mallory").await.is_err());
}

#[tokio::test]
async fn current_round_is_first_round_today_or_later() {
    let harness = Harness::new(UsagePolicy::default());

    let round = assert_ok!(harness.engine.current_round().await).unwrap();
    assert_eq!(round.number, 1);

    // On race day the round is locked but still current
    harness.set_today(date(YEAR, 3, 23));
    let round = assert_ok!(harness.engine.current_round().await).unwrap();
    assert_eq!(round.number, 2);

    harness.set_today(date(YEAR, 12, 31));
    assert_eq!(assert_ok!(harness.engine.current_round().await), None);
}

#[tokio::test]
async fn missing_picks_lists_players_without_a_driver() {
    let harness = three_players();
    assert_ok!(harness.engine.submit_pick("bob", 2, "VER").await);

    let missing = assert_ok!(harness.engine.missing_picks(2).await);
    assert_eq!(missing, vec!["carol".to_string(), "alice".to_string()]);

    // Empty slots from a season reset still count as missing
    harness
        .store
        .reset(&["carol".to_string(), "bob".to_string(), "alice".to_string()], &[1])
        .await
        .unwrap();
    assert_eq!(assert_ok!(harness.engine.missing_picks(1).await).len(), 3);
}

#[tokio::test]
async fn team_lookup_is_cached_and_degrades_to_unknown() {
    let harness = Harness::new(UsagePolicy::default());

    let team = harness.engine.team_for("VER").await;
    assert_eq!(team.name, "Red Bull");
    let _ = harness.engine.team_for("VER").await;
    assert_eq!(harness.provider.team_calls(), 1);

    // Cached for 30 days, even through an outage
    harness.provider.set_failing(true);
    harness.clock.advance(chrono::Duration::days(29));
    assert_eq!(harness.engine.team_for("VER").await.name, "Red Bull");
    assert_eq!(harness.provider.team_calls(), 1);

    assert_eq!(harness.engine.team_for("HAM").await, TeamInfo::unknown());

    // Unknown answers are not remembered
    harness.provider.set_failing(false);
    assert_eq!(harness.engine.team_for("ZZZ").await, TeamInfo::unknown());
    assert_eq!(harness.engine.team_for("ZZZ").await, TeamInfo::unknown());
    assert_eq!(harness.provider.team_calls(), 4);
}

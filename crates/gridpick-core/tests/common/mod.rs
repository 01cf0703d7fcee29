//! Test doubles and common utilities for ledger contract tests
//!
//! The fake provider serves a scripted season and counts calls, so tests can
//! check both ledger state and how often the engine went to the provider.

#![allow(dead_code)]

use chrono::NaiveDate;
use gridpick_core::config::LeagueConfig;
use gridpick_core::error::{Error, Result};
use gridpick_core::traits::{Classification, Driver, RaceDataProvider, Round, StateStore, TeamInfo};
use gridpick_core::{LedgerEvent, ManualClock, MemoryStore, PickEngine, UsagePolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const YEAR: i32 = 2025;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Six weekly rounds starting 2025-03-16
pub fn season_schedule() -> Vec<Round> {
    let names = [
        "Australian Grand Prix",
        "Chinese Grand Prix",
        "Japanese Grand Prix",
        "Bahrain Grand Prix",
        "Saudi Arabian Grand Prix",
        "Miami Grand Prix",
    ];
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let day = date(YEAR, 3, 16) + chrono::Duration::weeks(i as i64);
            Round::new(i as u32 + 1, day, *name)
        })
        .collect()
}

/// A day before the first round: every round is open
pub fn preseason() -> NaiveDate {
    date(YEAR, 3, 1)
}

/// A scripted race data provider that tracks calls
pub struct FakeRaceData {
    schedule: Vec<Round>,
    roster: Vec<Driver>,
    results: Mutex<HashMap<u32, Vec<Classification>>>,
    teams: HashMap<String, TeamInfo>,
    /// Every call fails with ProviderUnavailable while set
    failing: AtomicBool,
    /// Every call waits forever while set
    hanging: AtomicBool,
    schedule_calls: AtomicUsize,
    roster_calls: AtomicUsize,
    results_calls: AtomicUsize,
    team_calls: AtomicUsize,
}

impl FakeRaceData {
    /// The standard season with a four-driver roster
    pub fn new() -> Self {
        Self::with_roster(&["VER", "HAM", "LEC", "NOR"])
    }

    /// The standard season with a custom roster
    pub fn with_roster(codes: &[&str]) -> Self {
        let teams = [
            ("VER", "Red Bull"),
            ("HAM", "Ferrari"),
            ("LEC", "Ferrari"),
            ("NOR", "McLaren"),
        ]
        .into_iter()
        .map(|(code, team)| {
            (
                code.to_string(),
                TeamInfo {
                    name: team.to_string(),
                    url: None,
                },
            )
        })
        .collect();

        Self {
            schedule: season_schedule(),
            roster: codes.iter().map(|c| Driver::new(*c, *c)).collect(),
            results: Mutex::new(HashMap::new()),
            teams,
            failing: AtomicBool::new(false),
            hanging: AtomicBool::new(false),
            schedule_calls: AtomicUsize::new(0),
            roster_calls: AtomicUsize::new(0),
            results_calls: AtomicUsize::new(0),
            team_calls: AtomicUsize::new(0),
        }
    }

    /// Publish the finishing order of a round, winner first
    pub fn publish_results(&self, round: u32, order: &[&str]) {
        let classification = order
            .iter()
            .enumerate()
            .map(|(i, code)| Classification::new(*code, Some(i as u32 + 1)))
            .collect();
        self.results.lock().unwrap().insert(round, classification);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn roster_calls(&self) -> usize {
        self.roster_calls.load(Ordering::SeqCst)
    }

    pub fn results_calls(&self) -> usize {
        self.results_calls.load(Ordering::SeqCst)
    }

    pub fn team_calls(&self) -> usize {
        self.team_calls.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<()> {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::provider("fake", "scripted outage"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RaceDataProvider for FakeRaceData {
    async fn schedule(&self, _year: i32) -> Result<Vec<Round>> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.schedule.clone())
    }

    async fn roster(&self, _year: i32) -> Result<Vec<Driver>> {
        self.roster_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.roster.clone())
    }

    async fn results(&self, _year: i32, round: u32) -> Result<Vec<Classification>> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(&round)
            .cloned()
            .unwrap_or_default())
    }

    async fn team(&self, _year: i32, driver_code: &str) -> Result<TeamInfo> {
        self.team_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self
            .teams
            .get(driver_code)
            .cloned()
            .unwrap_or_else(TeamInfo::unknown))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// League of `players` for the 2025 season
pub fn league(players: &[&str], policy: UsagePolicy) -> LeagueConfig {
    players
        .iter()
        .fold(LeagueConfig::new(YEAR), |config, player| config.with_player(*player))
        .with_policy(policy)
}

/// An engine wired to test doubles
pub struct Harness {
    pub engine: PickEngine,
    pub events: mpsc::Receiver<LedgerEvent>,
    pub provider: Arc<FakeRaceData>,
    pub store: Arc<dyn StateStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// alice and bob, memory store, clock before the season
    pub fn new(policy: UsagePolicy) -> Self {
        Self::build(
            FakeRaceData::new(),
            Arc::new(MemoryStore::new()),
            league(&["alice", "bob"], policy),
        )
    }

    pub fn build(provider: FakeRaceData, store: Arc<dyn StateStore>, config: LeagueConfig) -> Self {
        let provider = Arc::new(provider);
        let clock = Arc::new(ManualClock::at_date(preseason()));
        let (engine, events) =
            PickEngine::new(provider.clone(), store.clone(), clock.clone(), config)
                .expect("engine construction succeeds");

        Self {
            engine,
            events,
            provider,
            store,
            clock,
        }
    }

    /// Move the clock to midday of `day`
    pub fn set_today(&self, day: NaiveDate) {
        self.clock
            .set(day.and_hms_opt(12, 0, 0).unwrap().and_utc());
    }

    /// Every event emitted so far
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

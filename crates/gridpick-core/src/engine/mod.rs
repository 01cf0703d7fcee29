//! Pick ledger engine
//!
//! The PickEngine is responsible for:
//! - Validating and recording picks under the season's usage policy
//! - Resolving pending picks against race results
//! - Aggregating standings and per-user read models
//! - Resetting the ledger for a new season
//!
//! ## Architecture
//!
//! ```text
//!                        ┌──────────────────┐
//!   submit / read ──────▶│    PickEngine    │──── LedgerEvent ────▶ (channel)
//!                        └──────────────────┘
//!                                 │
//!        ┌────────────────────────┼────────────────────────┐
//!        │                        │                        │
//!        ▼                        ▼                        ▼
//! ┌─────────────┐        ┌────────────────┐       ┌────────────────┐
//! │ UsagePolicy │        │  LookupCache   │       │  StateStore    │
//! │  (check)    │        │ (provider TTL) │       │ (transaction)  │
//! └─────────────┘        └────────────────┘       └────────────────┘
//!                                 │
//!                                 ▼
//!                       ┌──────────────────┐
//!                       │ RaceDataProvider │
//!                       └──────────────────┘
//! ```
//!
//! ## Submission Flow
//!
//! 1. Resolve user, round (must be open) and driver (must be in the roster)
//! 2. Take the user's lock
//! 3. Same driver as the current pick → no-op
//! 4. Refuse when the counters of the new or replaced driver disagree with
//!    the user's picks
//! 5. Check the policy against usage minus the slot's current driver
//! 6. Commit the pick and both counter changes in one store transaction
//!
//! The lock is per user rather than per (user, round): the usage cap spans
//! every round of a user, so two rounds must not be checked in parallel.

mod events;
mod reads;
mod reconcile;

pub use events::{
    BoardRow, DriverAvailability, LedgerEvent, PickOutcome, ReconcileReport, ResetSummary,
};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::cache::{Freshness, LookupCache};
use crate::clock::Clock;
use crate::config::{CacheConfig, LeagueConfig};
use crate::error::{Error, Result};
use crate::locks::KeyedLocks;
use crate::policy::UsagePolicy;
use crate::scoring::PointsTable;
use crate::traits::{CacheKind, Driver, RaceDataProvider, Round, StateStore};

/// Core pick ledger engine
///
/// ## Lifecycle
///
/// 1. Create with [`PickEngine::new()`]
/// 2. Call [`PickEngine::reset_season()`] once at the start of a season
/// 3. Submit picks and read standings; reconciliation runs lazily on reads
///
/// ## Degradation
///
/// Provider calls are bounded by the configured timeout. Read paths log and
/// continue on provider failure: stale cache entries are served, pending picks
/// stay pending and team lookups fall back to "Unknown". Submissions fail with
/// [`Error::ProviderUnavailable`] when the schedule or roster cannot be
/// obtained at all.
pub struct PickEngine {
    /// Schedule, roster, results and team lookups
    provider: Arc<dyn RaceDataProvider>,

    /// Ledger and cache tables
    store: Arc<dyn StateStore>,

    /// Provider response cache
    cache: LookupCache,

    /// Time source for round locking
    clock: Arc<dyn Clock>,

    /// Season year
    year: i32,

    /// Participating usernames, in configuration order
    players: Vec<String>,

    /// Finishing position → points
    points: PointsTable,

    /// Driver usage policy
    policy: UsagePolicy,

    /// Cache lifetimes
    cache_config: CacheConfig,

    /// Upper bound on a single provider call
    provider_timeout: Duration,

    /// Submission locks, one per user
    user_locks: KeyedLocks<String>,

    /// Reconciliation locks, one per round
    round_locks: KeyedLocks<u32>,

    /// Event sender for external collaborators
    event_tx: mpsc::Sender<LedgerEvent>,
}

impl PickEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields ledger
    /// events.
    pub fn new(
        provider: Arc<dyn RaceDataProvider>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        config: LeagueConfig,
    ) -> Result<(Self, mpsc::Receiver<LedgerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);
        let cache = LookupCache::new(store.clone(), clock.clone());

        let engine = Self {
            provider,
            store,
            cache,
            clock,
            year: config.season.year,
            players: config.participants(),
            points: config.season.points_table,
            policy: config.policy,
            cache_config: config.cache,
            provider_timeout: config.engine.provider_timeout(),
            user_locks: KeyedLocks::new(),
            round_locks: KeyedLocks::new(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Season year
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Participating usernames, in configuration order
    pub fn players(&self) -> &[String] {
        &self.players
    }

    /// Usage policy in force for the season
    pub fn policy(&self) -> UsagePolicy {
        self.policy
    }

    /// Record `driver` as the user's pick for `round`
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: unknown user, round or driver
    /// - [`Error::RoundLocked`]: the round date is today or earlier
    /// - [`Error::ConstraintViolation`]: the policy rejects the driver
    /// - [`Error::ProviderUnavailable`]: schedule or roster unavailable
    ///
    /// No error leaves a partial mutation behind.
    pub async fn submit_pick(&self, user: &str, round: u32, driver: &str) -> Result<PickOutcome> {
        self.ensure_player(user)?;

        let round_info = self.find_round(round).await?;
        let today = self.clock.today();
        if !round_info.is_open(today) {
            self.emit_event(LedgerEvent::PickRejected {
                user: user.to_string(),
                round,
                driver: driver.to_string(),
                reason: "round locked".to_string(),
            });
            return Err(Error::RoundLocked {
                round,
                date: round_info.date,
            });
        }

        let roster = self.roster().await?;
        if !roster.iter().any(|d| d.code == driver) {
            return Err(Error::not_found(format!(
                "Driver {} is not on the {} roster",
                driver, self.year
            )));
        }

        let _guard = self.user_locks.lock(&user.to_string()).await;

        let previous = self
            .store
            .get_pick(user, round)
            .await?
            .and_then(|pick| pick.driver);

        if previous.as_deref() == Some(driver) {
            debug!("{} resubmitted {} for round {}, nothing to do", user, driver, round);
            self.emit_event(LedgerEvent::PickUnchanged {
                user: user.to_string(),
                round,
                driver: driver.to_string(),
            });
            return Ok(PickOutcome::Unchanged);
        }

        let mut usage = self.store.usage(user).await?;
        let live = self.store.picks_for_user(user).await?;
        for code in std::iter::once(driver).chain(previous.as_deref()) {
            let picked = live
                .iter()
                .filter(|pick| pick.driver.as_deref() == Some(code))
                .count() as u32;
            if picked != usage.count(code) {
                let err = Error::inconsistency(format!(
                    "Usage counter {}/{} is {} but {} pick(s) name the driver",
                    user,
                    code,
                    usage.count(code),
                    picked
                ));
                self.flag(format!("Refusing pick: {}", err));
                return Err(err);
            }
        }

        if let Some(prev) = &previous {
            usage = usage.without(prev);
        }

        if !self.policy.is_eligible(driver, &usage, &roster) {
            let count = usage.count(driver);
            info!(
                "Rejected {} for {} in round {}: used {} time(s)",
                driver, user, round, count
            );
            self.emit_event(LedgerEvent::PickRejected {
                user: user.to_string(),
                round,
                driver: driver.to_string(),
                reason: "usage cap reached".to_string(),
            });
            return Err(Error::constraint(user, driver, count));
        }

        let replaced = match self.store.commit_selection(user, round, driver).await {
            Ok(replaced) => replaced,
            Err(err @ Error::DataInconsistency(_)) => {
                self.flag(format!("Refusing pick: {}", err));
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        info!(
            "{} picked {} for round {} (previous: {:?})",
            user, driver, round, replaced
        );
        self.emit_event(LedgerEvent::PickSubmitted {
            user: user.to_string(),
            round,
            driver: driver.to_string(),
            previous: replaced.clone(),
        });

        Ok(match replaced {
            Some(previous) => PickOutcome::Changed { previous },
            None => PickOutcome::Created,
        })
    }

    /// Season schedule, ascending by round number
    pub async fn schedule(&self) -> Result<Vec<Round>> {
        let year = self.year;
        let mut rounds: Vec<Round> = self
            .cache
            .get(
                CacheKind::Schedule,
                &year.to_string(),
                Freshness::Expires(self.cache_config.listing_ttl()),
                || self.bounded("schedule", self.provider.schedule(year)),
            )
            .await?;
        rounds.sort_by_key(|r| r.number);
        Ok(rounds)
    }

    /// Season roster
    pub async fn roster(&self) -> Result<Vec<Driver>> {
        let year = self.year;
        self.cache
            .get(
                CacheKind::Roster,
                &year.to_string(),
                Freshness::Expires(self.cache_config.listing_ttl()),
                || self.bounded("roster", self.provider.roster(year)),
            )
            .await
    }

    /// Persist any pending store changes
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    async fn find_round(&self, round: u32) -> Result<Round> {
        self.schedule()
            .await?
            .into_iter()
            .find(|r| r.number == round)
            .ok_or_else(|| Error::not_found(format!("Round {} is not in the {} schedule", round, self.year)))
    }

    fn ensure_player(&self, user: &str) -> Result<()> {
        if self.players.iter().any(|p| p == user) {
            Ok(())
        } else {
            Err(Error::not_found(format!("Unknown player: {}", user)))
        }
    }

    /// Run a provider call under the configured timeout
    async fn bounded<T>(&self, lookup: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::provider(
                self.provider.provider_name(),
                format!("{} lookup timed out after {:?}", lookup, self.provider_timeout),
            )),
        }
    }

    /// Log a degraded lookup and tell listeners about it
    fn degraded(&self, lookup: &str, err: &Error) {
        warn!("{} lookup degraded: {}", lookup, err);
        self.emit_event(LedgerEvent::ProviderDegraded {
            lookup: lookup.to_string(),
            error: err.to_string(),
        });
    }

    /// Log an inconsistency and tell listeners about it
    fn flag(&self, detail: String) {
        warn!("Data inconsistency: {}", detail);
        self.emit_event(LedgerEvent::InconsistencyDetected { detail });
    }

    fn emit_event(&self, event: LedgerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => trace!("No event listener, dropping event"),
        }
    }
}

impl std::fmt::Debug for PickEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickEngine")
            .field("provider", &self.provider.provider_name())
            .field("year", &self.year)
            .field("players", &self.players)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

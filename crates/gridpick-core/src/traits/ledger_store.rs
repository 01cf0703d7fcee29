// # Ledger Store Trait
//
// Defines the authoritative store of picks and per-driver usage counters.
//
// ## Purpose
//
// The ledger holds exactly one pick per (user, round). Usage counters are
// derived state: for every (user, driver) the counter equals the number of live
// picks naming that driver. Stores keep both in step by applying every pick
// mutation as a single all-or-nothing transaction.
//
// ## Implementations
//
// - In-memory: `state::MemoryStore`
// - JSON file with atomic writes: `state::FileStore`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::traits::cache_store::CacheStore;

/// A user's pick for one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    /// Username
    pub user: String,
    /// Round number
    pub round: u32,
    /// Picked driver code, `None` until a selection is made
    pub driver: Option<String>,
    /// Resolved points, `None` until reconciled
    pub points: Option<u32>,
}

impl Pick {
    /// Create an empty pick slot
    pub fn empty(user: impl Into<String>, round: u32) -> Self {
        Self {
            user: user.into(),
            round,
            driver: None,
            points: None,
        }
    }

    /// Whether the pick names a driver but has no points yet
    pub fn is_pending(&self) -> bool {
        self.driver.is_some() && self.points.is_none()
    }
}

/// A (user, driver) usage counter row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Username
    pub user: String,
    /// Driver code
    pub driver: String,
    /// Number of live picks naming the driver
    pub count: u32,
}

/// Point-in-time copy of one user's usage counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    counts: HashMap<String, u32>,
}

impl UsageSnapshot {
    /// Build a snapshot from driver → count pairs
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            counts: counts
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(driver, count)| (driver.into(), count))
                .collect(),
        }
    }

    /// Usage count of a driver (0 when unused)
    pub fn count(&self, driver: &str) -> u32 {
        self.counts.get(driver).copied().unwrap_or(0)
    }

    /// The snapshot with one use of `driver` removed
    ///
    /// Used to evaluate a replacement pick without counting the slot's
    /// current driver against the user.
    pub fn without(mut self, driver: &str) -> Self {
        if let Some(count) = self.counts.get_mut(driver) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(driver);
            }
        }
        self
    }

    /// Smallest usage across the given driver codes
    ///
    /// Returns 0 for an empty set.
    pub fn min_over<'a>(&self, drivers: impl IntoIterator<Item = &'a str>) -> u32 {
        drivers
            .into_iter()
            .map(|code| self.count(code))
            .min()
            .unwrap_or(0)
    }

    /// Iterate over (driver, count) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(driver, count)| (driver.as_str(), *count))
    }
}

/// Trait for ledger store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. Each mutating method is one
/// transaction: readers never observe a pick without its matching counter
/// update.
///
/// # Responsibilities
///
/// Stores own persistence and key uniqueness only. Eligibility, round locking
/// and scoring are decided by the engine before a mutation is requested.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get the pick for (user, round), if one exists
    async fn get_pick(&self, user: &str, round: u32) -> Result<Option<Pick>, crate::Error>;

    /// All picks of a round, ordered by user
    async fn picks_for_round(&self, round: u32) -> Result<Vec<Pick>, crate::Error>;

    /// All picks of a user, ordered by round
    async fn picks_for_user(&self, user: &str) -> Result<Vec<Pick>, crate::Error>;

    /// Every pick in the ledger, ordered by (user, round)
    async fn all_picks(&self) -> Result<Vec<Pick>, crate::Error>;

    /// Usage counters of one user
    async fn usage(&self, user: &str) -> Result<UsageSnapshot, crate::Error>;

    /// Every usage counter row, ordered by (user, driver)
    async fn usage_counters(&self) -> Result<Vec<UsageCounter>, crate::Error>;

    /// Point (user, round) at `driver` in one transaction
    ///
    /// Decrements the previous driver's counter (deleting the row at zero),
    /// increments the new driver's counter and upserts the pick with points
    /// reset to `None`.
    ///
    /// # Returns
    ///
    /// The previously picked driver, if any.
    ///
    /// # Errors
    ///
    /// [`crate::Error::DataInconsistency`] when the previous driver has no
    /// counter to decrement. Nothing is changed.
    async fn commit_selection(
        &self,
        user: &str,
        round: u32,
        driver: &str,
    ) -> Result<Option<String>, crate::Error>;

    /// Write resolved points for a pending pick
    ///
    /// The write only happens if the pick still names `driver` and still has no
    /// points, so concurrent or repeated reconciliation is harmless.
    ///
    /// # Returns
    ///
    /// `true` if the points were written.
    async fn resolve_points(
        &self,
        user: &str,
        round: u32,
        driver: &str,
        points: u32,
    ) -> Result<bool, crate::Error>;

    /// Clear all picks and counters, then create one empty pick per (user, round)
    async fn reset(&self, users: &[String], rounds: &[u32]) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// A store holding both the ledger tables and the cache table
pub trait StateStore: LedgerStore + CacheStore {}

impl<T: LedgerStore + CacheStore> StateStore for T {}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<std::sync::Arc<dyn StateStore>, crate::Error>;
}

// # Memory Store
//
// In-memory implementation of LedgerStore and CacheStore.
//
// ## Crash Behavior
//
// - Picks, counters and cached lookups are lost on restart
// - The next run starts from an empty ledger until `reset_season` runs
//
// ## When to Use
//
// - Tests
// - One-shot tooling that does not need to keep the ledger

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StoreConfig;
use crate::state::tables::LedgerTables;
use crate::traits::{
    CacheEntry, CacheKind, CacheStore, LedgerStore, Pick, StateStore, StateStoreFactory,
    UsageCounter, UsageSnapshot,
};

/// In-memory ledger and cache tables
///
/// Every mutation runs under one write lock, so a pick and its usage counter
/// change together.
///
/// # Example
///
/// ```rust,no_run
/// use gridpick_core::state::MemoryStore;
/// use gridpick_core::traits::LedgerStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///     store.commit_selection("alice", 1, "VER").await?;
///
///     let usage = store.usage("alice").await?;
///     assert_eq!(usage.count("VER"), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<LedgerTables>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pick rows in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.pick_count()
    }

    /// Whether the store has no pick rows
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_pick(&self, user: &str, round: u32) -> Result<Option<Pick>, Error> {
        Ok(self.inner.read().await.get_pick(user, round))
    }

    async fn picks_for_round(&self, round: u32) -> Result<Vec<Pick>, Error> {
        Ok(self.inner.read().await.picks_for_round(round))
    }

    async fn picks_for_user(&self, user: &str) -> Result<Vec<Pick>, Error> {
        Ok(self.inner.read().await.picks_for_user(user))
    }

    async fn all_picks(&self) -> Result<Vec<Pick>, Error> {
        Ok(self.inner.read().await.all_picks())
    }

    async fn usage(&self, user: &str) -> Result<UsageSnapshot, Error> {
        Ok(self.inner.read().await.usage(user))
    }

    async fn usage_counters(&self) -> Result<Vec<UsageCounter>, Error> {
        Ok(self.inner.read().await.usage_counters())
    }

    async fn commit_selection(
        &self,
        user: &str,
        round: u32,
        driver: &str,
    ) -> Result<Option<String>, Error> {
        let mut guard = self.inner.write().await;
        guard.commit_selection(user, round, driver)
    }

    async fn resolve_points(
        &self,
        user: &str,
        round: u32,
        driver: &str,
        points: u32,
    ) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.resolve_points(user, round, driver, points))
    }

    async fn reset(&self, users: &[String], rounds: &[u32]) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.reset(users, rounds);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_entry(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>, Error> {
        Ok(self.inner.read().await.get_cache(kind, key))
    }

    async fn put_entry(&self, kind: CacheKind, key: &str, entry: CacheEntry) -> Result<(), Error> {
        self.inner.write().await.put_cache(kind, key, entry);
        Ok(())
    }

    async fn purge(&self, kind: Option<CacheKind>) -> Result<usize, Error> {
        Ok(self.inner.write().await.purge_cache(kind))
    }
}

/// Factory for [`MemoryStore`]
#[derive(Debug, Default)]
pub struct MemoryStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn StateStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
            other => Err(Error::config(format!(
                "Memory store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}

// # Cache Store Trait
//
// Defines the persisted cache table backing the engine's cache layer.
//
// Entries are keyed by (kind, key) and carry a JSON payload plus the time they
// were last refreshed. Freshness decisions live in `cache::LookupCache`; the
// store only keeps rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of provider lookup held in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// Season schedule
    Schedule,
    /// Season roster
    Roster,
    /// Finishing order of a round
    Results,
    /// Team of a driver
    Team,
}

impl CacheKind {
    /// Stable name used in logs and persisted keys
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Schedule => "schedule",
            CacheKind::Roster => "roster",
            CacheKind::Results => "results",
            CacheKind::Team => "team",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cached provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized provider response
    pub payload: serde_json::Value,
    /// When the payload was fetched
    pub last_updated: DateTime<Utc>,
}

/// Trait for cache table implementations
///
/// All methods must be safe to call concurrently.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a cache row
    async fn get_entry(
        &self,
        kind: CacheKind,
        key: &str,
    ) -> Result<Option<CacheEntry>, crate::Error>;

    /// Insert or replace a cache row
    async fn put_entry(
        &self,
        kind: CacheKind,
        key: &str,
        entry: CacheEntry,
    ) -> Result<(), crate::Error>;

    /// Remove every row of a kind, or all rows when `kind` is `None`
    async fn purge(&self, kind: Option<CacheKind>) -> Result<usize, crate::Error>;
}

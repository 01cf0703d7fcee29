//! Cache layer for provider lookups
//!
//! Every provider call made by the engine goes through [`LookupCache`]. The
//! cache returns a stored payload while it is fresh, otherwise calls the
//! fetcher, stores the result with a new timestamp and returns it.
//!
//! Freshness is chosen per lookup by the caller:
//!
//! | Kind                    | Freshness                          |
//! |-------------------------|------------------------------------|
//! | Team                    | 30 days (configurable)             |
//! | Schedule, Roster        | 24 hours (configurable)            |
//! | Results, stored by race day | 5 minutes (configurable)       |
//! | Results, stored afterwards  | never expires                  |
//!
//! When a fetch fails with [`crate::Error::ProviderUnavailable`] and a stale payload
//! exists, the stale payload is served instead.

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::traits::{CacheEntry, CacheKind, CacheStore};

/// How long a cached payload stays usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Usable while younger than the duration
    Expires(Duration),
    /// Usable forever (immutable history)
    Forever,
    /// Usable forever if stored after `date`, otherwise while younger than `ttl`
    ///
    /// Race-day results are provisional; only a payload fetched on a later
    /// day is history.
    SettledAfter { date: NaiveDate, ttl: Duration },
}

/// Time-based memoization of provider responses over a [`CacheStore`]
#[derive(Clone)]
pub struct LookupCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl LookupCache {
    /// Create a cache over a store
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Return a fresh cached value or fetch, store and return a new one
    pub async fn get<T, F, Fut>(
        &self,
        kind: CacheKind,
        key: &str,
        freshness: Freshness,
        fetcher: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.get_if(kind, key, freshness, fetcher, |_| true).await
    }

    /// Like [`LookupCache::get`], but only stores fetched values accepted by
    /// `cacheable`
    ///
    /// Rejected values are still returned to the caller.
    pub async fn get_if<T, F, Fut, P>(
        &self,
        kind: CacheKind,
        key: &str,
        freshness: Freshness,
        fetcher: F,
        cacheable: P,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: FnOnce(&T) -> bool,
    {
        let cached = match self.store.get_entry(kind, key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read failed for {}/{}: {}", kind, key, e);
                None
            }
        };

        if let Some(entry) = &cached
            && self.is_fresh(entry, freshness)
        {
            match serde_json::from_value::<T>(entry.payload.clone()) {
                Ok(value) => {
                    trace!("Cache hit for {}/{}", kind, key);
                    return Ok(value);
                }
                Err(e) => warn!("Discarding undecodable cache entry {}/{}: {}", kind, key, e),
            }
        }

        debug!("Cache miss for {}/{}, fetching", kind, key);
        match fetcher().await {
            Ok(value) => {
                if cacheable(&value) {
                    let entry = CacheEntry {
                        payload: serde_json::to_value(&value)?,
                        last_updated: self.clock.now(),
                    };
                    if let Err(e) = self.store.put_entry(kind, key, entry).await {
                        warn!("Cache write failed for {}/{}: {}", kind, key, e);
                    }
                }
                Ok(value)
            }
            Err(err) if err.is_provider_unavailable() => {
                if let Some(entry) = cached
                    && let Ok(value) = serde_json::from_value::<T>(entry.payload)
                {
                    warn!("Serving stale {}/{} after provider failure: {}", kind, key, err);
                    return Ok(value);
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop every cached payload of a kind (or all kinds)
    pub async fn invalidate(&self, kind: Option<CacheKind>) -> Result<usize> {
        self.store.purge(kind).await
    }

    fn is_fresh(&self, entry: &CacheEntry, freshness: Freshness) -> bool {
        match freshness {
            Freshness::Forever => true,
            Freshness::Expires(ttl) => self.is_younger(entry, ttl),
            Freshness::SettledAfter { date, ttl } => {
                entry.last_updated.date_naive() > date || self.is_younger(entry, ttl)
            }
        }
    }

    fn is_younger(&self, entry: &CacheEntry, ttl: Duration) -> bool {
        // Entries stamped in the future (clock skew) count as brand new
        let age = (self.clock.now() - entry.last_updated)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age < ttl
    }
}

impl std::fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCache").finish_non_exhaustive()
    }
}

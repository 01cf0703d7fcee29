//! Core traits for the pick ledger
//!
//! - [`RaceDataProvider`]: Schedule, roster, results and team lookups
//! - [`LedgerStore`]: Picks and usage counters
//! - [`CacheStore`]: Persisted cache table for provider responses

pub mod race_data;
pub mod ledger_store;
pub mod cache_store;

pub use race_data::{Classification, Driver, RaceDataProvider, RaceDataProviderFactory, Round, TeamInfo};
pub use ledger_store::{LedgerStore, Pick, StateStore, StateStoreFactory, UsageCounter, UsageSnapshot};
pub use cache_store::{CacheEntry, CacheKind, CacheStore};

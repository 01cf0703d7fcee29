// # gridpick-core
//
// Core library for a season-long driver pick league.
//
// ## Architecture Overview
//
// - **RaceDataProvider**: Trait for schedule, roster, results and team lookups
// - **LedgerStore**: Trait for the pick and usage counter tables
// - **CacheStore**: Trait for the persisted provider-response cache
// - **UsagePolicy**: How often a player may pick the same driver
// - **PickEngine**: Submission, reconciliation and standings
// - **ProviderRegistry**: Plugin-based registry for providers and stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider and store
//    implementations
// 2. **Transactional Ledger**: A pick and its usage counters change together or
//    not at all
// 3. **Plugin-Based**: Providers are registered dynamically
// 4. **Library-First**: The binary is thin glue around this crate
// 5. **Idempotency**: Resubmission and reconciliation are safe to repeat

pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
mod locks;
pub mod policy;
pub mod registry;
pub mod scoring;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LeagueConfig, ProviderConfig, StoreConfig};
pub use engine::{LedgerEvent, PickEngine, PickOutcome, ReconcileReport};
pub use error::{Error, Result};
pub use policy::UsagePolicy;
pub use registry::ProviderRegistry;
pub use scoring::{PointsTable, ScoreEntry};
pub use state::{FileStore, MemoryStore};
pub use traits::{LedgerStore, RaceDataProvider, StateStore};

//! Configuration types for the pick ledger
//!
//! A league is configured from a single JSON document:
//!
//! ```json
//! {
//!   "season": { "year": 2025 },
//!   "players": [
//!     { "username": "alice", "role": "Player" },
//!     { "username": "bob", "role": "Player" },
//!     { "username": "admin", "role": "Admin" }
//!   ],
//!   "policy": { "type": "phased_cap" },
//!   "provider": { "type": "jolpica" },
//!   "store": { "type": "file", "path": "/var/lib/gridpick/ledger.json" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::policy::UsagePolicy;
use crate::scoring::PointsTable;

/// Main league configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueConfig {
    /// Season settings
    pub season: SeasonConfig,

    /// League members
    pub players: Vec<PlayerConfig>,

    /// Driver usage policy for the season
    #[serde(default)]
    pub policy: UsagePolicy,

    /// Race data provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Ledger/cache store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Cache freshness settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl LeagueConfig {
    /// Create a configuration with defaults for the given season
    pub fn new(year: i32) -> Self {
        Self {
            season: SeasonConfig::new(year),
            players: Vec::new(),
            policy: UsagePolicy::default(),
            provider: ProviderConfig::default(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Add a player with the `Player` role
    pub fn with_player(mut self, username: impl Into<String>) -> Self {
        self.players.push(PlayerConfig::new(username));
        self
    }

    /// Set the usage policy
    pub fn with_policy(mut self, policy: UsagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parse a configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// Usernames taking part in the season, in configuration order
    pub fn participants(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.role == PlayerRole::Player)
            .map(|p| p.username.clone())
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.season.validate()?;

        if self.participants().is_empty() {
            return Err(crate::Error::config("No players configured"));
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if player.username.trim().is_empty() {
                return Err(crate::Error::config("Player username cannot be empty"));
            }
            if !seen.insert(player.username.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate player username: {}",
                    player.username
                )));
            }
        }

        self.policy.validate()?;
        self.provider.validate()?;
        self.store.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// Season settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonConfig {
    /// Season year
    pub year: i32,

    /// Finishing position → points
    #[serde(default)]
    pub points_table: PointsTable,
}

impl SeasonConfig {
    /// Create a season with the standard points table
    pub fn new(year: i32) -> Self {
        Self {
            year,
            points_table: PointsTable::default(),
        }
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if !(1950..=2100).contains(&self.year) {
            return Err(crate::Error::config(format!(
                "Season year out of range: {}",
                self.year
            )));
        }
        if self.points_table.is_empty() {
            return Err(crate::Error::config("Points table cannot be empty"));
        }
        Ok(())
    }
}

/// League member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Username
    pub username: String,

    /// Role; only `Player` members make picks and appear in standings
    #[serde(default = "default_role")]
    pub role: PlayerRole,
}

impl PlayerConfig {
    /// Create a member with the `Player` role
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: PlayerRole::Player,
        }
    }
}

/// League member role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerRole {
    /// Takes part in the season
    Player,
    /// Administers the league without playing
    Admin,
    /// Read-only member
    Viewer,
}

fn default_role() -> PlayerRole {
    PlayerRole::Player
}

/// Race data provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Jolpica (Ergast-compatible) HTTP API
    Jolpica {
        /// API base URL (defaults to the public Jolpica endpoint)
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Jolpica { base_url } => {
                if let Some(url) = base_url
                    && !url.starts_with("https://")
                    && !url.starts_with("http://")
                {
                    return Err(crate::Error::config(format!(
                        "Jolpica base URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Jolpica { .. } => "jolpica",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Jolpica { base_url: None }
    }
}

/// Ledger/cache store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the ledger file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Cache freshness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of team lookups (in days)
    #[serde(default = "default_team_ttl_days")]
    pub team_ttl_days: u64,

    /// Lifetime of schedule and roster lookups (in seconds)
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,

    /// Lifetime of results for a round that may still change (in seconds)
    ///
    /// Results stored on a day after the race never expire.
    #[serde(default = "default_pending_results_ttl_secs")]
    pub pending_results_ttl_secs: u64,
}

impl CacheConfig {
    /// Team lookup lifetime
    pub fn team_ttl(&self) -> Duration {
        Duration::from_secs(self.team_ttl_days * 24 * 60 * 60)
    }

    /// Schedule/roster lifetime
    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }

    /// Lifetime of results for a round dated today or later
    pub fn pending_results_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_results_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            team_ttl_days: default_team_ttl_days(),
            listing_ttl_secs: default_listing_ttl_secs(),
            pending_results_ttl_secs: default_pending_results_ttl_secs(),
        }
    }
}

fn default_team_ttl_days() -> u64 {
    30
}

fn default_listing_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_pending_results_ttl_secs() -> u64 {
    300
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on a single provider call (in seconds)
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Capacity of the ledger event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Provider call timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.provider_timeout_secs == 0 {
            return Err(crate::Error::config("Provider timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    256
}

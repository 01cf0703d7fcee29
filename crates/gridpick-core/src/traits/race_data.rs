// # Race Data Provider Trait
//
// Defines the read-only interface to the external schedule, roster, results
// and team lookups for a season.
//
// ## Implementations
//
// - Jolpica/Ergast HTTP API: `gridpick-provider-jolpica` crate
//
// ## Usage
//
// ```rust,ignore
// use gridpick_core::RaceDataProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* RaceDataProvider implementation */;
//
//     for round in provider.schedule(2025).await? {
//         println!("{} {} {}", round.number, round.date, round.name);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One scheduled race event of a season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// 1-based sequence number, unique within the season
    pub number: u32,
    /// Calendar date of the race
    pub date: NaiveDate,
    /// Display name (e.g. "Bahrain Grand Prix")
    pub name: String,
}

impl Round {
    /// Create a new round
    pub fn new(number: u32, date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            number,
            date,
            name: name.into(),
        }
    }

    /// A round is open for selection while its date is strictly after `today`
    pub fn is_open(&self, today: NaiveDate) -> bool {
        self.date > today
    }

    /// A round has lapsed once its date is today or earlier
    pub fn has_lapsed(&self, today: NaiveDate) -> bool {
        !self.is_open(today)
    }
}

/// An eligible driver of the season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    /// Stable driver code (e.g. "VER")
    pub code: String,
    /// Display name
    pub name: String,
    /// Provider-specific identifier used for follow-up lookups
    #[serde(default)]
    pub provider_id: Option<String>,
}

impl Driver {
    /// Create a new driver without a provider id
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            provider_id: None,
        }
    }
}

/// One line of a round's finishing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Driver code
    pub driver_code: String,
    /// Finishing position, absent when the provider does not classify the driver
    pub position: Option<u32>,
}

impl Classification {
    /// Create a classified finisher
    pub fn new(driver_code: impl Into<String>, position: Option<u32>) -> Self {
        Self {
            driver_code: driver_code.into(),
            position,
        }
    }
}

/// Team (constructor) a driver races for in a season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    /// Team name
    pub name: String,
    /// Reference page for the team, if the provider knows one
    pub url: Option<String>,
}

impl TeamInfo {
    /// Placeholder returned when no team can be determined
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            url: None,
        }
    }
}

/// Trait for race data provider implementations
///
/// Providers are read-only, stateless adapters around an external API.
///
/// # Constraints
///
/// - One request (or a short fixed sequence) per call; no retry loops.
///   Retries are a property of repeated reads in the engine.
/// - No caching beyond a single call; the engine's cache layer owns freshness.
/// - Errors are reported as [`crate::Error::ProviderUnavailable`] so the engine
///   can degrade instead of failing unrelated reads.
#[async_trait]
pub trait RaceDataProvider: Send + Sync {
    /// Ordered list of rounds for a season, ascending by round number
    async fn schedule(&self, year: i32) -> Result<Vec<Round>, crate::Error>;

    /// Eligible drivers of a season
    async fn roster(&self, year: i32) -> Result<Vec<Driver>, crate::Error>;

    /// Finishing order of a round, ascending by position
    ///
    /// An empty list means the provider has no classification yet.
    async fn results(&self, year: i32, round: u32) -> Result<Vec<Classification>, crate::Error>;

    /// Team a driver races for in a season
    async fn team(&self, year: i32, driver_code: &str) -> Result<TeamInfo, crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing race data providers from configuration
pub trait RaceDataProviderFactory: Send + Sync {
    /// Create a RaceDataProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn RaceDataProvider>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_open_is_strictly_future() {
        let round = Round::new(1, NaiveDate::from_ymd_opt(2025, 3, 16).unwrap(), "Australia");

        assert!(round.is_open(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()));
        assert!(!round.is_open(NaiveDate::from_ymd_opt(2025, 3, 16).unwrap()));
        assert!(round.has_lapsed(NaiveDate::from_ymd_opt(2025, 3, 17).unwrap()));
    }
}

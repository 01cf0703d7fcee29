// # Jolpica Race Data Provider
//
// Race data provider backed by the Jolpica F1 API, the community successor of
// the Ergast API. No credentials are needed.
//
// ## Behaviour
//
// - One HTTP request per lookup; team lookups resolve the driver id first
// - Every failure (transport, status, body) maps to `ProviderUnavailable`
// - No retries, no caching; both are owned by the engine
// - HTTP timeout configured (30 seconds)
//
// ## API Reference
//
// - Schedule: GET `{base}/{year}.json`
// - Roster: GET `{base}/{year}/drivers.json`
// - Results: GET `{base}/{year}/{round}/results.json`
// - Team: GET `{base}/{year}/drivers/{driver_id}/constructors.json`

mod wire;

use async_trait::async_trait;
use gridpick_core::config::ProviderConfig;
use gridpick_core::traits::{
    Classification, Driver, RaceDataProvider, RaceDataProviderFactory, Round, TeamInfo,
};
use gridpick_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

use wire::{ConstructorData, DriverData, Envelope, RaceData};

pub(crate) const PROVIDER_NAME: &str = "jolpica";

/// Public Jolpica endpoint
pub const JOLPICA_API_BASE: &str = "https://api.jolpi.ca/ergast/f1";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size requested on list endpoints; a season fits in one page
const PAGE_LIMIT: u32 = 100;

/// Jolpica race data provider
#[derive(Debug, Clone)]
pub struct JolpicaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl JolpicaProvider {
    /// Create a provider against the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a provider with a custom HTTP timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gridpick/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { base_url, client })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base}/{path}` and decode the `MRData` envelope
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}?limit={}", self.base_url, path, PAGE_LIMIT);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                404 => Error::provider(PROVIDER_NAME, format!("Not found: {}", path)),
                429 => Error::provider(
                    PROVIDER_NAME,
                    format!("Rate limit exceeded. Please retry later. Status: {}", status),
                ),
                500..=599 => Error::provider(
                    PROVIDER_NAME,
                    format!("Jolpica server error (transient): {}", status),
                ),
                _ => Error::provider(PROVIDER_NAME, format!("Request failed: {}", status)),
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e)))?;

        Ok(envelope.mr_data)
    }
}

#[async_trait]
impl RaceDataProvider for JolpicaProvider {
    async fn schedule(&self, year: i32) -> Result<Vec<Round>> {
        let data: RaceData = self.fetch(&format!("{}.json", year)).await?;
        let rounds = data.into_rounds()?;
        tracing::debug!("Fetched {} rounds for {}", rounds.len(), year);
        Ok(rounds)
    }

    async fn roster(&self, year: i32) -> Result<Vec<Driver>> {
        let data: DriverData = self.fetch(&format!("{}/drivers.json", year)).await?;
        Ok(data.into_roster())
    }

    async fn results(&self, year: i32, round: u32) -> Result<Vec<Classification>> {
        let data: RaceData = self
            .fetch(&format!("{}/{}/results.json", year, round))
            .await?;
        let lines = data.into_classification()?;
        if lines.is_empty() {
            tracing::debug!("No classification yet for {} round {}", year, round);
        }
        Ok(lines)
    }

    async fn team(&self, year: i32, driver_code: &str) -> Result<TeamInfo> {
        let drivers: DriverData = self.fetch(&format!("{}/drivers.json", year)).await?;
        let Some(driver_id) = drivers.driver_id(driver_code) else {
            tracing::debug!("Driver {} not in the {} roster", driver_code, year);
            return Ok(TeamInfo::unknown());
        };

        let data: ConstructorData = self
            .fetch(&format!("{}/drivers/{}/constructors.json", year, driver_id))
            .await?;
        Ok(data.into_team())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Jolpica providers
pub struct JolpicaFactory;

impl RaceDataProviderFactory for JolpicaFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn RaceDataProvider>> {
        match config {
            ProviderConfig::Jolpica { base_url } => {
                config.validate()?;
                let base = base_url.as_deref().unwrap_or(JOLPICA_API_BASE);
                tracing::info!("Using Jolpica race data at {}", base);
                Ok(Box::new(JolpicaProvider::new(base)?))
            }
            _ => Err(Error::config("Invalid config for Jolpica provider")),
        }
    }
}

/// Register the Jolpica provider with a registry
///
/// # Example
///
/// ```rust
/// use gridpick_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// gridpick_provider_jolpica::register(&registry);
/// assert!(registry.has_provider("jolpica"));
/// ```
pub fn register(registry: &gridpick_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(JolpicaFactory));
}

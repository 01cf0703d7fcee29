//! Response bodies of the Jolpica F1 API
//!
//! Every payload is wrapped in an `MRData` envelope and carries numbers as
//! strings. Only the fields the ledger needs are modelled.

use chrono::NaiveDate;
use gridpick_core::traits::{Classification, Driver, Round, TeamInfo};
use gridpick_core::{Error, Result};
use serde::Deserialize;

use crate::PROVIDER_NAME;

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(rename = "MRData")]
    pub mr_data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RaceData {
    #[serde(rename = "RaceTable")]
    pub race_table: RaceTable,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RaceTable {
    #[serde(rename = "Races", default)]
    pub races: Vec<Race>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Race {
    pub round: String,
    #[serde(rename = "raceName")]
    pub race_name: String,
    pub date: String,
    #[serde(rename = "Results", default)]
    pub results: Vec<RaceResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RaceResult {
    #[serde(default)]
    pub position: Option<String>,
    #[serde(rename = "Driver")]
    pub driver: WireDriver,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DriverData {
    #[serde(rename = "DriverTable")]
    pub driver_table: DriverTable,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DriverTable {
    #[serde(rename = "Drivers", default)]
    pub drivers: Vec<WireDriver>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDriver {
    #[serde(rename = "driverId")]
    pub driver_id: String,
    /// Historic drivers have no three-letter code
    #[serde(default)]
    pub code: Option<String>,
    #[serde(rename = "givenName", default)]
    pub given_name: String,
    #[serde(rename = "familyName", default)]
    pub family_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConstructorData {
    #[serde(rename = "ConstructorTable")]
    pub constructor_table: ConstructorTable,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConstructorTable {
    #[serde(rename = "Constructors", default)]
    pub constructors: Vec<Constructor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Constructor {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

fn malformed(what: &str, detail: impl std::fmt::Display) -> Error {
    Error::provider(PROVIDER_NAME, format!("Malformed {}: {}", what, detail))
}

impl RaceData {
    /// Rounds of a season, ascending by number
    pub fn into_rounds(self) -> Result<Vec<Round>> {
        let mut rounds = self
            .race_table
            .races
            .into_iter()
            .map(|race| {
                let number = race
                    .round
                    .parse::<u32>()
                    .map_err(|e| malformed("round number", e))?;
                let date = NaiveDate::parse_from_str(&race.date, "%Y-%m-%d")
                    .map_err(|e| malformed("race date", e))?;
                Ok(Round::new(number, date, race.race_name))
            })
            .collect::<Result<Vec<_>>>()?;
        rounds.sort_by_key(|r| r.number);
        Ok(rounds)
    }

    /// Finishing order of the first race in the table
    ///
    /// An empty race table means the round has not been classified yet.
    pub fn into_classification(self) -> Result<Vec<Classification>> {
        let Some(race) = self.race_table.races.into_iter().next() else {
            return Ok(Vec::new());
        };

        let mut lines = Vec::with_capacity(race.results.len());
        for result in race.results {
            let Some(code) = result.driver.code else {
                tracing::debug!("Skipping result without driver code: {}", result.driver.driver_id);
                continue;
            };
            let position = match result.position.as_deref() {
                Some(text) => Some(text.parse::<u32>().map_err(|e| malformed("position", e))?),
                None => None,
            };
            lines.push(Classification::new(code, position));
        }

        lines.sort_by_key(|line| line.position.unwrap_or(u32::MAX));
        Ok(lines)
    }
}

impl DriverData {
    /// Drivers that carry a code; others cannot be picked
    pub fn into_roster(self) -> Vec<Driver> {
        self.driver_table
            .drivers
            .into_iter()
            .filter_map(|d| {
                let code = d.code?;
                let name = format!("{} {}", d.given_name, d.family_name).trim().to_string();
                Some(Driver {
                    code,
                    name,
                    provider_id: Some(d.driver_id),
                })
            })
            .collect()
    }

    /// Provider id of the driver with the given code
    pub fn driver_id(&self, code: &str) -> Option<&str> {
        self.driver_table
            .drivers
            .iter()
            .find(|d| d.code.as_deref() == Some(code))
            .map(|d| d.driver_id.as_str())
    }
}

impl ConstructorData {
    /// First listed constructor, or the unknown team
    pub fn into_team(self) -> TeamInfo {
        match self.constructor_table.constructors.into_iter().next() {
            Some(c) => TeamInfo {
                name: c.name,
                url: c.url,
            },
            None => TeamInfo::unknown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = r#"{
        "MRData": {
            "series": "f1",
            "RaceTable": {
                "season": "2025",
                "Races": [
                    {"season": "2025", "round": "2", "raceName": "Chinese Grand Prix",
                     "date": "2025-03-23", "time": "07:00:00Z"},
                    {"season": "2025", "round": "1", "raceName": "Australian Grand Prix",
                     "date": "2025-03-16", "time": "04:00:00Z"}
                ]
            }
        }
    }"#;

    const RESULTS: &str = r#"{
        "MRData": {
            "RaceTable": {
                "Races": [{
                    "round": "1", "raceName": "Australian Grand Prix", "date": "2025-03-16",
                    "Results": [
                        {"position": "2", "Driver": {"driverId": "max_verstappen", "code": "VER",
                          "givenName": "Max", "familyName": "Verstappen"}},
                        {"position": "1", "Driver": {"driverId": "norris", "code": "NOR",
                          "givenName": "Lando", "familyName": "Norris"}},
                        {"Driver": {"driverId": "doohan", "code": "DOO",
                          "givenName": "Jack", "familyName": "Doohan"}}
                    ]
                }]
            }
        }
    }"#;

    const DRIVERS: &str = r#"{
        "MRData": {
            "DriverTable": {
                "season": "2025",
                "Drivers": [
                    {"driverId": "hamilton", "permanentNumber": "44", "code": "HAM",
                     "givenName": "Lewis", "familyName": "Hamilton"},
                    {"driverId": "fangio", "givenName": "Juan", "familyName": "Fangio"}
                ]
            }
        }
    }"#;

    #[test]
    fn test_schedule_is_sorted_by_round() {
        let data: Envelope<RaceData> = serde_json::from_str(SCHEDULE).unwrap();
        let rounds = data.mr_data.into_rounds().unwrap();

        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[0].number, 1);
        assert_eq!(rounds[0].name, "Australian Grand Prix");
        assert_eq!(rounds[0].date, NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());
        assert_eq!(rounds[1].number, 2);
    }

    #[test]
    fn test_results_ordered_with_unclassified_last() {
        let data: Envelope<RaceData> = serde_json::from_str(RESULTS).unwrap();
        let lines = data.mr_data.into_classification().unwrap();

        assert_eq!(
            lines,
            vec![
                Classification::new("NOR", Some(1)),
                Classification::new("VER", Some(2)),
                Classification::new("DOO", None),
            ]
        );
    }

    #[test]
    fn test_unpublished_results_are_empty() {
        let body = r#"{"MRData": {"RaceTable": {"season": "2025", "round": "9", "Races": []}}}"#;
        let data: Envelope<RaceData> = serde_json::from_str(body).unwrap();
        assert!(data.mr_data.into_classification().unwrap().is_empty());
    }

    #[test]
    fn test_bad_round_number_is_provider_error() {
        let body = r#"{"MRData": {"RaceTable": {"Races": [
            {"round": "one", "raceName": "X", "date": "2025-03-16"}
        ]}}}"#;
        let data: Envelope<RaceData> = serde_json::from_str(body).unwrap();
        let err = data.mr_data.into_rounds().unwrap_err();
        assert!(err.is_provider_unavailable());
    }

    #[test]
    fn test_roster_skips_drivers_without_code() {
        let data: Envelope<DriverData> = serde_json::from_str(DRIVERS).unwrap();
        assert_eq!(data.mr_data.driver_id("HAM"), Some("hamilton"));
        assert_eq!(data.mr_data.driver_id("FAN"), None);

        let roster = data.mr_data.into_roster();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].code, "HAM");
        assert_eq!(roster[0].name, "Lewis Hamilton");
        assert_eq!(roster[0].provider_id.as_deref(), Some("hamilton"));
    }

    #[test]
    fn test_team_from_first_constructor() {
        let body = r#"{"MRData": {"ConstructorTable": {"Constructors": [
            {"constructorId": "ferrari", "url": "https://en.wikipedia.org/wiki/Scuderia_Ferrari",
             "name": "Ferrari", "nationality": "Italian"}
        ]}}}"#;
        let data: Envelope<ConstructorData> = serde_json::from_str(body).unwrap();
        let team = data.mr_data.into_team();
        assert_eq!(team.name, "Ferrari");
        assert!(team.url.unwrap().contains("Ferrari"));

        let empty = r#"{"MRData": {"ConstructorTable": {"Constructors": []}}}"#;
        let data: Envelope<ConstructorData> = serde_json::from_str(empty).unwrap();
        assert_eq!(data.mr_data.into_team(), TeamInfo::unknown());
    }
}

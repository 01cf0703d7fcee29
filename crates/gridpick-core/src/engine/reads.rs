//! Read models: standings, boards, availability and audits
//!
//! Reads that show points reconcile lapsed rounds first. Provider failures on
//! these paths are logged and absorbed.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use super::{BoardRow, DriverAvailability, LedgerEvent, PickEngine};
use crate::cache::Freshness;
use crate::error::{Error, Result};
use crate::scoring::{self, ScoreEntry, ScoreProgression, SeasonSheet};
use crate::traits::{CacheKind, Pick, Round, TeamInfo, UsageCounter};

impl PickEngine {
    /// Season totals per player, highest first, ties by username
    ///
    /// Players without picks appear with 0. Picks naming a driver that is not
    /// on the roster are excluded.
    pub async fn standings(&self) -> Result<Vec<ScoreEntry>> {
        let picks = self.scoreable_picks().await?;
        Ok(scoring::rank(&self.players, &picks))
    }

    /// Cumulative points per player after each round
    pub async fn progression(&self) -> Result<Vec<ScoreProgression>> {
        let picks = self.scoreable_picks().await?;
        Ok(scoring::progression(&self.players, &picks))
    }

    /// Every pick of every player with season totals
    pub async fn season_sheets(&self) -> Result<Vec<SeasonSheet>> {
        let picks = self.scoreable_picks().await?;
        Ok(scoring::season_sheets(&self.players, &picks))
    }

    /// The schedule annotated with one player's picks
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: unknown player
    /// - [`Error::ProviderUnavailable`]: the schedule cannot be obtained
    pub async fn season_board(&self, user: &str) -> Result<Vec<BoardRow>> {
        self.ensure_player(user)?;
        self.reconcile_quietly().await;

        let schedule = self.schedule().await?;
        let mut picks: HashMap<u32, Pick> = self
            .store
            .picks_for_user(user)
            .await?
            .into_iter()
            .map(|pick| (pick.round, pick))
            .collect();
        let today = self.clock.today();

        Ok(schedule
            .into_iter()
            .map(|round| {
                let pick = picks.remove(&round.number);
                BoardRow {
                    open: round.is_open(today),
                    driver: pick.as_ref().and_then(|p| p.driver.clone()),
                    points: pick.and_then(|p| p.points),
                    round,
                }
            })
            .collect())
    }

    /// The roster annotated with one player's usage and eligibility
    ///
    /// Eligibility is evaluated for a round the player has not picked yet.
    pub async fn driver_availability(&self, user: &str) -> Result<Vec<DriverAvailability>> {
        self.ensure_player(user)?;

        let roster = self.roster().await?;
        let usage = self.store.usage(user).await?;

        Ok(roster
            .iter()
            .map(|driver| DriverAvailability {
                used: usage.count(&driver.code),
                eligible: self.policy.is_eligible(&driver.code, &usage, &roster),
                driver: driver.clone(),
            })
            .collect())
    }

    /// First round dated today or later
    pub async fn current_round(&self) -> Result<Option<Round>> {
        let today = self.clock.today();
        Ok(self
            .schedule()
            .await?
            .into_iter()
            .find(|round| round.date >= today))
    }

    /// Players without a driver for `round`, in configuration order
    pub async fn missing_picks(&self, round: u32) -> Result<Vec<String>> {
        let picked: HashSet<String> = self
            .store
            .picks_for_round(round)
            .await?
            .into_iter()
            .filter(|pick| pick.driver.is_some())
            .map(|pick| pick.user)
            .collect();

        Ok(self
            .players
            .iter()
            .filter(|player| !picked.contains(*player))
            .cloned()
            .collect())
    }

    /// Team a driver races for this season, or "Unknown"
    pub async fn team_for(&self, driver_code: &str) -> TeamInfo {
        let year = self.year;
        let result = self
            .cache
            .get_if(
                CacheKind::Team,
                &format!("{}/{}", year, driver_code),
                Freshness::Expires(self.cache_config.team_ttl()),
                || self.bounded("team", self.provider.team(year, driver_code)),
                |team: &TeamInfo| *team != TeamInfo::unknown(),
            )
            .await;

        match result {
            Ok(team) => team,
            Err(e) => {
                self.degraded(&format!("team {}", driver_code), &e);
                TeamInfo::unknown()
            }
        }
    }

    /// Check the ledger against its counters and the roster
    ///
    /// Returns one [`Error::DataInconsistency`] per finding. Nothing is
    /// corrected.
    pub async fn audit(&self) -> Result<Vec<Error>> {
        let picks = self.store.all_picks().await?;
        let counters = self.store.usage_counters().await?;
        let mut findings = Vec::new();

        findings.extend(counter_drift(&picks, &counters).iter().map(CounterDrift::to_error));

        for pick in &picks {
            if !self.players.contains(&pick.user) {
                findings.push(Error::inconsistency(format!(
                    "Pick for round {} belongs to unknown player {}",
                    pick.round, pick.user
                )));
            }
        }

        match self.roster().await {
            Ok(roster) => {
                for pick in &picks {
                    if let Some(driver) = pick.driver.as_deref()
                        && !roster.iter().any(|d| d.code == driver)
                    {
                        findings.push(Error::inconsistency(format!(
                            "Pick of {} for round {} names {}, who is not on the roster",
                            pick.user, pick.round, driver
                        )));
                    }
                }
            }
            Err(e) => self.degraded("roster", &e),
        }

        for finding in &findings {
            self.emit_event(LedgerEvent::InconsistencyDetected {
                detail: finding.to_string(),
            });
        }
        if findings.is_empty() {
            debug!("Audit found no inconsistencies");
        } else {
            warn!("Audit found {} inconsistencies", findings.len());
        }

        Ok(findings)
    }

    /// All picks after lazy reconciliation, minus inconsistent ones
    ///
    /// Picks of a (user, driver) pair whose usage counter disagrees with the
    /// ledger are excluded, as are picks naming off-roster drivers. When the
    /// roster cannot be obtained the roster check is skipped.
    async fn scoreable_picks(&self) -> Result<Vec<Pick>> {
        self.reconcile_quietly().await;
        let picks = self.store.all_picks().await?;
        let counters = self.store.usage_counters().await?;

        let drifted: HashSet<(String, String)> = counter_drift(&picks, &counters)
            .into_iter()
            .map(|drift| {
                self.flag(format!("Excluding picks: {}", drift.to_error()));
                (drift.user, drift.driver)
            })
            .collect();

        let roster = match self.roster().await {
            Ok(roster) => Some(roster),
            Err(e) => {
                self.degraded("roster", &e);
                None
            }
        };

        Ok(picks
            .into_iter()
            .filter(|pick| {
                let Some(driver) = pick.driver.as_deref() else {
                    return true;
                };
                if drifted.contains(&(pick.user.clone(), driver.to_string())) {
                    return false;
                }
                match &roster {
                    Some(roster) if !roster.iter().any(|d| d.code == driver) => {
                        self.flag(format!(
                            "Excluding pick of {} for round {}: {} is not on the roster",
                            pick.user, pick.round, driver
                        ));
                        false
                    }
                    _ => true,
                }
            })
            .collect())
    }
}

/// A (user, driver) usage counter that disagrees with the picks naming the driver
#[derive(Debug)]
struct CounterDrift {
    user: String,
    driver: String,
    recorded: u32,
    live: u32,
}

impl CounterDrift {
    fn to_error(&self) -> Error {
        if self.live == 0 {
            Error::inconsistency(format!(
                "Usage counter {}/{} is {} but no pick names the driver",
                self.user, self.driver, self.recorded
            ))
        } else {
            Error::inconsistency(format!(
                "Usage counter {}/{} is {} but {} pick(s) name the driver",
                self.user, self.driver, self.recorded, self.live
            ))
        }
    }
}

/// Compare counters with the live picks, in both directions
fn counter_drift(picks: &[Pick], counters: &[UsageCounter]) -> Vec<CounterDrift> {
    let mut live: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for pick in picks {
        if let Some(driver) = pick.driver.as_deref() {
            *live.entry((pick.user.as_str(), driver)).or_insert(0) += 1;
        }
    }

    let mut recorded: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for counter in counters {
        recorded.insert((counter.user.as_str(), counter.driver.as_str()), counter.count);
    }

    let keys: BTreeSet<(&str, &str)> = live.keys().chain(recorded.keys()).copied().collect();
    keys.into_iter()
        .filter_map(|key| {
            let live = live.get(&key).copied().unwrap_or(0);
            let recorded = recorded.get(&key).copied().unwrap_or(0);
            (live != recorded).then(|| CounterDrift {
                user: key.0.to_string(),
                driver: key.1.to_string(),
                recorded,
                live,
            })
        })
        .collect()
}

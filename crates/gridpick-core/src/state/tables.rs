// # Ledger Tables
//
// The in-memory representation shared by every store implementation: the pick
// table, the usage counter table and the cache table. Stores wrap one
// `LedgerTables` behind a lock and apply each mutation while holding it, which
// makes every method here a transaction from the caller's point of view.
//
// Keys are unique by construction (`BTreeMap`), so "one pick per (user, round)"
// needs no scanning.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::traits::{CacheEntry, CacheKind, Pick, UsageCounter, UsageSnapshot};

/// Value half of a pick row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PickRow {
    driver: Option<String>,
    points: Option<u32>,
}

/// Pick, usage and cache tables
#[derive(Debug, Clone, Default)]
pub(crate) struct LedgerTables {
    picks: BTreeMap<(String, u32), PickRow>,
    usage: BTreeMap<(String, String), u32>,
    cache: HashMap<(CacheKind, String), CacheEntry>,
}

impl LedgerTables {
    pub(crate) fn get_pick(&self, user: &str, round: u32) -> Option<Pick> {
        self.picks
            .get(&(user.to_string(), round))
            .map(|row| to_pick(user, round, row))
    }

    pub(crate) fn picks_for_round(&self, round: u32) -> Vec<Pick> {
        self.picks
            .iter()
            .filter(|((_, r), _)| *r == round)
            .map(|((user, r), row)| to_pick(user, *r, row))
            .collect()
    }

    pub(crate) fn picks_for_user(&self, user: &str) -> Vec<Pick> {
        self.picks
            .range((user.to_string(), 0)..=(user.to_string(), u32::MAX))
            .map(|((u, r), row)| to_pick(u, *r, row))
            .collect()
    }

    pub(crate) fn all_picks(&self) -> Vec<Pick> {
        self.picks
            .iter()
            .map(|((user, round), row)| to_pick(user, *round, row))
            .collect()
    }

    pub(crate) fn usage(&self, user: &str) -> UsageSnapshot {
        UsageSnapshot::from_counts(
            self.usage
                .range((user.to_string(), String::new())..)
                .take_while(|((u, _), _)| u == user)
                .map(|((_, driver), count)| (driver.clone(), *count)),
        )
    }

    pub(crate) fn usage_counters(&self) -> Vec<UsageCounter> {
        self.usage
            .iter()
            .map(|((user, driver), count)| UsageCounter {
                user: user.clone(),
                driver: driver.clone(),
                count: *count,
            })
            .collect()
    }

    /// Point (user, round) at `driver`, moving one use between counters
    ///
    /// Fails without mutating when the replaced driver has no counter.
    pub(crate) fn commit_selection(
        &mut self,
        user: &str,
        round: u32,
        driver: &str,
    ) -> Result<Option<String>, crate::Error> {
        let key = (user.to_string(), round);
        let previous = self.picks.get(&key).and_then(|row| row.driver.clone());

        if let Some(prev) = &previous {
            self.decrement(user, prev)?;
        }
        *self
            .usage
            .entry((user.to_string(), driver.to_string()))
            .or_insert(0) += 1;

        self.picks.insert(
            key,
            PickRow {
                driver: Some(driver.to_string()),
                points: None,
            },
        );

        Ok(previous)
    }

    /// Set points on a pick that still names `driver` and has none
    pub(crate) fn resolve_points(&mut self, user: &str, round: u32, driver: &str, points: u32) -> bool {
        match self.picks.get_mut(&(user.to_string(), round)) {
            Some(row) if row.points.is_none() && row.driver.as_deref() == Some(driver) => {
                row.points = Some(points);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn reset(&mut self, users: &[String], rounds: &[u32]) {
        self.picks.clear();
        self.usage.clear();
        for user in users {
            for round in rounds {
                self.picks.insert((user.clone(), *round), PickRow::default());
            }
        }
    }

    pub(crate) fn get_cache(&self, kind: CacheKind, key: &str) -> Option<CacheEntry> {
        self.cache.get(&(kind, key.to_string())).cloned()
    }

    pub(crate) fn put_cache(&mut self, kind: CacheKind, key: &str, entry: CacheEntry) {
        self.cache.insert((kind, key.to_string()), entry);
    }

    pub(crate) fn purge_cache(&mut self, kind: Option<CacheKind>) -> usize {
        let before = self.cache.len();
        match kind {
            Some(kind) => self.cache.retain(|(k, _), _| *k != kind),
            None => self.cache.clear(),
        }
        before - self.cache.len()
    }

    pub(crate) fn pick_count(&self) -> usize {
        self.picks.len()
    }

    fn decrement(&mut self, user: &str, driver: &str) -> Result<(), crate::Error> {
        let key = (user.to_string(), driver.to_string());
        match self.usage.get_mut(&key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.usage.remove(&key);
            }
            None => {
                return Err(crate::Error::inconsistency(format!(
                    "Usage counter missing for {}/{} while replacing a pick",
                    user, driver
                )));
            }
        }
        Ok(())
    }

    /// Serializable row form of the tables
    pub(crate) fn to_rows(&self) -> TableRows {
        TableRows {
            picks: self.all_picks(),
            usage: self.usage_counters(),
            cache: self
                .cache
                .iter()
                .map(|((kind, key), entry)| CacheRow {
                    kind: *kind,
                    key: key.clone(),
                    entry: entry.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild tables from rows, rejecting duplicate keys
    pub(crate) fn from_rows(rows: TableRows) -> Result<Self, crate::Error> {
        let mut tables = Self::default();

        for pick in rows.picks {
            let key = (pick.user.clone(), pick.round);
            let row = PickRow {
                driver: pick.driver,
                points: pick.points,
            };
            if tables.picks.insert(key, row).is_some() {
                return Err(crate::Error::store(format!(
                    "Duplicate pick row for {}/{}",
                    pick.user, pick.round
                )));
            }
        }

        for counter in rows.usage {
            if counter.count == 0 {
                continue;
            }
            let key = (counter.user.clone(), counter.driver.clone());
            if tables.usage.insert(key, counter.count).is_some() {
                return Err(crate::Error::store(format!(
                    "Duplicate usage row for {}/{}",
                    counter.user, counter.driver
                )));
            }
        }

        for row in rows.cache {
            tables.cache.insert((row.kind, row.key), row.entry);
        }

        Ok(tables)
    }
}

/// Row-oriented, serializable copy of [`LedgerTables`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct TableRows {
    pub(crate) picks: Vec<Pick>,
    pub(crate) usage: Vec<UsageCounter>,
    #[serde(default)]
    pub(crate) cache: Vec<CacheRow>,
}

/// One cache table row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CacheRow {
    kind: CacheKind,
    key: String,
    #[serde(flatten)]
    entry: CacheEntry,
}

fn to_pick(user: &str, round: u32, row: &PickRow) -> Pick {
    Pick {
        user: user.to_string(),
        round,
        driver: row.driver.clone(),
        points: row.points,
    }
}

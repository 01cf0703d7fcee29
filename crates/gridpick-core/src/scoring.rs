//! Points table and score aggregation
//!
//! Totals treat unresolved picks as 0. Rankings are ordered by total
//! descending, then username ascending, so equal totals always come out in the
//! same order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::traits::{Classification, Pick};

/// Standard top-ten points allocation
const STANDARD_POINTS: [u32; 10] = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1];

/// Finishing position → points mapping for a season
///
/// Index 0 holds the winner's points. Positions beyond the table, or unknown
/// positions, score 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointsTable(Vec<u32>);

impl PointsTable {
    /// Create a custom points table
    pub fn new(points: Vec<u32>) -> Self {
        Self(points)
    }

    /// The standard 25-18-15-12-10-8-6-4-2-1 table
    pub fn standard() -> Self {
        Self(STANDARD_POINTS.to_vec())
    }

    /// Whether the table awards no positions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Points for a finishing position
    pub fn points_for(&self, position: Option<u32>) -> u32 {
        match position {
            Some(pos) if pos >= 1 => self.0.get(pos as usize - 1).copied().unwrap_or(0),
            _ => 0,
        }
    }

    /// Points a driver earned in a classification
    ///
    /// A driver missing from the classification (did not start, excluded)
    /// scores 0.
    pub fn points_for_driver(&self, results: &[Classification], driver: &str) -> u32 {
        results
            .iter()
            .find(|entry| entry.driver_code == driver)
            .map(|entry| self.points_for(entry.position))
            .unwrap_or(0)
    }
}

impl Default for PointsTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// A user's season total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Username
    pub user: String,
    /// Sum of resolved points
    pub total: u32,
}

/// Cumulative points of a user after each round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreProgression {
    /// Username
    pub user: String,
    /// Round numbers, ascending
    pub rounds: Vec<u32>,
    /// Running total after each entry of `rounds`
    pub cumulative: Vec<u32>,
}

/// Every pick of a user with the season total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonSheet {
    /// Username
    pub user: String,
    /// Picks ordered by round
    pub picks: Vec<Pick>,
    /// Sum of resolved points
    pub total: u32,
}

/// Rank `users` by the sum of their resolved pick points
///
/// Users without picks appear with 0. Picks of users outside `users` are
/// ignored.
pub fn rank<'a>(users: &[String], picks: impl IntoIterator<Item = &'a Pick>) -> Vec<ScoreEntry> {
    let mut totals: HashMap<&str, u32> = users.iter().map(|u| (u.as_str(), 0)).collect();

    for pick in picks {
        if let Some(total) = totals.get_mut(pick.user.as_str()) {
            *total += pick.points.unwrap_or(0);
        }
    }

    let mut standings: Vec<ScoreEntry> = totals
        .into_iter()
        .map(|(user, total)| ScoreEntry {
            user: user.to_string(),
            total,
        })
        .collect();

    standings.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.user.cmp(&b.user)));
    standings
}

/// Cumulative points per user, one point per round the user has a pick row for
pub fn progression<'a>(
    users: &[String],
    picks: impl IntoIterator<Item = &'a Pick>,
) -> Vec<ScoreProgression> {
    let by_user = group_by_user(users, picks);

    users
        .iter()
        .map(|user| {
            let mut running = 0;
            let mut rounds = Vec::new();
            let mut cumulative = Vec::new();
            for (round, points) in by_user.get(user.as_str()).into_iter().flatten() {
                running += points.unwrap_or(0);
                rounds.push(*round);
                cumulative.push(running);
            }
            ScoreProgression {
                user: user.clone(),
                rounds,
                cumulative,
            }
        })
        .collect()
}

/// Per-user pick sheets ordered by round
pub fn season_sheets<'a>(
    users: &[String],
    picks: impl IntoIterator<Item = &'a Pick>,
) -> Vec<SeasonSheet> {
    let mut sheets: BTreeMap<&str, Vec<Pick>> = users.iter().map(|u| (u.as_str(), Vec::new())).collect();
    for pick in picks {
        if let Some(sheet) = sheets.get_mut(pick.user.as_str()) {
            sheet.push(pick.clone());
        }
    }

    users
        .iter()
        .map(|user| {
            let mut picks = sheets.remove(user.as_str()).unwrap_or_default();
            picks.sort_by_key(|p| p.round);
            let total = picks.iter().map(|p| p.points.unwrap_or(0)).sum();
            SeasonSheet {
                user: user.clone(),
                picks,
                total,
            }
        })
        .collect()
}

fn group_by_user<'a>(
    users: &[String],
    picks: impl IntoIterator<Item = &'a Pick>,
) -> HashMap<&'a str, BTreeMap<u32, Option<u32>>> {
    let mut grouped: HashMap<&'a str, BTreeMap<u32, Option<u32>>> = HashMap::new();
    for pick in picks {
        if users.iter().any(|u| *u == pick.user) {
            grouped
                .entry(pick.user.as_str())
                .or_default()
                .insert(pick.round, pick.points);
        }
    }
    grouped
}

//! Engine events and operation results

use serde::{Deserialize, Serialize};

use crate::traits::{Driver, Round};

/// Events emitted by the [`super::PickEngine`]
///
/// Delivered on a bounded channel for collaborators such as the reminder job.
/// Events are dropped (with a warning) when the receiver falls behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A pick was created or changed
    PickSubmitted {
        user: String,
        round: u32,
        driver: String,
        previous: Option<String>,
    },

    /// A pick was resubmitted with the same driver
    PickUnchanged {
        user: String,
        round: u32,
        driver: String,
    },

    /// A submission was refused by the lock rule or the usage policy
    PickRejected {
        user: String,
        round: u32,
        driver: String,
        reason: String,
    },

    /// Points were written to a pending pick
    PointsResolved {
        user: String,
        round: u32,
        driver: String,
        points: u32,
    },

    /// A reconciliation pass finished
    RoundReconciled {
        round: u32,
        resolved: usize,
        pending: usize,
    },

    /// A provider lookup failed and the engine degraded
    ProviderDegraded { lookup: String, error: String },

    /// The ledger was reset for a new season
    SeasonReset { players: usize, rounds: usize },

    /// Ledger state disagrees with the roster or with its counters
    InconsistencyDetected { detail: String },
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// The slot had no driver before
    Created,
    /// The slot named another driver before
    Changed { previous: String },
    /// The slot already named this driver
    Unchanged,
}

/// Result of reconciling one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Round number
    pub round: u32,
    /// Picks whose points were written by this pass
    pub resolved: usize,
    /// Picks still waiting for results after this pass
    pub pending: usize,
}

impl ReconcileReport {
    /// Whether every pick of the round has points
    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

/// One row of a user's season board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRow {
    /// Scheduled round
    pub round: Round,
    /// Picked driver, if any
    pub driver: Option<String>,
    /// Resolved points, if any
    pub points: Option<u32>,
    /// Whether the pick can still be changed
    pub open: bool,
}

/// A roster driver annotated with one user's usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverAvailability {
    /// Roster entry
    pub driver: Driver,
    /// Live picks of this driver by the user
    pub used: u32,
    /// Whether the policy allows picking the driver for a new round
    pub eligible: bool,
}

/// Summary of a season reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    /// Players given empty picks
    pub players: usize,
    /// Rounds in the fetched schedule
    pub rounds: usize,
}

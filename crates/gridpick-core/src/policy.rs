//! Driver usage policy
//!
//! The policy decides whether a user may pick a driver given how often the
//! user has already picked each driver this season. It is a pure function of a
//! [`UsageSnapshot`] and the roster, so the engine can evaluate it before
//! opening the store transaction.

use serde::{Deserialize, Serialize};

use crate::traits::{Driver, UsageSnapshot};

/// Per-season cap on how often a user may pick the same driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UsagePolicy {
    /// Any driver, any number of times
    Uncapped,

    /// Each driver at most `cap` times
    SimpleCap {
        /// Maximum picks per driver
        cap: u32,
    },

    /// Each driver once until every roster driver has been used, then twice
    PhasedCap,
}

impl UsagePolicy {
    /// Whether `driver` may be picked given the user's current usage
    ///
    /// `usage` must already exclude the pick being replaced.
    pub fn is_eligible(&self, driver: &str, usage: &UsageSnapshot, roster: &[Driver]) -> bool {
        let used = usage.count(driver);
        match self {
            UsagePolicy::Uncapped => true,
            UsagePolicy::SimpleCap { cap } => used < *cap,
            UsagePolicy::PhasedCap => {
                if used < 1 {
                    return true;
                }
                let rotation_complete =
                    !roster.is_empty() && usage.min_over(roster.iter().map(|d| d.code.as_str())) >= 1;
                used < 2 && rotation_complete
            }
        }
    }

    /// Validate the policy parameters
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            UsagePolicy::SimpleCap { cap: 0 } => {
                Err(crate::Error::config("Usage cap must be at least 1"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for UsagePolicy {
    fn default() -> Self {
        UsagePolicy::SimpleCap { cap: 2 }
    }
}

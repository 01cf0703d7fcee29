//! Error types for the pick ledger
//!
//! Constraint and lock violations are caller-visible failures that never leave
//! a partial mutation behind. Provider failures are absorbed on read paths and
//! only surface where a write cannot proceed without provider data.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the pick ledger
#[derive(Error, Debug)]
pub enum Error {
    /// A schedule, roster, results or team provider could not be reached
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The usage policy rejects the attempted driver
    #[error("Driver {driver} already used {count} time(s) by {user}; usage cap reached")]
    ConstraintViolation {
        /// Username
        user: String,
        /// Driver code
        driver: String,
        /// Current usage of the driver (excluding the slot being replaced)
        count: u32,
    },

    /// The round is no longer open for selection
    #[error("Round {round} ({date}) is locked for selection")]
    RoundLocked {
        /// Round number
        round: u32,
        /// Scheduled date of the round
        date: NaiveDate,
    },

    /// Referenced round, driver or user does not exist in the season
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ledger state diverges from the roster or from its own counters
    #[error("Data inconsistency: {0}")]
    DataInconsistency(String),

    /// Ledger or cache store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a provider-unavailable error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a constraint violation
    pub fn constraint(user: impl Into<String>, driver: impl Into<String>, count: u32) -> Self {
        Self::ConstraintViolation {
            user: user.into(),
            driver: driver.into(),
            count,
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a data inconsistency error
    pub fn inconsistency(msg: impl Into<String>) -> Self {
        Self::DataInconsistency(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error is a transient provider failure
    pub fn is_provider_unavailable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

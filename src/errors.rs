use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a deal cannot be claimed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The claim window has not opened yet
    NotYetStarted,
    /// The claim window has closed
    Expired,
    /// Every unit of capacity has been claimed
    CapacityExhausted,
    /// The deal was switched off by its merchant
    Inactive,
}

impl UnavailableReason {
    /// Stable snake_case identifier used in API responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotYetStarted => "not_yet_started",
            Self::Expired => "expired",
            Self::CapacityExhausted => "capacity_exhausted",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Not authorized: {message}")]
    Authorization { message: String },

    #[error("Deal {deal_id} is unavailable: {reason}")]
    DealUnavailable {
        deal_id: i64,
        reason: UnavailableReason,
    },

    #[error("User {user_id} already holds an active claim on deal {deal_id}")]
    DuplicateClaim { user_id: i64, deal_id: i64 },

    #[error("Deal {deal_id} is already saved")]
    DuplicateSave { user_id: i64, deal_id: i64 },

    #[error("Lost the race for the last slot of deal {deal_id}, try again")]
    ConcurrencyConflict { deal_id: i64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

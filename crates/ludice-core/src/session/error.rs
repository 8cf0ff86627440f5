//! Session errors.

use super::types::MatchPhase;
use crate::api::ApiError;
use thiserror::Error;

/// Errors from session operations
///
/// Validation variants display as the alert shown to the user.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Minimum bet is {min} ⭐")]
    BetTooLow { min: u64 },

    #[error("Maximum bet is {max} ⭐")]
    BetTooHigh { max: u64 },

    #[error("Insufficient balance!")]
    InsufficientBalance { bet: u64, balance: u64 },

    #[error("Dice value must be between 1 and 6")]
    InvalidRoll(u8),

    #[error("A request is already in progress")]
    RequestInFlight,

    #[error("Session is not idle: {0:?}")]
    NotIdle(MatchPhase),

    #[error("No opponent search in progress")]
    NotSearching,

    #[error("No active game")]
    NotInGame,

    #[error("Request refused by the server")]
    Refused,

    #[error("Unexpected response status: {0}")]
    UnexpectedStatus(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// Caught before any network call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::BetTooLow { .. }
                | SessionError::BetTooHigh { .. }
                | SessionError::InsufficientBalance { .. }
                | SessionError::InvalidRoll(_)
        )
    }

    /// Alert for a failed opponent search
    pub fn search_alert(&self) -> &'static str {
        match self {
            SessionError::UnexpectedStatus(403) => "Authentication failed. Please try again.",
            SessionError::UnexpectedStatus(429) => {
                "Too many requests. Please wait a moment and try again."
            }
            _ => "Failed to find opponent. Please try again.",
        }
    }
}

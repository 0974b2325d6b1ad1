//! Errors surfaced to the user who invoked a command.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Recoverable command-level failures.
///
/// Every variant ends up as a reply message; none of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    #[error("Subscription expired on {}. Ask an admin to approve more days.", .expiry.format("%Y-%m-%d %H:%M UTC"))]
    SubscriptionExpired { expiry: DateTime<Utc> },

    #[error("Watch list is full ({limit} usernames max). Remove one with /unwatch first.")]
    CapacityExceeded { limit: usize },

    #[error("You are not registered yet. Send /start first.")]
    NotRegistered,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("You are not allowed to use this command.")]
    Unauthorized,
}

impl BotError {
    /// Builds an [`BotError::InvalidArgument`] from any message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

//! Telegram Bot API wrapper for outgoing messages.

use std::time::Duration;

use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::RateLimiter;
use crate::commands::{Broadcast, CommandResult, RULE};
use crate::reconciler::{Membership, Notifier, TransitionEvent};
use crate::registry::OwnerId;

/// Minimum gap between two outgoing messages.
pub const SEND_INTERVAL_MS: u64 = 50;

/// Errors that can occur while talking to Telegram.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Flood wait required: {0:?}")]
    FloodWait(Duration),

    #[error("API request failed: {0}")]
    Request(String),
}

impl From<RequestError> for TelegramError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(secs) => Self::FloodWait(secs.duration()),
            other => Self::Request(other.to_string()),
        }
    }
}

/// How a fan-out went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Rate-limited handle to the Bot API.
pub struct TelegramBot {
    /// The underlying teloxide bot.
    bot: Bot,

    /// Rate limiter shared by every send.
    rate_limiter: RateLimiter,
}

impl TelegramBot {
    /// Creates a bot handle from a `@BotFather` token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::from_bot(Bot::new(token))
    }

    /// Wraps an existing teloxide bot.
    #[must_use]
    pub fn from_bot(bot: Bot) -> Self {
        Self {
            bot,
            rate_limiter: RateLimiter::from_millis(SEND_INTERVAL_MS),
        }
    }

    /// Sends a plain text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the Bot API rejects the request.
    pub async fn send_text(&self, chat: OwnerId, text: &str) -> Result<(), TelegramError> {
        self.rate_limiter.wait_and_acquire().await;
        let result = self.bot.send_message(ChatId(chat), text).await;
        self.finish(chat, result).await
    }

    /// Sends a command reply, with the main menu attached when requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the Bot API rejects the request.
    pub async fn reply(&self, chat: ChatId, result: &CommandResult) -> Result<(), TelegramError> {
        self.rate_limiter.wait_and_acquire().await;

        let request = self.bot.send_message(chat, result.message.as_str());
        let sent = if result.show_menu {
            request.reply_markup(main_menu()).await
        } else {
            request.await
        };
        self.finish(chat.0, sent).await
    }

    /// Delivers a broadcast to every recipient, one at a time.
    pub async fn broadcast(&self, broadcast: &Broadcast) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for &recipient in &broadcast.recipients {
            match self.send_text(recipient, &broadcast.text).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!("Broadcast to {} failed: {}", recipient, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Broadcast finished: {} delivered, {} failed",
            report.delivered, report.failed
        );
        report
    }

    /// Returns the underlying teloxide bot.
    #[must_use]
    pub const fn inner(&self) -> &Bot {
        &self.bot
    }

    async fn finish<T>(&self, chat: i64, result: Result<T, RequestError>) -> Result<(), TelegramError> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = TelegramError::from(e);
                if let TelegramError::FloodWait(wait) = err {
                    self.rate_limiter.handle_retry_after(wait).await;
                }
                debug!("Send to chat {} failed: {}", chat, err);
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

impl Notifier for TelegramBot {
    async fn notify(&self, owner: OwnerId, event: &TransitionEvent) {
        let text = transition_text(event);
        if let Err(e) = self.send_text(owner, &text).await {
            warn!(
                "Could not notify {} about {} ({} -> {}): {}",
                owner, event.subject, event.from, event.to, e
            );
        }
    }
}

/// Text of the notification for a committed transition.
#[must_use]
pub fn transition_text(event: &TransitionEvent) -> String {
    match event.to {
        Membership::Banned => format!(
            "🚫 BANNED SUCCESSFULLY\n{RULE}\nUsername: @{}",
            event.subject
        ),
        Membership::Watching => format!(
            "✅ UNBANNED SUCCESSFULLY\n{RULE}\nUsername: @{}",
            event.subject
        ),
    }
}

/// Inline keyboard shown under `/start`.
#[must_use]
pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("👁 Watch", "watch"),
            InlineKeyboardButton::callback("🚫 Ban", "ban"),
        ],
        vec![
            InlineKeyboardButton::callback("🔎 Status", "status"),
            InlineKeyboardButton::callback("📋 My lists", "list"),
        ],
        vec![
            InlineKeyboardButton::callback("✅ Approve", "approve"),
            InlineKeyboardButton::callback("👑 Add admin", "addadmin"),
        ],
        vec![InlineKeyboardButton::callback("📢 Broadcast", "broadcast")],
    ])
}

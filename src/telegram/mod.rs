//! Telegram Bot API front end.
//!
//! Outgoing messages go through a rate-limited [`TelegramBot`]; incoming
//! updates are routed to the command handler by [`UpdateRouter`].

mod client;
mod dispatch;
mod rate_limiter;

pub use client::{BroadcastReport, SEND_INTERVAL_MS, TelegramBot, TelegramError, main_menu, transition_text};
pub use dispatch::UpdateRouter;
pub use rate_limiter::RateLimiter;

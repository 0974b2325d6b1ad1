//! Configuration module for the monitor bot.
//!
//! Handles loading of the Telegram credentials and the monitoring
//! parameters from the environment.

mod settings;

pub use settings::{BotSettings, ConfigError, TelegramConfig};

/// Seconds between two reconciliation passes.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Consecutive disagreeing observations needed before a subject flips.
pub const DEFAULT_CONFIRM_LIMIT: u32 = 3;

/// Maximum number of watched usernames per subscriber.
pub const DEFAULT_MAX_USERNAMES: usize = 20;

//! Application settings and Telegram configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_CONFIRM_LIMIT, DEFAULT_MAX_USERNAMES};

/// Telegram bot credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather.
    pub bot_token: String,

    /// Numeric Telegram id of the bot owner (always an admin).
    pub owner_id: i64,
}

impl TelegramConfig {
    /// Creates configuration from environment variables.
    ///
    /// Expects `BOT_TOKEN` and `OWNER_ID` to be set.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup("BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("BOT_TOKEN"))?;

        let owner_id = lookup("OWNER_ID")
            .ok_or(ConfigError::MissingEnvVar("OWNER_ID"))?
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOwnerId)?;

        Ok(Self { bot_token, owner_id })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("owner_id", &self.owner_id)
            .finish()
    }
}

/// Monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Path to the registry JSON document.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Seconds between reconciliation passes.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Consecutive confirmations required before a subject flips.
    #[serde(default = "default_confirm_limit")]
    pub confirm_limit: u32,

    /// Watch-list capacity per subscriber.
    #[serde(default = "default_max_usernames")]
    pub max_usernames: usize,

    /// Trial length granted on `/start`.
    #[serde(default = "default_trial_days")]
    pub trial_days: i64,

    /// Upper bound for a single oracle call.
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_secs: u64,

    /// Port of the liveness endpoint.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data.json")
}

const fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

const fn default_confirm_limit() -> u32 {
    DEFAULT_CONFIRM_LIMIT
}

const fn default_max_usernames() -> usize {
    DEFAULT_MAX_USERNAMES
}

const fn default_trial_days() -> i64 {
    7
}

const fn default_oracle_timeout() -> u64 {
    10
}

const fn default_port() -> u16 {
    8080
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            check_interval_secs: default_check_interval(),
            confirm_limit: default_confirm_limit(),
            max_usernames: default_max_usernames(),
            trial_days: default_trial_days(),
            oracle_timeout_secs: default_oracle_timeout(),
            port: default_port(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    ///
    /// Values that are missing, unparseable or out of range fall back to
    /// their defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn positive<T: FromStr + PartialOrd + Default>(raw: Option<String>) -> Option<T> {
            raw.and_then(|s| s.trim().parse().ok())
                .filter(|v| *v > T::default())
        }

        Self {
            data_path: lookup("DB_FILE").map_or_else(default_data_path, PathBuf::from),
            check_interval_secs: positive(lookup("CHECK_INTERVAL"))
                .unwrap_or_else(default_check_interval),
            confirm_limit: positive(lookup("CONFIRM_LIMIT")).unwrap_or_else(default_confirm_limit),
            max_usernames: positive(lookup("MAX_USERNAMES")).unwrap_or_else(default_max_usernames),
            trial_days: positive(lookup("TRIAL_DAYS"))
                .filter(|d| *d <= 3650)
                .unwrap_or_else(default_trial_days),
            oracle_timeout_secs: positive(lookup("ORACLE_TIMEOUT"))
                .unwrap_or_else(default_oracle_timeout),
            port: positive(lookup("PORT")).unwrap_or_else(default_port),
        }
    }

    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub const fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid OWNER_ID format (must be a numeric Telegram user id)")]
    InvalidOwnerId,
}

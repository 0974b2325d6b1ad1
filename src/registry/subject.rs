use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// Longest username accepted as a subject.
pub const MAX_SUBJECT_LEN: usize = 64;

/// A normalized username: no leading `@`, lowercase, restricted charset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Normalizes raw user input into a subject.
    pub fn parse(raw: &str) -> Result<Self, BotError> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed).to_lowercase();

        if name.is_empty() {
            return Err(BotError::invalid("Username cannot be empty."));
        }
        if name.chars().count() > MAX_SUBJECT_LEN {
            return Err(BotError::invalid(format!(
                "Username too long (max {MAX_SUBJECT_LEN} characters)."
            )));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.'))
        {
            return Err(BotError::invalid(format!(
                "Invalid character '{bad}' in username. Use letters, digits, '_' or '.'."
            )));
        }

        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Subject {
    type Error = BotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

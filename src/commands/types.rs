//! Command types and definitions.

use std::fmt;

use crate::error::BotError;
use crate::registry::{OwnerId, Subject};

/// Separator line under every reply headline.
pub const RULE: &str = "━━━━━━━━━━━━━━━━━━";

/// Longest subscription extension `/approve` accepts.
pub const MAX_APPROVE_DAYS: i64 = 3650;

/// Available bot commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Register (trial) and show the main menu.
    Start,

    /// Show help information.
    Help,

    /// Start monitoring a username.
    Watch(Subject),

    /// Stop tracking a username.
    Unwatch(Subject),

    /// Put a username on the ban list by hand.
    Ban(Subject),

    /// Query the oracle once for a username.
    Status(Subject),

    /// Show the caller's lists and subscription.
    List,

    /// Extend a subscriber's subscription (admin).
    Approve { target: OwnerId, days: i64 },

    /// Grant admin rights (owner).
    AddAdmin(OwnerId),

    /// Send a message to every subscriber (admin).
    Broadcast(String),

    /// Show information about the bot.
    Info,
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// Returns `Ok(None)` if the message is not a command this bot knows,
    /// and `InvalidArgument` with a usage line if the arguments are wrong.
    pub fn parse(text: &str) -> Result<Option<Self>, BotError> {
        let text = text.trim();

        let Some(after_slash) = text.strip_prefix('/') else {
            return Ok(None);
        };

        let (head, args) = match after_slash.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (after_slash, ""),
        };
        // `/watch@SomeBot` in group chats
        let name = head.split_once('@').map_or(head, |(name, _)| name).to_lowercase();

        let command = match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "watch" => Self::Watch(Self::subject_arg(args, "/watch <username>")?),
            "unwatch" => Self::Unwatch(Self::subject_arg(args, "/unwatch <username>")?),
            "ban" => Self::Ban(Self::subject_arg(args, "/ban <username>")?),
            "status" => Self::Status(Self::subject_arg(args, "/status <username>")?),
            "list" => Self::List,
            "approve" => Self::parse_approve(args)?,
            "addadmin" => Self::AddAdmin(Self::id_arg(args, "/addadmin <user_id>")?),
            "broadcast" => {
                if args.is_empty() {
                    return Err(usage("/broadcast <message>"));
                }
                Self::Broadcast(args.to_owned())
            }
            "info" => Self::Info,
            _ => return Ok(None),
        };

        Ok(Some(command))
    }

    fn subject_arg(args: &str, usage_line: &str) -> Result<Subject, BotError> {
        let mut parts = args.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(raw), None) => Subject::parse(raw),
            _ => Err(usage(usage_line)),
        }
    }

    fn id_arg(args: &str, usage_line: &str) -> Result<OwnerId, BotError> {
        let mut parts = args.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(raw), None) => raw.parse().map_err(|_| usage(usage_line)),
            _ => Err(usage(usage_line)),
        }
    }

    /// Parses approve arguments: `<owner_id> <days>`
    fn parse_approve(args: &str) -> Result<Self, BotError> {
        const USAGE: &str = "/approve <user_id> <days>";

        let mut parts = args.split_whitespace();
        let (Some(target), Some(days), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(usage(USAGE));
        };

        let target = target.parse().map_err(|_| usage(USAGE))?;
        let days: i64 = days.parse().map_err(|_| usage(USAGE))?;
        if !(1..=MAX_APPROVE_DAYS).contains(&days) {
            return Err(BotError::invalid(format!(
                "Days must be between 1 and {MAX_APPROVE_DAYS}."
            )));
        }

        Ok(Self::Approve { target, days })
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Watch(_) => "watch",
            Self::Unwatch(_) => "unwatch",
            Self::Ban(_) => "ban",
            Self::Status(_) => "status",
            Self::List => "list",
            Self::Approve { .. } => "approve",
            Self::AddAdmin(_) => "addadmin",
            Self::Broadcast(_) => "broadcast",
            Self::Info => "info",
        }
    }

    /// Returns all available commands with their descriptions.
    #[must_use]
    pub fn all_commands() -> Vec<(&'static str, &'static str)> {
        vec![
            ("/start", "Register and show the menu"),
            ("/watch <username>", "Start monitoring a username"),
            ("/unwatch <username>", "Stop tracking a username"),
            ("/ban <username>", "Add a username to your ban list"),
            ("/status <username>", "Check a username right now"),
            ("/list", "Show your lists and subscription"),
            ("/approve <user_id> <days>", "Extend a subscription (admin)"),
            ("/addadmin <user_id>", "Grant admin rights (owner)"),
            ("/broadcast <message>", "Message every subscriber (admin)"),
            ("/info", "Show bot information"),
            ("/help", "Show this help message"),
        ]
    }
}

fn usage(line: &str) -> BotError {
    BotError::invalid(format!("Usage: {line}"))
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Watch(s) | Self::Unwatch(s) | Self::Ban(s) | Self::Status(s) => {
                write!(f, "{} {s}", self.name())
            }
            Self::Approve { target, days } => write!(f, "approve {target} {days}"),
            Self::AddAdmin(id) => write!(f, "addadmin {id}"),
            Self::Broadcast(text) => write!(f, "broadcast ({} chars)", text.chars().count()),
            _ => f.write_str(self.name()),
        }
    }
}

/// A message that has to go out to several chats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub recipients: Vec<OwnerId>,
    pub text: String,
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,

    /// Whether to attach the main menu keyboard to the reply.
    pub show_menu: bool,

    /// Outgoing fan-out requested by the command.
    pub broadcast: Option<Broadcast>,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            show_menu: false,
            broadcast: None,
        }
    }

    /// Creates a successful result that shows the main menu.
    #[must_use]
    pub fn with_menu(message: impl Into<String>) -> Self {
        Self {
            show_menu: true,
            ..Self::success(message)
        }
    }

    /// Creates a successful result that fans a message out.
    #[must_use]
    pub fn with_broadcast(message: impl Into<String>, broadcast: Broadcast) -> Self {
        Self {
            broadcast: Some(broadcast),
            ..Self::success(message)
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            show_menu: false,
            broadcast: None,
        }
    }
}

impl From<BotError> for CommandResult {
    fn from(err: BotError) -> Self {
        Self::error(format!("❌ {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(name: &str) -> Subject {
        Subject::parse(name).unwrap()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(BotCommand::parse("/start"), Ok(Some(BotCommand::Start)));
        assert_eq!(BotCommand::parse("/help"), Ok(Some(BotCommand::Help)));
        assert_eq!(BotCommand::parse("/list"), Ok(Some(BotCommand::List)));
    }

    #[test]
    fn test_parse_subject_commands_normalize() {
        assert_eq!(
            BotCommand::parse("/watch @Alice"),
            Ok(Some(BotCommand::Watch(subject("alice"))))
        );
        assert_eq!(
            BotCommand::parse("/ban Bob"),
            Ok(Some(BotCommand::Ban(subject("bob"))))
        );
        assert_eq!(
            BotCommand::parse("/status carol"),
            Ok(Some(BotCommand::Status(subject("carol"))))
        );
    }

    #[test]
    fn test_parse_missing_argument_gives_usage() {
        let err = BotCommand::parse("/watch").unwrap_err();
        assert_eq!(err, BotError::invalid("Usage: /watch <username>"));
        assert!(BotCommand::parse("/watch a b").is_err());
        assert!(BotCommand::parse("/broadcast").is_err());
    }

    #[test]
    fn test_parse_bot_suffix_and_case() {
        assert_eq!(
            BotCommand::parse("/WATCH@MonitorBot dave"),
            Ok(Some(BotCommand::Watch(subject("dave"))))
        );
    }

    #[test]
    fn test_parse_approve() {
        assert_eq!(
            BotCommand::parse("/approve 12345 30"),
            Ok(Some(BotCommand::Approve { target: 12345, days: 30 }))
        );
        assert!(BotCommand::parse("/approve 12345").is_err());
        assert!(BotCommand::parse("/approve abc 30").is_err());
        assert!(BotCommand::parse("/approve 12345 0").is_err());
        assert!(BotCommand::parse("/approve 12345 99999").is_err());
    }

    #[test]
    fn test_parse_addadmin_and_broadcast() {
        assert_eq!(BotCommand::parse("/addadmin 77"), Ok(Some(BotCommand::AddAdmin(77))));
        assert!(BotCommand::parse("/addadmin seventy").is_err());
        assert_eq!(
            BotCommand::parse("/broadcast  Hello   everyone "),
            Ok(Some(BotCommand::Broadcast("Hello   everyone".to_owned())))
        );
    }

    #[test]
    fn test_parse_non_commands() {
        assert_eq!(BotCommand::parse("hello"), Ok(None));
        assert_eq!(BotCommand::parse("/unknown thing"), Ok(None));
        assert_eq!(BotCommand::parse(""), Ok(None));
    }
}

//! Command handler implementation.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::types::{Broadcast, BotCommand, CommandResult, RULE};
use crate::error::BotError;
use crate::reconciler::{Membership, Oracle, observe};
use crate::registry::{BanOutcome, OwnerId, SharedRegistry, Subject, WatchOutcome};

/// Handles bot commands against the shared registry.
pub struct CommandHandler<O> {
    /// Shared registry (single serialization point).
    registry: SharedRegistry,

    /// Oracle used by `/status`.
    oracle: Arc<O>,

    /// Telegram id of the bot owner.
    owner_id: OwnerId,

    /// Watch-list capacity per subscriber.
    max_usernames: usize,

    /// Trial length granted on registration.
    trial_days: i64,
}

impl<O: Oracle> CommandHandler<O> {
    /// Creates a new command handler.
    #[must_use]
    pub const fn new(
        registry: SharedRegistry,
        oracle: Arc<O>,
        owner_id: OwnerId,
        max_usernames: usize,
        trial_days: i64,
    ) -> Self {
        Self {
            registry,
            oracle,
            owner_id,
            max_usernames,
            trial_days,
        }
    }

    /// Tries to parse and execute a command from a message.
    ///
    /// Returns `None` if the message is not a command at all.
    pub async fn try_handle(&self, sender: OwnerId, message_text: &str) -> Option<CommandResult> {
        let command = match BotCommand::parse(message_text) {
            Ok(Some(command)) => command,
            Ok(None) if message_text.trim_start().starts_with('/') => {
                return Some(CommandResult::error("Unknown command. Send /help for the list."));
            }
            Ok(None) => return None,
            Err(e) => return Some(e.into()),
        };

        debug!("Handling command from {}: {}", sender, command);
        let result = self.execute(sender, command, Utc::now()).await;
        info!(
            "Command result for {}: success={}, broadcast={}",
            sender,
            result.success,
            result.broadcast.is_some()
        );

        Some(result)
    }

    /// Executes a parsed command at the given instant.
    pub async fn execute(&self, sender: OwnerId, command: BotCommand, now: DateTime<Utc>) -> CommandResult {
        let outcome = match command {
            BotCommand::Start => self.handle_start(sender, now).await,
            BotCommand::Help => Ok(Self::handle_help()),
            BotCommand::Watch(subject) => self.handle_watch(sender, subject, now).await,
            BotCommand::Unwatch(subject) => self.handle_unwatch(sender, &subject, now).await,
            BotCommand::Ban(subject) => self.handle_ban(sender, subject, now).await,
            BotCommand::Status(subject) => Ok(self.handle_status(&subject).await),
            BotCommand::List => self.handle_list(sender, now).await,
            BotCommand::Approve { target, days } => self.handle_approve(sender, target, days, now).await,
            BotCommand::AddAdmin(id) => self.handle_add_admin(sender, id).await,
            BotCommand::Broadcast(text) => self.handle_broadcast(sender, text).await,
            BotCommand::Info => Ok(Self::handle_info()),
        };

        outcome.unwrap_or_else(CommandResult::from)
    }

    async fn handle_start(&self, sender: OwnerId, now: DateTime<Utc>) -> Result<CommandResult, BotError> {
        let trial_days = self.trial_days;
        let (created, expiry) = self
            .registry
            .update(|r| {
                let created = r.register(sender, now, trial_days);
                Ok((created, r.user(sender)?.expiry()))
            })
            .await?;

        let greeting = if created {
            info!("Registered new user {}", sender);
            format!("Welcome! Your {trial_days}-day trial is active.")
        } else {
            "Welcome back!".to_owned()
        };

        Ok(CommandResult::with_menu(format!(
            "🔥 USERNAME MONITOR BOT\n{RULE}\n{greeting}\nSubscription until: {}",
            format_expiry(expiry)
        )))
    }

    fn handle_help() -> CommandResult {
        let mut text = format!("📖 COMMANDS\n{RULE}");
        for (cmd, desc) in BotCommand::all_commands() {
            let _ = write!(text, "\n{cmd} - {desc}");
        }
        CommandResult::success(text)
    }

    async fn handle_watch(
        &self,
        sender: OwnerId,
        subject: Subject,
        now: DateTime<Utc>,
    ) -> Result<CommandResult, BotError> {
        let max = self.max_usernames;
        let name = subject.clone();
        let outcome = self
            .registry
            .update(|r| r.user_mut(sender)?.add_watch(subject, max, now))
            .await?;

        let message = match outcome {
            WatchOutcome::Added => {
                format!("✅ USER ADDED\n{RULE}\nUsername: {name}\nStatus: Monitoring started")
            }
            WatchOutcome::AlreadyWatching => format!("ℹ️ Already watching {name}."),
            WatchOutcome::MovedFromBanned => {
                format!("✅ USER MOVED\n{RULE}\nUsername: {name}\nMoved from your ban list to monitoring")
            }
        };
        Ok(CommandResult::success(message))
    }

    async fn handle_unwatch(
        &self,
        sender: OwnerId,
        subject: &Subject,
        now: DateTime<Utc>,
    ) -> Result<CommandResult, BotError> {
        let removed = self
            .registry
            .update(|r| r.user_mut(sender)?.unwatch(subject, now))
            .await?;

        Ok(match removed {
            Some(Membership::Watching) => CommandResult::success(format!("🗑 Stopped watching {subject}.")),
            Some(Membership::Banned) => CommandResult::success(format!("🗑 Removed {subject} from your ban list.")),
            None => CommandResult::error(format!("{subject} is not on any of your lists.")),
        })
    }

    async fn handle_ban(
        &self,
        sender: OwnerId,
        subject: Subject,
        now: DateTime<Utc>,
    ) -> Result<CommandResult, BotError> {
        let name = subject.clone();
        let outcome = self
            .registry
            .update(|r| r.user_mut(sender)?.manual_ban(subject, now))
            .await?;

        let message = match outcome {
            BanOutcome::Added => format!("🚫 MANUAL BAN ADDED\n{RULE}\nUsername: {name}"),
            BanOutcome::AlreadyBanned => format!("ℹ️ {name} is already on your ban list."),
            BanOutcome::MovedFromWatching => {
                format!("🚫 MANUAL BAN ADDED\n{RULE}\nUsername: {name}\nRemoved from monitoring")
            }
        };
        Ok(CommandResult::success(message))
    }

    async fn handle_status(&self, subject: &Subject) -> CommandResult {
        let observation = observe(self.oracle.as_ref(), subject).await;
        CommandResult::success(format!(
            "{} LIVE STATUS REPORT\n{RULE}\nUsername: {subject}\nStatus: {observation}",
            observation.emoji()
        ))
    }

    async fn handle_list(&self, sender: OwnerId, now: DateTime<Utc>) -> Result<CommandResult, BotError> {
        let max = self.max_usernames;
        let text = self
            .registry
            .read(|r| {
                let user = r.user(sender)?;
                let mut text = format!("📋 YOUR LISTS\n{RULE}\nWatching ({}/{max}):", user.watching().len());
                if user.watching().is_empty() {
                    text.push_str("\n  (none)");
                }
                for subject in user.watching() {
                    let streak = user.streak(subject);
                    if streak > 0 {
                        let _ = write!(text, "\n  • {subject} ({streak} ban signal(s))");
                    } else {
                        let _ = write!(text, "\n  • {subject}");
                    }
                }

                let _ = write!(text, "\nBanned ({}):", user.banned().len());
                if user.banned().is_empty() {
                    text.push_str("\n  (none)");
                }
                for subject in user.banned() {
                    let _ = write!(text, "\n  • {subject}");
                }

                let state = if user.is_entitled(now) { "active" } else { "expired" };
                let _ = write!(text, "\n{RULE}\nSubscription: {state} until {}", format_expiry(user.expiry()));
                Ok::<_, BotError>(text)
            })
            .await?;

        Ok(CommandResult::success(text))
    }

    async fn handle_approve(
        &self,
        sender: OwnerId,
        target: OwnerId,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<CommandResult, BotError> {
        let owner = self.owner_id;
        let expiry = self
            .registry
            .update(|r| {
                if !r.is_admin(sender, owner) {
                    return Err(BotError::Unauthorized);
                }
                r.approve(target, days, now)
            })
            .await?;

        info!("User {} approved {} for {} day(s)", sender, target, days);
        Ok(CommandResult::success(format!(
            "👑 APPROVED\n{RULE}\nUser: {target}\nDays: {days}\nUntil: {}",
            format_expiry(expiry)
        )))
    }

    async fn handle_add_admin(&self, sender: OwnerId, id: OwnerId) -> Result<CommandResult, BotError> {
        if sender != self.owner_id {
            return Err(BotError::Unauthorized);
        }

        let added = self.registry.update(|r| Ok(r.add_admin(id))).await?;
        Ok(if added {
            info!("User {} is now an admin", id);
            CommandResult::success(format!("👑 NEW ADMIN ADDED: {id}"))
        } else {
            CommandResult::success(format!("ℹ️ {id} is already an admin."))
        })
    }

    async fn handle_broadcast(&self, sender: OwnerId, text: String) -> Result<CommandResult, BotError> {
        let owner = self.owner_id;
        let recipients = self
            .registry
            .read(|r| {
                if r.is_admin(sender, owner) {
                    Ok(r.owners().collect::<Vec<_>>())
                } else {
                    Err(BotError::Unauthorized)
                }
            })
            .await?;

        let count = recipients.len();
        Ok(CommandResult::with_broadcast(
            format!("📢 Broadcasting to {count} user(s)..."),
            Broadcast { recipients, text },
        ))
    }

    fn handle_info() -> CommandResult {
        let version = env!("CARGO_PKG_VERSION");
        CommandResult::success(format!(
            "Username Monitor Bot v{version}\n\
             Watches usernames and reports ban/unban transitions."
        ))
    }
}

/// Usage hint for a main-menu button.
#[must_use]
pub fn menu_hint(callback_data: &str) -> Option<&'static str> {
    match callback_data {
        "watch" => Some("Send /watch <username> to start monitoring."),
        "ban" => Some("Send /ban <username> to add a username to your ban list."),
        "status" => Some("Send /status <username> for a live check."),
        "list" => Some("Send /list to see your lists."),
        "approve" => Some("Admins: /approve <user_id> <days>"),
        "addadmin" => Some("Owner: /addadmin <user_id>"),
        "broadcast" => Some("Admins: /broadcast <message>"),
        _ => None,
    }
}

fn format_expiry(expiry: DateTime<Utc>) -> String {
    expiry.format("%Y-%m-%d %H:%M UTC").to_string()
}

impl<O> std::fmt::Debug for CommandHandler<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("owner_id", &self.owner_id)
            .field("max_usernames", &self.max_usernames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::reconciler::Observation;
    use crate::reconciler::testing::ScriptedOracle;
    use crate::registry::RegistryStore;

    const OWNER: OwnerId = 1;

    struct Fixture {
        handler: CommandHandler<ScriptedOracle>,
        oracle: Arc<ScriptedOracle>,
        _dir: tempfile::TempDir,
    }

    fn fixture(max_usernames: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let registry = SharedRegistry::open(RegistryStore::new(dir.path().join("data.json")));
        let oracle = Arc::new(ScriptedOracle::new());
        let handler = CommandHandler::new(registry, Arc::clone(&oracle), OWNER, max_usernames, 7);
        Fixture { handler, oracle, _dir: dir }
    }

    fn subject(name: &str) -> Subject {
        Subject::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_watch_requires_registration() {
        let fx = fixture(20);
        let result = fx.handler.execute(10, BotCommand::Watch(subject("a")), Utc::now()).await;
        assert!(!result.success);
        assert!(result.message.contains("/start"));
    }

    #[tokio::test]
    async fn test_start_then_watch_and_list() {
        let fx = fixture(20);
        let now = Utc::now();

        let start = fx.handler.execute(10, BotCommand::Start, now).await;
        assert!(start.success);
        assert!(start.show_menu);

        let watch = fx.handler.execute(10, BotCommand::Watch(subject("alice")), now).await;
        assert!(watch.success);
        assert!(watch.message.contains("alice"));

        let list = fx.handler.execute(10, BotCommand::List, now).await;
        assert!(list.message.contains("Watching (1/20)"));
        assert!(list.message.contains("• alice"));
    }

    #[tokio::test]
    async fn test_capacity_is_reported() {
        let fx = fixture(1);
        let now = Utc::now();
        fx.handler.execute(10, BotCommand::Start, now).await;
        fx.handler.execute(10, BotCommand::Watch(subject("one")), now).await;

        let result = fx.handler.execute(10, BotCommand::Watch(subject("two")), now).await;
        assert!(!result.success);
        assert!(result.message.contains("full"));
    }

    #[tokio::test]
    async fn test_expired_subscription_is_reported() {
        let fx = fixture(20);
        let now = Utc::now();
        fx.handler.execute(10, BotCommand::Start, now).await;

        let later = now + Duration::days(8);
        let result = fx.handler.execute(10, BotCommand::Ban(subject("x")), later).await;
        assert!(!result.success);
        assert!(result.message.contains("expired"));
    }

    #[tokio::test]
    async fn test_approve_requires_admin() {
        let fx = fixture(20);
        let now = Utc::now();
        fx.handler.execute(10, BotCommand::Start, now).await;

        let denied = fx
            .handler
            .execute(10, BotCommand::Approve { target: 10, days: 30 }, now)
            .await;
        assert!(!denied.success);
        assert!(denied.message.contains("not allowed"));

        let approved = fx
            .handler
            .execute(OWNER, BotCommand::Approve { target: 10, days: 30 }, now)
            .await;
        assert!(approved.success);

        let unknown = fx
            .handler
            .execute(OWNER, BotCommand::Approve { target: 99, days: 30 }, now)
            .await;
        assert!(!unknown.success);
    }

    #[tokio::test]
    async fn test_add_admin_is_owner_only() {
        let fx = fixture(20);
        let now = Utc::now();

        let denied = fx.handler.execute(5, BotCommand::AddAdmin(5), now).await;
        assert!(!denied.success);

        assert!(fx.handler.execute(OWNER, BotCommand::AddAdmin(5), now).await.success);

        // Admins may approve but still may not add admins.
        fx.handler.execute(7, BotCommand::Start, now).await;
        assert!(fx.handler.execute(5, BotCommand::Approve { target: 7, days: 3 }, now).await.success);
        assert!(!fx.handler.execute(5, BotCommand::AddAdmin(6), now).await.success);
    }

    #[tokio::test]
    async fn test_broadcast_targets_every_user() {
        let fx = fixture(20);
        let now = Utc::now();
        for id in [10, 20, 30] {
            fx.handler.execute(id, BotCommand::Start, now).await;
        }

        let denied = fx.handler.execute(10, BotCommand::Broadcast("hi".to_owned()), now).await;
        assert!(denied.broadcast.is_none());

        let result = fx.handler.execute(OWNER, BotCommand::Broadcast("hi".to_owned()), now).await;
        assert_eq!(
            result.broadcast,
            Some(Broadcast {
                recipients: vec![10, 20, 30],
                text: "hi".to_owned(),
            })
        );
    }

    #[tokio::test]
    async fn test_status_reports_oracle_answer() {
        let fx = fixture(20);
        fx.oracle.script("eve", [Observation::Banned]);

        let result = fx.handler.execute(10, BotCommand::Status(subject("eve")), Utc::now()).await;
        assert!(result.message.contains("Status: BANNED"));

        let unknown = fx.handler.execute(10, BotCommand::Status(subject("eve")), Utc::now()).await;
        assert!(unknown.message.contains("Status: UNKNOWN"));
    }

    #[tokio::test]
    async fn test_try_handle_distinguishes_non_commands() {
        let fx = fixture(20);
        assert!(fx.handler.try_handle(10, "just chatting").await.is_none());

        let unknown = fx.handler.try_handle(10, "/dance").await.unwrap();
        assert!(!unknown.success);

        let usage = fx.handler.try_handle(10, "/watch").await.unwrap();
        assert!(usage.message.contains("Usage: /watch <username>"));
    }

    #[test]
    fn test_menu_hints() {
        assert!(menu_hint("watch").unwrap().contains("/watch"));
        assert_eq!(menu_hint("nope"), None);
    }
}

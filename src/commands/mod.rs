//! Command handling module.
//!
//! Parses chat commands and applies them to the shared registry. Effects
//! that need the transport (replies, broadcasts) are returned to the caller.

mod handler;
mod types;

pub use handler::{CommandHandler, menu_hint};
pub use types::{Broadcast, BotCommand, CommandResult, MAX_APPROVE_DAYS, RULE};

//! Username Monitor Bot Library
//!
//! A Telegram bot that watches usernames on behalf of paying subscribers
//! and reports when a username gets banned or comes back.
//!
//! This crate provides the core functionality for:
//! - Debounced reconciliation of watch and ban lists against a status oracle
//! - Persisting subscribers, lists and subscriptions in a JSON registry
//! - Running reconciliation passes on a schedule
//! - Handling subscriber and admin commands via the Bot API

pub mod commands;
pub mod config;
pub mod error;
pub mod health;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod telegram;

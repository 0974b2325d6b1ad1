//! The persisted document: every subscriber plus the admin list.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::TrackedUser;
use crate::error::BotError;

/// Numeric Telegram id of a subscriber.
pub type OwnerId = i64;

/// All subscribers, keyed by owner id, plus the admins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    users: BTreeMap<OwnerId, TrackedUser>,

    #[serde(default)]
    admins: Vec<OwnerId>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Registers an owner with a trial subscription. Returns `false` if the
    /// owner was already known; their record is left untouched.
    pub fn register(&mut self, owner: OwnerId, now: DateTime<Utc>, trial_days: i64) -> bool {
        if self.users.contains_key(&owner) {
            return false;
        }
        self.users
            .insert(owner, TrackedUser::new(now + Duration::days(trial_days)));
        true
    }

    pub fn user(&self, owner: OwnerId) -> Result<&TrackedUser, BotError> {
        self.users.get(&owner).ok_or(BotError::NotRegistered)
    }

    pub fn user_mut(&mut self, owner: OwnerId) -> Result<&mut TrackedUser, BotError> {
        self.users.get_mut(&owner).ok_or(BotError::NotRegistered)
    }

    /// Owners in ascending id order.
    pub fn owners(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.users.keys().copied()
    }

    pub fn users(&self) -> impl Iterator<Item = (OwnerId, &TrackedUser)> {
        self.users.iter().map(|(id, user)| (*id, user))
    }

    #[must_use]
    pub fn admins(&self) -> &[OwnerId] {
        &self.admins
    }

    /// The bot owner is always an admin.
    #[must_use]
    pub fn is_admin(&self, id: OwnerId, bot_owner: OwnerId) -> bool {
        id == bot_owner || self.admins.contains(&id)
    }

    /// Returns `false` if the id already was an admin.
    pub fn add_admin(&mut self, id: OwnerId) -> bool {
        if self.admins.contains(&id) {
            return false;
        }
        self.admins.push(id);
        true
    }

    /// Sets the target's subscription to end `days` from now.
    pub fn approve(&mut self, target: OwnerId, days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>, BotError> {
        let user = self.user_mut(target)?;
        let expiry = now + Duration::days(days);
        user.set_expiry(expiry);
        Ok(expiry)
    }

    /// Repairs every record after loading. Returns how many were changed.
    pub fn sanitize(&mut self) -> usize {
        let admins_before = self.admins.len();
        self.admins.sort_unstable();
        self.admins.dedup();

        let repaired = self
            .users
            .values_mut()
            .map(TrackedUser::sanitize)
            .filter(|changed| *changed)
            .count();
        repaired + usize::from(self.admins.len() != admins_before)
    }
}

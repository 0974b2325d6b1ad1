//! Per-owner watch and ban lists.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Subject, is_entitled};
use crate::error::BotError;
use crate::reconciler::{Decision, Membership, Observation, TransitionEvent, reconcile};

/// Result of a `/watch` request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Added,
    AlreadyWatching,
    MovedFromBanned,
}

/// Result of a `/ban` request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    Added,
    AlreadyBanned,
    MovedFromWatching,
}

/// Everything tracked for one subscriber.
///
/// `watching` and `banned` are disjoint and keep insertion order. A streak
/// entry exists only while it is non-zero and only for a subject in one of
/// the two lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredUser")]
pub struct TrackedUser {
    #[serde(rename = "watch")]
    watching: Vec<Subject>,

    #[serde(rename = "ban")]
    banned: Vec<Subject>,

    #[serde(rename = "confirm")]
    streak: BTreeMap<Subject, u32>,

    #[serde(serialize_with = "expiry_format::serialize")]
    expiry: DateTime<Utc>,

    /// Stored names that are not valid usernames; dropped by `sanitize`.
    #[serde(skip)]
    invalid: Vec<String>,
}

/// On-disk shape of a [`TrackedUser`]. Names stay raw strings so one bad
/// entry cannot make the whole document unreadable.
#[derive(Deserialize)]
struct StoredUser {
    #[serde(default)]
    watch: Vec<String>,

    #[serde(default)]
    ban: Vec<String>,

    #[serde(default)]
    confirm: BTreeMap<String, u32>,

    #[serde(deserialize_with = "expiry_format::deserialize")]
    expiry: DateTime<Utc>,
}

impl From<StoredUser> for TrackedUser {
    fn from(stored: StoredUser) -> Self {
        let mut invalid = Vec::new();
        let mut parse = |raw: String| match Subject::parse(&raw) {
            Ok(subject) => Some(subject),
            Err(_) => {
                invalid.push(raw);
                None
            }
        };

        let watching = stored.watch.into_iter().filter_map(&mut parse).collect();
        let banned = stored.ban.into_iter().filter_map(&mut parse).collect();
        let streak = stored
            .confirm
            .into_iter()
            .filter_map(|(raw, count)| parse(raw).map(|subject| (subject, count)))
            .collect();

        Self {
            watching,
            banned,
            streak,
            expiry: stored.expiry,
            invalid,
        }
    }
}

impl TrackedUser {
    #[must_use]
    pub const fn new(expiry: DateTime<Utc>) -> Self {
        Self {
            watching: Vec::new(),
            banned: Vec::new(),
            streak: BTreeMap::new(),
            expiry,
            invalid: Vec::new(),
        }
    }

    #[must_use]
    pub fn watching(&self) -> &[Subject] {
        &self.watching
    }

    #[must_use]
    pub fn banned(&self) -> &[Subject] {
        &self.banned
    }

    #[must_use]
    pub const fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn set_expiry(&mut self, expiry: DateTime<Utc>) {
        self.expiry = expiry;
    }

    #[must_use]
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        is_entitled(self.expiry, now)
    }

    /// Current consecutive-disagreement count for a subject.
    #[must_use]
    pub fn streak(&self, subject: &Subject) -> u32 {
        self.streak.get(subject).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn membership(&self, subject: &Subject) -> Option<Membership> {
        if self.watching.contains(subject) {
            Some(Membership::Watching)
        } else if self.banned.contains(subject) {
            Some(Membership::Banned)
        } else {
            None
        }
    }

    fn ensure_entitled(&self, now: DateTime<Utc>) -> Result<(), BotError> {
        if self.is_entitled(now) {
            Ok(())
        } else {
            Err(BotError::SubscriptionExpired { expiry: self.expiry })
        }
    }

    /// Starts watching a subject, pulling it out of the ban list if needed.
    pub fn add_watch(
        &mut self,
        subject: Subject,
        max_watching: usize,
        now: DateTime<Utc>,
    ) -> Result<WatchOutcome, BotError> {
        self.ensure_entitled(now)?;

        if self.watching.contains(&subject) {
            return Ok(WatchOutcome::AlreadyWatching);
        }
        if self.watching.len() >= max_watching {
            return Err(BotError::CapacityExceeded { limit: max_watching });
        }

        let outcome = if remove(&mut self.banned, &subject) {
            WatchOutcome::MovedFromBanned
        } else {
            WatchOutcome::Added
        };
        self.streak.remove(&subject);
        self.watching.push(subject);
        Ok(outcome)
    }

    /// Puts a subject on the ban list by hand. The ban list has no cap.
    pub fn manual_ban(&mut self, subject: Subject, now: DateTime<Utc>) -> Result<BanOutcome, BotError> {
        self.ensure_entitled(now)?;

        if self.banned.contains(&subject) {
            return Ok(BanOutcome::AlreadyBanned);
        }

        let outcome = if remove(&mut self.watching, &subject) {
            BanOutcome::MovedFromWatching
        } else {
            BanOutcome::Added
        };
        self.streak.remove(&subject);
        self.banned.push(subject);
        Ok(outcome)
    }

    /// Stops tracking a subject. Returns the list it was removed from.
    pub fn unwatch(&mut self, subject: &Subject, now: DateTime<Utc>) -> Result<Option<Membership>, BotError> {
        self.ensure_entitled(now)?;

        let removed = if remove(&mut self.watching, subject) {
            Some(Membership::Watching)
        } else if remove(&mut self.banned, subject) {
            Some(Membership::Banned)
        } else {
            None
        };
        self.streak.remove(subject);
        Ok(removed)
    }

    /// Subjects to visit in one pass: watching first, then banned.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Subject, Membership)> {
        self.watching
            .iter()
            .map(|s| (s.clone(), Membership::Watching))
            .chain(self.banned.iter().map(|s| (s.clone(), Membership::Banned)))
            .collect()
    }

    /// Applies one observation taken while the subject was in `expected`.
    ///
    /// The observation is dropped if the subject has since left that list.
    pub fn apply(
        &mut self,
        subject: &Subject,
        expected: Membership,
        observation: Observation,
        limit: u32,
    ) -> Option<TransitionEvent> {
        if self.membership(subject) != Some(expected) {
            return None;
        }

        match reconcile(expected, observation, self.streak(subject), limit) {
            Decision::NoChange => {
                self.streak.remove(subject);
                None
            }
            Decision::Increment(streak) => {
                self.streak.insert(subject.clone(), streak);
                None
            }
            Decision::Flip(to) => {
                let (from_list, to_list) = match to {
                    Membership::Banned => (&mut self.watching, &mut self.banned),
                    Membership::Watching => (&mut self.banned, &mut self.watching),
                };
                remove(from_list, subject);
                to_list.push(subject.clone());
                self.streak.remove(subject);

                Some(TransitionEvent {
                    subject: subject.clone(),
                    from: expected,
                    to,
                })
            }
        }
    }

    /// Describes every broken invariant without changing anything.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .invalid
            .iter()
            .map(|raw| format!("'{raw}' is not a valid username"))
            .collect();

        for (name, list) in [("watch", &self.watching), ("ban", &self.banned)] {
            for (i, subject) in list.iter().enumerate() {
                if list[..i].contains(subject) {
                    problems.push(format!("'{subject}' appears twice in the {name} list"));
                }
            }
        }
        for subject in &self.watching {
            if self.banned.contains(subject) {
                problems.push(format!("'{subject}' is in both the watch and the ban list"));
            }
        }
        for (subject, streak) in &self.streak {
            if *streak > 0 && self.membership(subject).is_none() {
                problems.push(format!("'{subject}' has a streak of {streak} but is not tracked"));
            }
        }

        problems
    }

    /// Repairs a loaded record so that every invariant holds.
    ///
    /// Invalid names are dropped, duplicates too (first occurrence wins), a
    /// subject on both lists stays banned, and stale or zero streaks are
    /// removed. Returns `true` if anything changed.
    pub fn sanitize(&mut self) -> bool {
        let before = self.clone();

        for raw in self.invalid.drain(..) {
            warn!("Dropping invalid username '{}' from stored record", raw);
        }

        dedup_in_order(&mut self.banned);
        dedup_in_order(&mut self.watching);
        let banned = self.banned.clone();
        self.watching.retain(|s| !banned.contains(s));

        let watching = &self.watching;
        self.streak
            .retain(|s, streak| *streak > 0 && (watching.contains(s) || banned.contains(s)));

        *self != before
    }
}

fn remove(list: &mut Vec<Subject>, subject: &Subject) -> bool {
    match list.iter().position(|s| s == subject) {
        Some(idx) => {
            list.remove(idx);
            true
        }
        None => false,
    }
}

fn dedup_in_order(list: &mut Vec<Subject>) {
    let mut seen = Vec::with_capacity(list.len());
    list.retain(|s| {
        if seen.contains(s) {
            false
        } else {
            seen.push(s.clone());
            true
        }
    });
}

/// Expiry is written as RFC 3339; plain `YYYY-MM-DD` dates from older data
/// files are read as midnight UTC.
mod expiry_format {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

    pub fn serialize<S: Serializer>(expiry: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        expiry.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;

        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Utc));
        }

        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| de::Error::custom(format!("invalid expiry '{raw}'")))
    }
}

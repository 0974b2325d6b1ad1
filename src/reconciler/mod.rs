//! Debounced watch/ban reconciliation.
//!
//! A subject only changes sets after the oracle disagrees with its current
//! membership `limit` times in a row. Anything else, including `Unknown`,
//! resets the streak, so a flaky or unreachable oracle can never flip state.

mod notifier;
mod oracle;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use notifier::Notifier;
pub use oracle::{Oracle, OracleError, PlaceholderOracle, TimeoutOracle};

use crate::registry::{Subject, TrackedUser};

/// Which set a subject currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Watching,
    Banned,
}

impl Membership {
    /// The set a subject moves to when its membership flips.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Watching => Self::Banned,
            Self::Banned => Self::Watching,
        }
    }

    /// The observation that contradicts this membership.
    const fn disagreeing(self) -> Observation {
        match self {
            Self::Watching => Observation::Banned,
            Self::Banned => Observation::Active,
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Watching => f.write_str("WATCHING"),
            Self::Banned => f.write_str("BANNED"),
        }
    }
}

/// A single answer from the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Observation {
    Active,
    Banned,
    Unknown,
}

impl Observation {
    /// Status marker used in chat replies.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Active => "🟢",
            Self::Banned => "🔴",
            Self::Unknown => "⚪",
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("ACTIVE"),
            Self::Banned => f.write_str("BANNED"),
            Self::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Outcome of one observation for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The observation agreed (or was unknown); the streak goes back to 0.
    NoChange,
    /// Disagreement below the limit; carries the new streak.
    Increment(u32),
    /// The limit was reached; the subject moves to the carried set and its
    /// streak goes back to 0.
    Flip(Membership),
}

/// A committed move between the watching and banned sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub subject: Subject,
    pub from: Membership,
    pub to: Membership,
}

/// Decides what a fresh observation does to a subject.
///
/// A `limit` of 0 behaves like 1.
#[must_use]
pub fn reconcile(current: Membership, observation: Observation, streak: u32, limit: u32) -> Decision {
    if observation != current.disagreeing() {
        return Decision::NoChange;
    }

    let streak = streak.saturating_add(1);
    if streak >= limit {
        Decision::Flip(current.opposite())
    } else {
        Decision::Increment(streak)
    }
}

/// Queries the oracle, folding any failure into [`Observation::Unknown`].
pub async fn observe<O: Oracle>(oracle: &O, subject: &Subject) -> Observation {
    match oracle.check(subject.as_str()).await {
        Ok(observation) => {
            debug!("Oracle: {} is {}", subject, observation);
            observation
        }
        Err(e) => {
            warn!("Oracle check for {} failed, treating as UNKNOWN: {}", subject, e);
            Observation::Unknown
        }
    }
}

/// One snapshot entry together with the answer the oracle gave for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedSubject {
    pub subject: Subject,
    pub membership: Membership,
    pub observation: Observation,
}

/// Queries the oracle for every snapshot entry, in order.
///
/// `answers` caches observations by subject, so a subject shared by several
/// snapshots in the same pass reaches the oracle only once.
pub async fn observe_snapshot<O: Oracle>(
    oracle: &O,
    snapshot: Vec<(Subject, Membership)>,
    answers: &mut HashMap<Subject, Observation>,
) -> Vec<ObservedSubject> {
    let mut observed = Vec::with_capacity(snapshot.len());

    for (subject, membership) in snapshot {
        let observation = match answers.get(&subject) {
            Some(observation) => *observation,
            None => {
                let observation = observe(oracle, &subject).await;
                answers.insert(subject.clone(), observation);
                observation
            }
        };
        observed.push(ObservedSubject {
            subject,
            membership,
            observation,
        });
    }

    observed
}

/// Applies a pass worth of observations to one user, in order.
///
/// Each subject appears at most once per snapshot, so a subject flipped
/// earlier in the pass is not processed again.
pub fn apply_observations(
    user: &mut TrackedUser,
    observed: &[ObservedSubject],
    limit: u32,
) -> Vec<TransitionEvent> {
    observed
        .iter()
        .filter_map(|o| user.apply(&o.subject, o.membership, o.observation, limit))
        .collect()
}

/// Runs one full pass over a single user's subjects.
///
/// Subjects are visited in a snapshot taken before the pass: watching first,
/// then banned, each in insertion order.
pub async fn reconcile_all<O: Oracle>(
    user: &mut TrackedUser,
    oracle: &O,
    limit: u32,
) -> Vec<TransitionEvent> {
    let observed = observe_snapshot(oracle, user.snapshot(), &mut HashMap::new()).await;
    apply_observations(user, &observed, limit)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::testing::ScriptedOracle;
    use super::*;
    use crate::registry::Subject;

    fn subject(name: &str) -> Subject {
        Subject::parse(name).unwrap()
    }

    fn user_watching(names: &[&str]) -> TrackedUser {
        let now = Utc::now();
        let mut user = TrackedUser::new(now + Duration::days(7));
        for name in names {
            user.add_watch(subject(name), 20, now).unwrap();
        }
        user
    }

    fn assert_disjoint(user: &TrackedUser) {
        for s in user.watching() {
            assert!(!user.banned().contains(s), "{s} is in both sets");
        }
    }

    #[test]
    fn test_decision_table() {
        use Membership::{Banned as InBan, Watching};
        use Observation::{Active, Banned, Unknown};

        assert_eq!(reconcile(Watching, Banned, 0, 3), Decision::Increment(1));
        assert_eq!(reconcile(Watching, Banned, 2, 3), Decision::Flip(InBan));
        assert_eq!(reconcile(Watching, Active, 2, 3), Decision::NoChange);
        assert_eq!(reconcile(Watching, Unknown, 2, 3), Decision::NoChange);

        assert_eq!(reconcile(InBan, Active, 1, 3), Decision::Increment(2));
        assert_eq!(reconcile(InBan, Active, 2, 3), Decision::Flip(Watching));
        assert_eq!(reconcile(InBan, Banned, 2, 3), Decision::NoChange);
        assert_eq!(reconcile(InBan, Unknown, 2, 3), Decision::NoChange);
    }

    #[test]
    fn test_single_sample_never_flips_above_limit_one() {
        assert_eq!(
            reconcile(Membership::Watching, Observation::Banned, 0, 2),
            Decision::Increment(1)
        );
    }

    #[test]
    fn test_zero_limit_behaves_like_one() {
        assert_eq!(
            reconcile(Membership::Watching, Observation::Banned, 0, 0),
            Decision::Flip(Membership::Banned)
        );
        assert_eq!(
            reconcile(Membership::Watching, Observation::Banned, 0, 1),
            Decision::Flip(Membership::Banned)
        );
    }

    #[tokio::test]
    async fn test_alice_scenario() {
        use Observation::{Active, Banned};

        let alice = subject("alice");
        let mut user = user_watching(&["alice"]);
        let oracle = ScriptedOracle::new();
        oracle.script("alice", [Banned, Banned, Active, Banned, Banned, Banned]);

        let mut streaks = Vec::new();
        let mut events_per_pass = Vec::new();
        for _ in 0..6 {
            let events = reconcile_all(&mut user, &oracle, 3).await;
            streaks.push(user.streak(&alice));
            events_per_pass.push(events);
            assert_disjoint(&user);
        }

        // The flip clears the streak, so the last entry reads 0.
        assert_eq!(streaks, vec![1, 2, 0, 1, 2, 0]);
        assert!(events_per_pass[..5].iter().all(Vec::is_empty));
        assert_eq!(
            events_per_pass[5],
            vec![TransitionEvent {
                subject: alice.clone(),
                from: Membership::Watching,
                to: Membership::Banned,
            }]
        );
        assert!(user.banned().contains(&alice));
        assert!(!user.watching().contains(&alice));
    }

    #[tokio::test]
    async fn test_unknown_resets_and_never_flips() {
        use Observation::{Banned, Unknown};

        let bob = subject("bob");
        let mut user = user_watching(&["bob"]);
        let oracle = ScriptedOracle::new();
        oracle.script("bob", [Banned, Banned, Unknown, Banned, Banned, Unknown]);

        for _ in 0..6 {
            assert!(reconcile_all(&mut user, &oracle, 3).await.is_empty());
        }
        assert_eq!(user.streak(&bob), 0);
        assert!(user.watching().contains(&bob));

        // The script is exhausted; the oracle keeps answering Unknown.
        for _ in 0..10 {
            assert!(reconcile_all(&mut user, &oracle, 3).await.is_empty());
        }
        assert!(user.watching().contains(&bob));
    }

    #[tokio::test]
    async fn test_oracle_error_counts_as_unknown_for_that_subject_only() {
        use Observation::Banned;

        let mut user = user_watching(&["carol", "dave"]);
        let oracle = ScriptedOracle::new();
        oracle.script("carol", [Banned]);
        oracle.then_fail("carol");
        oracle.script("dave", [Banned, Banned]);

        reconcile_all(&mut user, &oracle, 2).await; // carol: 1, dave: 1
        let events = reconcile_all(&mut user, &oracle, 2).await; // carol: error, dave: flip

        assert_eq!(user.streak(&subject("carol")), 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject, subject("dave"));
    }

    #[tokio::test]
    async fn test_unban_flips_back_to_watching() {
        use Observation::Active;

        let now = Utc::now();
        let mut user = TrackedUser::new(now + Duration::days(1));
        user.manual_ban(subject("erin"), now).unwrap();

        let oracle = ScriptedOracle::new();
        oracle.script("erin", [Active, Active, Active]);

        let mut events = Vec::new();
        for _ in 0..3 {
            events.extend(reconcile_all(&mut user, &oracle, 3).await);
        }

        assert_eq!(
            events,
            vec![TransitionEvent {
                subject: subject("erin"),
                from: Membership::Banned,
                to: Membership::Watching,
            }]
        );
        assert_eq!(user.watching(), &[subject("erin")]);
    }

    #[tokio::test]
    async fn test_flipped_subject_is_not_visited_twice_in_one_pass() {
        use Observation::Banned;

        let mut user = user_watching(&["frank"]);
        let oracle = ScriptedOracle::new();
        // A second visit in the same pass would consume the extra answer.
        oracle.script("frank", [Banned, Banned]);

        let events = reconcile_all(&mut user, &oracle, 1).await;
        assert_eq!(events.len(), 1);
        assert_eq!(oracle.calls("frank"), 1);
    }

    #[tokio::test]
    async fn test_pass_is_deterministic() {
        use Observation::{Active, Banned};

        let run = || async {
            let mut user = user_watching(&["gus", "hal", "ivy"]);
            user.manual_ban(subject("jon"), Utc::now()).unwrap();
            let oracle = ScriptedOracle::new();
            oracle.script("gus", [Banned]);
            oracle.script("hal", [Active]);
            oracle.script("ivy", [Banned]);
            oracle.script("jon", [Active]);
            reconcile_all(&mut user, &oracle, 1).await
        };

        let first = run().await;
        let second = run().await;
        assert_eq!(first, second);
        let order: Vec<_> = first.iter().map(|e| e.subject.as_str().to_owned()).collect();
        assert_eq!(order, vec!["gus", "ivy", "jon"]);
    }

    #[tokio::test]
    async fn test_shared_answers_reach_the_oracle_once() {
        let oracle = ScriptedOracle::new();
        oracle.script("kim", [Observation::Banned]);

        let mut answers = HashMap::new();
        let snapshot = vec![(subject("kim"), Membership::Watching)];
        let first = observe_snapshot(&oracle, snapshot.clone(), &mut answers).await;
        let second = observe_snapshot(&oracle, snapshot, &mut answers).await;

        assert_eq!(first, second);
        assert_eq!(first[0].observation, Observation::Banned);
        assert_eq!(oracle.calls("kim"), 1);
    }

    #[tokio::test]
    async fn test_empty_user_yields_no_events() {
        let mut user = TrackedUser::new(Utc::now());
        let oracle = ScriptedOracle::new();
        assert!(reconcile_all(&mut user, &oracle, 3).await.is_empty());
    }
}

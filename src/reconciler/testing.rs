//! Scripted collaborators for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{Notifier, Observation, Oracle, OracleError, TransitionEvent};
use crate::registry::OwnerId;

/// Answers from a per-subject queue; `Unknown` once the queue runs dry.
#[derive(Debug, Default)]
pub(crate) struct ScriptedOracle {
    answers: Mutex<HashMap<String, VecDeque<Result<Observation, OracleError>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedOracle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, subject: &str, answers: impl IntoIterator<Item = Observation>) {
        let mut map = self.answers.lock().unwrap();
        map.entry(subject.to_owned())
            .or_default()
            .extend(answers.into_iter().map(Ok));
    }

    /// Queues a failed call after the answers scripted so far.
    pub(crate) fn then_fail(&self, subject: &str) {
        let mut map = self.answers.lock().unwrap();
        map.entry(subject.to_owned())
            .or_default()
            .push_back(Err(OracleError::Request("scripted failure".to_owned())));
    }

    pub(crate) fn calls(&self, subject: &str) -> usize {
        self.calls.lock().unwrap().get(subject).copied().unwrap_or(0)
    }
}

impl Oracle for ScriptedOracle {
    async fn check(&self, subject: &str) -> Result<Observation, OracleError> {
        *self.calls.lock().unwrap().entry(subject.to_owned()).or_default() += 1;
        self.answers
            .lock()
            .unwrap()
            .get_mut(subject)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(Observation::Unknown))
    }
}

/// Keeps every notification it receives.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<(OwnerId, TransitionEvent)>>,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sent(&self) -> Vec<(OwnerId, TransitionEvent)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, owner: OwnerId, event: &TransitionEvent) {
        self.sent.lock().unwrap().push((owner, event.clone()));
    }
}

//! Periodic reconciliation runner.
//!
//! One pass works in three steps:
//! 1. Snapshot every owner's subjects (registry lock held briefly)
//! 2. Query the oracle for each snapshot entry (no lock held)
//! 3. Apply the observations and save (registry lock held)
//!
//! Observations whose subject changed lists between steps 1 and 3 (a
//! command ran meanwhile) are dropped. Notifications go out after the lock
//! is released, exactly once per transition, whether or not the save worked.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::reconciler::{Membership, Notifier, Oracle, TransitionEvent, apply_observations, observe_snapshot};
use crate::registry::{OwnerId, SharedRegistry, Subject};

/// Messages that can be sent to the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerMessage {
    /// Stop the scheduler after the current pass.
    Shutdown,
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Snapshot entries visited.
    pub checked: usize,
    /// Committed transitions, in pass order.
    pub events: Vec<(OwnerId, TransitionEvent)>,
    /// Whether the registry was written successfully.
    pub saved: bool,
}

/// Drives reconciliation passes over the whole registry.
pub struct MonitorScheduler<O, N> {
    /// Shared registry.
    registry: SharedRegistry,

    /// Status source.
    oracle: Arc<O>,

    /// Transition sink.
    notifier: Arc<N>,

    /// Time between passes.
    check_interval: Duration,

    /// Consecutive confirmations needed to flip.
    confirm_limit: u32,
}

impl<O: Oracle, N: Notifier> MonitorScheduler<O, N> {
    /// Creates a new monitor scheduler.
    #[must_use]
    pub const fn new(
        registry: SharedRegistry,
        oracle: Arc<O>,
        notifier: Arc<N>,
        check_interval: Duration,
        confirm_limit: u32,
    ) -> Self {
        Self {
            registry,
            oracle,
            notifier,
            check_interval,
            confirm_limit,
        }
    }

    /// Runs the scheduler loop. The first pass starts immediately.
    pub async fn run(&self, mut rx: mpsc::Receiver<SchedulerMessage>) {
        info!(
            "Monitor scheduler started (interval: {:?}, confirm limit: {})",
            self.check_interval, self.confirm_limit
        );

        let mut check_timer = interval(self.check_interval);
        check_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = check_timer.tick() => {
                    self.run_pass().await;
                }
                // Shutdown, or every sender is gone.
                _ = rx.recv() => {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }

        if !self.registry.flush().await {
            warn!("Registry still has unsaved changes at shutdown");
        }
    }

    /// Runs one reconciliation pass over every owner.
    pub async fn run_pass(&self) -> PassReport {
        // A save that failed last time goes first.
        let flushed = self.registry.flush().await;

        // Step 1: snapshot
        let snapshot: Vec<(OwnerId, Vec<(Subject, Membership)>)> = self
            .registry
            .read(|r| r.users().map(|(id, user)| (id, user.snapshot())).collect())
            .await;

        let checked: usize = snapshot.iter().map(|(_, subjects)| subjects.len()).sum();
        if checked == 0 {
            debug!("Nothing to reconcile");
            return PassReport {
                saved: flushed,
                ..PassReport::default()
            };
        }

        // Step 2: oracle calls, one per distinct subject in this pass
        let mut answers = HashMap::new();
        let mut observed = Vec::with_capacity(snapshot.len());
        for (owner, subjects) in snapshot {
            observed.push((owner, observe_snapshot(self.oracle.as_ref(), subjects, &mut answers).await));
        }

        // Step 3: apply and save
        let limit = self.confirm_limit;
        let (events, saved) = self
            .registry
            .update_infallible(|r| {
                let mut events = Vec::new();
                for (owner, per_owner) in &observed {
                    let Ok(user) = r.user_mut(*owner) else {
                        continue;
                    };
                    events.extend(
                        apply_observations(user, per_owner, limit)
                            .into_iter()
                            .map(|event| (*owner, event)),
                    );
                }
                events
            })
            .await;

        if !saved {
            warn!("Pass results kept in memory; registry save will be retried");
        }

        // Step 4: notify (no lock held)
        for (owner, event) in &events {
            info!("{}: {} moved {} -> {}", owner, event.subject, event.from, event.to);
            self.notifier.notify(*owner, event).await;
        }

        info!(
            "Reconciliation pass done: {} subject(s) checked, {} transition(s)",
            checked,
            events.len()
        );

        PassReport { checked, events, saved }
    }
}

/// Sends [`SchedulerMessage::Shutdown`] to a spawned scheduler and waits for
/// it to finish. Returns `false` if the task panicked or was cancelled.
pub async fn stop(tx: &mpsc::Sender<SchedulerMessage>, handle: JoinHandle<()>) -> bool {
    if tx.send(SchedulerMessage::Shutdown).await.is_err() {
        debug!("Scheduler already stopped");
    }

    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Scheduler task ended abnormally: {}", e);
            false
        }
    }
}

impl<O, N> std::fmt::Debug for MonitorScheduler<O, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorScheduler")
            .field("check_interval", &self.check_interval)
            .field("confirm_limit", &self.confirm_limit)
            .finish_non_exhaustive()
    }
}

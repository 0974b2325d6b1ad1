//! Delivery of committed transitions.

use std::future::Future;

use super::TransitionEvent;
use crate::registry::OwnerId;

/// Tells an owner that one of their subjects changed sets.
///
/// Implementations swallow delivery failures; a lost notification must never
/// reach the reconciliation pass.
pub trait Notifier: Send + Sync {
    fn notify(&self, owner: OwnerId, event: &TransitionEvent) -> impl Future<Output = ()> + Send;
}

//! Periodic watch/ban reconciliation.
//!
//! Runs a reconciliation pass over the whole registry at a fixed interval
//! and hands committed transitions to the notifier.

mod runner;

pub use runner::{MonitorScheduler, PassReport, SchedulerMessage, stop};

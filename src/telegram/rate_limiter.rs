//! Spacing for outgoing Telegram messages.
//!
//! Notifications and broadcasts can burst; Telegram answers bursts with
//! `RetryAfter`. Every send waits for its slot here first.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Enforces a minimum gap between two sends.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum gap between two sends.
    min_interval: Duration,

    /// Earliest instant the next send may go out.
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Creates a rate limiter from milliseconds.
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Waits for the next free slot and claims it.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut next = self.next_slot.lock().await;

        let wait = next.map_or(Duration::ZERO, |slot| slot.saturating_duration_since(Instant::now()));
        if !wait.is_zero() {
            debug!("Rate limiter: waiting {:?} before next send", wait);
            tokio::time::sleep(wait).await;
        }

        *next = Some(Instant::now() + self.min_interval);
        wait
    }

    /// Pushes the next slot back after Telegram asked us to slow down.
    pub async fn handle_retry_after(&self, retry_after: Duration) {
        warn!("Telegram asked to retry after {:?}", retry_after);
        let mut next = self.next_slot.lock().await;
        let candidate = Instant::now() + retry_after;
        if next.is_none_or(|slot| slot < candidate) {
            *next = Some(candidate);
        }
    }
}

//! Status oracle abstraction.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use super::Observation;

/// Errors an oracle may report. The reconciler reads all of them as
/// [`Observation::Unknown`].
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Oracle request failed: {0}")]
    Request(String),
}

/// Reports the live status of a subject.
pub trait Oracle: Send + Sync {
    fn check(&self, subject: &str) -> impl Future<Output = Result<Observation, OracleError>> + Send;
}

/// Oracle used until a real status source is wired in; it never knows.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderOracle;

impl Oracle for PlaceholderOracle {
    async fn check(&self, _subject: &str) -> Result<Observation, OracleError> {
        Ok(Observation::Unknown)
    }
}

/// Bounds every call of the wrapped oracle.
#[derive(Debug, Clone)]
pub struct TimeoutOracle<O> {
    inner: O,
    timeout: Duration,
}

impl<O> TimeoutOracle<O> {
    #[must_use]
    pub const fn new(inner: O, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<O: Oracle> Oracle for TimeoutOracle<O> {
    async fn check(&self, subject: &str) -> Result<Observation, OracleError> {
        tokio::time::timeout(self.timeout, self.inner.check(subject))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))?
    }
}

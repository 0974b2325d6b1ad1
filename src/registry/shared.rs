//! Single serialization point for every registry mutation.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Registry, RegistryStore};
use crate::error::BotError;

struct Inner {
    registry: Registry,
    /// Set when the last save failed; cleared by the next successful one.
    unsaved: bool,
}

/// The in-memory registry behind one async mutex, persisted on every change.
///
/// Memory is authoritative: a failed save keeps the mutation and is retried
/// by the next save or [`SharedRegistry::flush`].
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<Mutex<Inner>>,
    store: Arc<RegistryStore>,
}

impl SharedRegistry {
    #[must_use]
    pub fn new(registry: Registry, store: RegistryStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                registry,
                unsaved: false,
            })),
            store: Arc::new(store),
        }
    }

    /// Loads the registry from the store (empty on any problem).
    #[must_use]
    pub fn open(store: RegistryStore) -> Self {
        let registry = store.load();
        Self::new(registry, store)
    }

    /// Runs a read-only closure under the lock.
    pub async fn read<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        let inner = self.inner.lock().await;
        f(&inner.registry)
    }

    /// Runs a mutation under the lock and saves the result.
    ///
    /// The closure must not change anything when it returns an error; nothing
    /// is saved in that case.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Registry) -> Result<R, BotError>) -> Result<R, BotError> {
        let mut inner = self.inner.lock().await;
        let result = f(&mut inner.registry)?;
        self.persist(&mut inner);
        Ok(result)
    }

    /// Like [`SharedRegistry::update`] for mutations that cannot fail.
    /// Returns whether the save succeeded.
    pub async fn update_infallible<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> (R, bool) {
        let mut inner = self.inner.lock().await;
        let result = f(&mut inner.registry);
        let saved = self.persist(&mut inner);
        (result, saved)
    }

    /// Retries a save that failed earlier. Returns `true` when nothing is
    /// left unsaved.
    pub async fn flush(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.unsaved {
            return true;
        }
        debug!("Retrying registry save");
        self.persist(&mut inner)
    }

    /// Whether the last save attempt failed.
    pub async fn has_unsaved_changes(&self) -> bool {
        self.inner.lock().await.unsaved
    }

    fn persist(&self, inner: &mut Inner) -> bool {
        match self.store.save(&inner.registry) {
            Ok(()) => {
                inner.unsaved = false;
                true
            }
            Err(e) => {
                warn!("Failed to save registry to {}: {}", self.store.path().display(), e);
                inner.unsaved = true;
                false
            }
        }
    }
}

impl std::fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("path", &self.store.path())
            .finish_non_exhaustive()
    }
}

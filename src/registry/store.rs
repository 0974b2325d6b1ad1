//! JSON file persistence for the registry.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::Registry;

/// Errors from reading or writing the registry document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access registry file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse registry file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Whole-document JSON storage.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the registry, falling back to an empty one.
    ///
    /// A missing file is normal on first start. An unreadable or malformed
    /// document is logged and replaced by an empty registry on next save.
    #[must_use]
    pub fn load(&self) -> Registry {
        match self.load_strict() {
            Ok(mut registry) => {
                let repaired = registry.sanitize();
                if repaired > 0 {
                    warn!("Repaired {} inconsistent record(s) in {}", repaired, self.path.display());
                }
                info!("Loaded {} registered user(s) from {}", registry.len(), self.path.display());
                registry
            }
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No registry file at {}, starting empty", self.path.display());
                Registry::new()
            }
            Err(e) => {
                warn!("Ignoring registry file {}: {}", self.path.display(), e);
                Registry::new()
            }
        }
    }

    /// Loads the registry exactly as stored, without repairs or fallbacks.
    pub fn load_strict(&self) -> Result<Registry, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the whole registry to a temporary file, then renames it over
    /// the target.
    pub fn save(&self, registry: &Registry) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(registry)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::registry::Subject;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = RegistryStore::new(&path);

        for content in ["not json", "[1, 2, 3]", r#"{"users": {"abc": {}}}"#, r#"{"users": 5}"#] {
            fs::write(&path, content).unwrap();
            assert!(store.load().is_empty(), "{content} should load as empty");
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("nested/data.json"));
        let now = Utc::now();

        let mut registry = Registry::new();
        registry.register(10, now, 7);
        registry
            .user_mut(10)
            .unwrap()
            .add_watch(Subject::parse("alice").unwrap(), 20, now)
            .unwrap();
        registry.add_admin(99);

        store.save(&registry).unwrap();
        assert_eq!(store.load(), registry);
        assert!(!dir.path().join("nested/data.json.tmp").exists());
    }

    #[test]
    fn test_loads_legacy_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"{
                "users": {
                    "555": {"watch": ["Alice"], "ban": ["bob"], "confirm": {"alice": 0}, "expiry": "2099-01-01"}
                },
                "admins": [7]
            }"#,
        )
        .unwrap();

        let registry = RegistryStore::new(&path).load();
        let user = registry.user(555).unwrap();
        assert_eq!(user.watching(), &[Subject::parse("alice").unwrap()]);
        assert_eq!(user.banned(), &[Subject::parse("bob").unwrap()]);
        assert_eq!(registry.admins(), &[7]);
    }

    #[test]
    fn test_invalid_name_does_not_discard_other_users() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"{
                "users": {
                    "1": {"watch": ["alice"], "expiry": "2099-01-01"},
                    "2": {"watch": ["bob-smith", "dan"], "expiry": "2099-01-01"}
                },
                "admins": [9]
            }"#,
        )
        .unwrap();

        let store = RegistryStore::new(&path);
        let mut registry = store.load();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.user(1).unwrap().watching(), &[Subject::parse("alice").unwrap()]);
        assert_eq!(registry.user(2).unwrap().watching(), &[Subject::parse("dan").unwrap()]);
        assert_eq!(registry.admins(), &[9]);

        registry.register(3, Utc::now(), 7);
        store.save(&registry).unwrap();
        let reloaded = store.load();
        assert_eq!(reloaded.len(), 3);
        assert!(reloaded.user(1).is_ok());
        assert!(reloaded.user(2).unwrap().violations().is_empty());
    }
}

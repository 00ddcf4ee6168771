//! Flat Store Module
//!
//! String key-value stores used when native storage is unavailable or
//! failing.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::warn;

use crate::cache::FlatStore;
use crate::error::StoreError;

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Flat("store lock poisoned".to_string())
}

// == Memory Flat Store ==
/// Process-local flat store.
#[derive(Debug, Default)]
pub struct MemoryFlatStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryFlatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlatStore for MemoryFlatStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

// == File Flat Store ==
/// Flat store persisted as one JSON object, rewritten on every change.
///
/// With a quota set, a write that would grow the serialized object past it
/// is rejected and leaves the store unchanged.
#[derive(Debug)]
pub struct FileFlatStore {
    path: PathBuf,
    quota: Option<usize>,
    entries: RwLock<HashMap<String, String>>,
}

impl FileFlatStore {
    /// Opens the store at `path`, loading any existing contents.
    ///
    /// An unreadable or corrupt file starts the store empty; it is
    /// overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Flat cache file unreadable, starting empty");
                HashMap::new()
            }
        };

        Self {
            path,
            quota: None,
            entries: RwLock::new(entries),
        }
    }

    /// Limits the serialized size of the store in bytes.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    fn load(path: &Path) -> Result<HashMap<String, String>, StoreError> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(entries)?;
        if let Some(quota) = self.quota {
            if serialized.len() > quota {
                return Err(StoreError::QuotaExceeded {
                    needed: serialized.len(),
                    quota,
                });
            }
        }
        fs::write(&self.path, serialized)?;
        Ok(())
    }
}

impl FlatStore for FileFlatStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let previous = entries.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&entries) {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

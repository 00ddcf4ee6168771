//! Cache Backend Module
//!
//! Storage capabilities the tiered cache is built from, and the one-time
//! platform detection that picks them.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use crate::cache::{CacheEntry, FileFlatStore, MemoryFlatStore, SqliteStore};
use crate::error::StoreError;

/// Database file created inside the data directory.
pub const NATIVE_DB_FILE: &str = "chat_cache.db";

/// Flat store file created inside the data directory.
pub const FLAT_STORE_FILE: &str = "chat_cache.json";

// == Native Store ==
/// Structured storage with table semantics, present only on some platforms.
///
/// Every call either fully succeeds or returns an error; the cache treats
/// any error as a per-call reason to fall back.
#[async_trait]
pub trait NativeStore: Send + Sync {
    /// Opens the backing database and creates the `kv_cache` table.
    ///
    /// Called once by the readiness probe. Must be safe to call on an
    /// already open store.
    async fn open(&self) -> Result<(), StoreError>;

    /// Reads one entry.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Inserts or replaces one entry in a single statement.
    async fn upsert(&self, key: &str, value: &str, timestamp: i64) -> Result<(), StoreError>;

    /// Deletes one entry. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists `(key, timestamp)` for every key starting with `prefix`.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, StoreError>;
}

// == Flat Store ==
/// Always-available string key-value store with exact-key lookups only.
///
/// Calls are synchronous; there is no suspension point on this path.
pub trait FlatStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// == Ready Signal ==
/// Platform signal that native storage may now be used.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Fires the paired [`ReadySignal`].
#[derive(Debug)]
pub struct ReadyTrigger {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    /// A signal that is already fired.
    pub fn ready() -> Self {
        Self { rx: None }
    }

    /// A signal fired later by the platform through the returned trigger.
    pub fn channel() -> (ReadyTrigger, ReadySignal) {
        let (tx, rx) = watch::channel(false);
        (ReadyTrigger { tx }, ReadySignal { rx: Some(rx) })
    }

    /// Waits up to `timeout` for the signal.
    ///
    /// Returns `false` when the wait timed out or the trigger was dropped
    /// without firing; callers proceed either way.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let Some(rx) = &self.rx else {
            return true;
        };
        let mut rx = rx.clone();
        let fired = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|fired| *fired)).await,
            Ok(Ok(_))
        );
        fired
    }
}

impl ReadyTrigger {
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }
}

// == Cache Backends ==
/// The storage capabilities handed to a cache at construction.
#[derive(Clone)]
pub struct CacheBackends {
    pub(crate) native: Option<Arc<dyn NativeStore>>,
    pub(crate) flat: Arc<dyn FlatStore>,
    pub(crate) ready: ReadySignal,
}

impl CacheBackends {
    /// Flat storage only; the cache never leaves NativeUnavailable.
    pub fn flat_only(flat: impl FlatStore + 'static) -> Self {
        Self {
            native: None,
            flat: Arc::new(flat),
            ready: ReadySignal::ready(),
        }
    }

    /// Native storage preferred, flat storage as fallback.
    pub fn with_native(native: impl NativeStore + 'static, flat: impl FlatStore + 'static) -> Self {
        Self {
            native: Some(Arc::new(native)),
            flat: Arc::new(flat),
            ready: ReadySignal::ready(),
        }
    }

    /// Replaces the ready signal the probe waits for.
    pub fn with_ready_signal(mut self, ready: ReadySignal) -> Self {
        self.ready = ready;
        self
    }

    // == Detect ==
    /// Platform detection, performed once at startup.
    ///
    /// A usable `data_dir` provides both a SQLite database and a file-backed
    /// flat store inside it. Without one, the cache keeps values in memory.
    pub fn detect(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        if data_dir.is_dir() {
            info!(data_dir = %data_dir.display(), "Native cache storage detected");
            Self::with_native(
                SqliteStore::new(data_dir.join(NATIVE_DB_FILE)),
                FileFlatStore::open(data_dir.join(FLAT_STORE_FILE)),
            )
        } else {
            info!(data_dir = %data_dir.display(), "No cache data directory, using in-memory flat store");
            Self::flat_only(MemoryFlatStore::new())
        }
    }

    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }
}

impl fmt::Debug for CacheBackends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBackends")
            .field("native", &self.native.is_some())
            .field("ready", &self.ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_signal_already_fired() {
        assert!(ReadySignal::ready().wait(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_ready_signal_fired_later() {
        let (trigger, signal) = ReadySignal::channel();
        let waiter = tokio::spawn(async move { signal.wait(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.fire();

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_ready_signal_times_out() {
        let (_trigger, signal) = ReadySignal::channel();
        assert!(!signal.wait(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_ready_signal_trigger_dropped() {
        let (trigger, signal) = ReadySignal::channel();
        drop(trigger);
        assert!(!signal.wait(Duration::from_secs(5)).await);
    }

    #[test]
    fn test_detect_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CacheBackends::detect(dir.path()).has_native());
    }

    #[test]
    fn test_detect_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!CacheBackends::detect(dir.path().join("missing")).has_native());
    }
}

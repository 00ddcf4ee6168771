//! Tiered Cache Module
//!
//! Key-value cache that prefers the native store, falls back to the flat
//! store per call, and prunes by prefix. No operation returns an error:
//! backend failures are logged, counted and turned into fallbacks or misses.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::entry::effective_timestamp;
use crate::cache::stats::CacheCounters;
use crate::cache::{CacheBackends, CacheEntry, CacheStats, NativeStore};
use crate::error::StoreError;

/// Longest wait for the platform ready signal before probing anyway.
pub const READY_TIMEOUT: Duration = Duration::from_millis(1500);

// == Tiered Cache ==
/// Asynchronous key-value cache over a native and a flat backend.
///
/// Native readiness is probed once per instance, on first use. Concurrent
/// first callers share the same probe.
#[derive(Debug)]
pub struct TieredCache {
    backends: CacheBackends,
    native_ready: OnceCell<bool>,
    counters: CacheCounters,
    ready_timeout: Duration,
}

impl TieredCache {
    // == Constructor ==
    pub fn new(backends: CacheBackends) -> Self {
        Self {
            backends,
            native_ready: OnceCell::new(),
            counters: CacheCounters::default(),
            ready_timeout: READY_TIMEOUT,
        }
    }

    /// Overrides how long the probe waits for the ready signal.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    // == Init ==
    /// Runs the readiness probe, or awaits the one already running.
    ///
    /// Returns whether the native store is ready. The outcome is fixed for
    /// the lifetime of this cache.
    pub async fn init(&self) -> bool {
        *self.native_ready.get_or_init(|| self.probe()).await
    }

    pub async fn is_backend_available(&self) -> bool {
        self.init().await
    }

    async fn probe(&self) -> bool {
        if !self.backends.ready.wait(self.ready_timeout).await {
            debug!(timeout_ms = self.ready_timeout.as_millis() as u64, "Ready signal not received, probing anyway");
        }

        let Some(native) = &self.backends.native else {
            info!("Native cache storage unavailable, using flat store");
            return false;
        };

        match native.open().await {
            Ok(()) => {
                info!("Native cache storage ready");
                true
            }
            Err(e) => {
                warn!(error = %e, "Native cache storage failed to open, using flat store");
                self.counters.record_native_failure();
                false
            }
        }
    }

    async fn native(&self) -> Option<&Arc<dyn NativeStore>> {
        if self.init().await {
            self.backends.native.as_ref()
        } else {
            None
        }
    }

    // == Get ==
    /// Returns the entry for `key`, or `None` when it is missing, the key is
    /// empty, or every reachable backend failed.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        if key.is_empty() {
            return None;
        }

        let entry = match self.native().await {
            Some(native) => match native.get(key).await {
                Ok(Some(entry)) => Some(entry),
                Ok(None) => self.flat_get(key),
                Err(e) => {
                    self.native_failed("get", key, &e);
                    self.flat_get(key)
                }
            },
            None => self.flat_get(key),
        };

        if entry.is_some() {
            self.counters.record_hit();
        } else {
            self.counters.record_miss();
        }
        entry
    }

    /// Reads `key` and decodes its value as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.get(key).await?;
        match serde_json::from_str(&entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Cached value is not valid JSON");
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// `timestamp` defaults to now when `None` or zero.
    pub async fn set(&self, key: &str, value: &str, timestamp: Option<i64>) {
        if key.is_empty() {
            return;
        }
        let timestamp = effective_timestamp(timestamp);

        if let Some(native) = self.native().await {
            match native.upsert(key, value, timestamp).await {
                Ok(()) => {
                    self.drop_flat_copy(key);
                    return;
                }
                Err(e) => self.native_failed("set", key, &e),
            }
        }

        if let Err(e) = self.backends.flat.set(key, value) {
            self.flat_failed("set", key, &e);
        }
    }

    /// Serializes `value` as JSON and stores it.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, timestamp: Option<i64>) {
        match serde_json::to_string(value) {
            Ok(serialized) => self.set(key, &serialized, timestamp).await,
            Err(e) => warn!(key, error = %e, "Value not serializable, not cached"),
        }
    }

    // == Remove ==
    /// Deletes `key` from every reachable backend.
    pub async fn remove(&self, key: &str) {
        if key.is_empty() {
            return;
        }

        if let Some(native) = self.native().await {
            if let Err(e) = native.delete(key).await {
                warn!(key, error = %e, "Native cache remove failed");
                self.counters.record_native_failure();
            }
        }

        if let Err(e) = self.backends.flat.remove(key) {
            self.flat_failed("remove", key, &e);
        }
    }

    // == Prune Prefix ==
    /// Keeps only the `max_entries` newest entries whose key starts with
    /// `prefix` and deletes the rest.
    ///
    /// Runs against the native store only; a flat-only cache is never
    /// pruned. Ties on timestamp keep the lexically smaller key.
    pub async fn prune_prefix(&self, prefix: &str, max_entries: usize) {
        if prefix.is_empty() || max_entries == 0 {
            return;
        }

        let Some(native) = self.native().await else {
            debug!(prefix, "Native cache storage unavailable, skipping prune");
            return;
        };

        let mut entries = match native.list_prefix(prefix).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(prefix, error = %e, "Native cache listing failed, skipping prune");
                self.counters.record_native_failure();
                return;
            }
        };

        if entries.len() <= max_entries {
            return;
        }

        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut removed = 0;
        for (key, _) in entries.into_iter().skip(max_entries) {
            match native.delete(&key).await {
                Ok(()) => {
                    self.drop_flat_copy(&key);
                    removed += 1;
                }
                Err(e) => {
                    warn!(key, error = %e, "Native cache prune delete failed");
                    self.counters.record_native_failure();
                }
            }
        }

        self.counters.record_pruned(removed);
        debug!(prefix, removed, kept = max_entries, "Pruned cache prefix");
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    fn flat_get(&self, key: &str) -> Option<CacheEntry> {
        match self.backends.flat.get(key) {
            Ok(value) => value.map(CacheEntry::from_flat),
            Err(e) => {
                self.flat_failed("get", key, &e);
                None
            }
        }
    }

    /// Removes a value left in the flat store by an earlier fallback write,
    /// so a native miss cannot resurface it.
    fn drop_flat_copy(&self, key: &str) {
        if let Err(e) = self.backends.flat.remove(key) {
            self.flat_failed("remove", key, &e);
        }
    }

    fn native_failed(&self, op: &str, key: &str, err: &StoreError) {
        warn!(op, key, error = %err, "Native cache call failed, falling back to flat store");
        self.counters.record_native_failure();
        self.counters.record_fallback();
    }

    fn flat_failed(&self, op: &str, key: &str, err: &StoreError) {
        warn!(op, key, error = %err, "Flat cache call failed");
        self.counters.record_flat_failure();
    }
}

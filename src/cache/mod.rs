//! Cache Module
//!
//! Tiered key-value cache for the chat client: a native SQLite table when
//! the platform provides one, a flat string store otherwise, with per-call
//! fallback and prefix pruning.

mod backend;
mod entry;
mod flat;
mod sqlite;
mod stats;
mod store;


// Re-export public types
pub use backend::{
    CacheBackends, FlatStore, NativeStore, ReadySignal, ReadyTrigger, FLAT_STORE_FILE,
    NATIVE_DB_FILE,
};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use flat::{FileFlatStore, MemoryFlatStore};
pub use sqlite::SqliteStore;
pub use stats::CacheStats;
pub use store::{TieredCache, READY_TIMEOUT};

//! Cache Entry Module
//!
//! Defines the value/timestamp pair returned by cache reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON fields inspected, in order, when recovering a timestamp from a
/// flat-store value.
const EMBEDDED_TIME_FIELDS: [&str; 3] = ["t", "ts", "timestamp"];

// == Cache Entry ==
/// A stored value together with its write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value
    pub value: String,
    /// Write time (Unix milliseconds)
    pub timestamp: i64,
}

impl CacheEntry {
    /// Creates an entry with an explicit timestamp.
    pub fn new(value: impl Into<String>, timestamp: i64) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }

    // == From Flat Value ==
    /// Rebuilds an entry from a flat-store value, which carries no
    /// timestamp column.
    ///
    /// The timestamp is read from a numeric `t`, `ts` or `timestamp` field
    /// when the value is a JSON object, and is 0 otherwise.
    pub fn from_flat(value: String) -> Self {
        let timestamp = embedded_timestamp(&value).unwrap_or(0);
        Self { value, timestamp }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Resolves a caller-supplied timestamp: `None` and `0` both mean "now".
pub fn effective_timestamp(timestamp: Option<i64>) -> i64 {
    match timestamp {
        Some(ts) if ts != 0 => ts,
        _ => current_timestamp_ms(),
    }
}

fn embedded_timestamp(value: &str) -> Option<i64> {
    let parsed: Value = serde_json::from_str(value).ok()?;
    let object = parsed.as_object()?;

    EMBEDDED_TIME_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .find_map(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
}

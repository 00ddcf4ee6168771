//! SQLite Store Module
//!
//! Native cache backend: a single `kv_cache` table accessed through
//! tokio-rusqlite, which runs statements on a background thread.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use tokio_rusqlite::{params, Connection};
use tracing::debug;

use crate::cache::{CacheEntry, NativeStore};
use crate::error::StoreError;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv_cache (
        k TEXT PRIMARY KEY,
        v TEXT,
        t INTEGER
    )";

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

// == SQLite Store ==
/// SQLite-backed [`NativeStore`].
///
/// The connection is opened by [`NativeStore::open`]; every other call
/// fails with [`StoreError::NotOpen`] until then.
#[derive(Debug)]
pub struct SqliteStore {
    location: Location,
    conn: OnceCell<Connection>,
}

impl SqliteStore {
    /// A store backed by the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            conn: OnceCell::new(),
        }
    }

    /// A store backed by a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: OnceCell::new(),
        }
    }

    async fn connect(&self) -> Result<Connection, StoreError> {
        let conn = match &self.location {
            Location::File(path) => Connection::open(path).await,
            Location::Memory => Connection::open_in_memory().await,
        }
        .map_err(|e| StoreError::Native(e.to_string()))?;

        conn.call(|conn| conn.execute_batch(PRAGMAS)).await?;
        debug!(location = ?self.location, "SQLite cache connection opened");
        Ok(conn)
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.get().ok_or(StoreError::NotOpen)
    }

    /// Runs raw SQL against the open database.
    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<(), StoreError> {
        self.conn()?.call(move |conn| conn.execute_batch(sql)).await?;
        Ok(())
    }
}

#[async_trait]
impl NativeStore for SqliteStore {
    async fn open(&self) -> Result<(), StoreError> {
        let conn = self.conn.get_or_try_init(|| self.connect()).await?;
        conn.call(|conn| conn.execute_batch(CREATE_TABLE)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let key = key.to_string();
        let entry = self
            .conn()?
            .call(move |conn| {
                conn.query_row(
                    "SELECT v, t FROM kv_cache WHERE k = ?1",
                    params![key],
                    |row| {
                        Ok(CacheEntry {
                            value: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                            timestamp: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                        })
                    },
                )
                .optional()
            })
            .await?;
        Ok(entry)
    }

    async fn upsert(&self, key: &str, value: &str, timestamp: i64) -> Result<(), StoreError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.conn()?
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO kv_cache (k, v, t) VALUES (?1, ?2, ?3)",
                    params![key, value, timestamp],
                )
            })
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.conn()?
            .call(move |conn| conn.execute("DELETE FROM kv_cache WHERE k = ?1", params![key]))
            .await?;
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, StoreError> {
        let prefix = prefix.to_string();
        let entries = self
            .conn()?
            .call(move |conn| -> Result<Vec<(String, i64)>, rusqlite::Error> {
                let mut stmt =
                    conn.prepare("SELECT k, t FROM kv_cache WHERE substr(k, 1, length(?1)) = ?1")?;
                let rows = stmt.query_map(params![prefix], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0)))
                })?;
                let entries = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }
}

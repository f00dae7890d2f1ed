//! Module snapshot cache.
//!
//! At most one entry per module id; entries are evicted by age,
//! independently of the HTTP cache buckets.

use super::connection::Store;
use crate::Error;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached snapshot of a training module's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCacheEntry {
    pub module_id: String,
    pub payload: serde_json::Value,
    pub cached_at: String,
}

impl Store {
    /// Insert or replace the snapshot for a module.
    pub async fn put_module(&self, module_id: &str, payload: &serde_json::Value) -> Result<(), Error> {
        self.put_module_at(module_id, payload, Utc::now()).await
    }

    /// Upsert with an explicit cache time, for snapshots restored from elsewhere.
    pub async fn put_module_at(
        &self, module_id: &str, payload: &serde_json::Value, cached_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let module_id = module_id.to_string();
        let payload_json = serde_json::to_string(payload)?;
        let cached_at = super::timestamp(cached_at);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO module_cache (module_id, payload_json, cached_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(module_id) DO UPDATE SET
                        payload_json = excluded.payload_json,
                        cached_at = excluded.cached_at",
                    params![module_id, payload_json, cached_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the snapshot for a module.
    ///
    /// Returns None if the module isn't cached.
    pub async fn get_module(&self, module_id: &str) -> Result<Option<ModuleCacheEntry>, Error> {
        let module_id = module_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ModuleCacheEntry>, Error> {
                let result = conn.query_row(
                    "SELECT module_id, payload_json, cached_at FROM module_cache WHERE module_id = ?1",
                    params![module_id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
                );

                match result {
                    Ok((module_id, payload_json, cached_at)) => Ok(Some(ModuleCacheEntry {
                        module_id,
                        payload: serde_json::from_str(&payload_json)?,
                        cached_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    pub async fn delete_module(&self, module_id: &str) -> Result<bool, Error> {
        let module_id = module_id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                Ok(conn.execute("DELETE FROM module_cache WHERE module_id = ?1", params![module_id])? > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete snapshots cached longer ago than `max_age`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_stale_modules(&self, max_age: Duration) -> Result<u64, Error> {
        let cutoff = super::timestamp(Utc::now() - max_age);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM module_cache WHERE cached_at < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn module_count(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM module_cache", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }
}

//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use super::migrations::{self, Migration, STORE_MIGRATIONS};
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

/// Structured local store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Clones share the same connection.
#[derive(Clone, Debug)]
pub struct Store {
    pub(crate) conn: Connection,
}

/// Apply pragmas and bring the schema up to date.
pub(crate) async fn prepare(conn: &Connection, migrations: &'static [Migration]) -> Result<(), Error> {
    conn.call(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA foreign_keys=ON;",
        )?;
        Ok(())
    })
    .await
    .map_err(Error::Database)?;

    migrations::run(conn, migrations).await
}

impl Store {
    /// Open a store at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and upgrades the schema if it was written by an older version.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        prepare(&conn, STORE_MIGRATIONS).await?;
        Ok(Self { conn })
    }

    /// Open an in-memory store for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        prepare(&conn, STORE_MIGRATIONS).await?;
        Ok(Self { conn })
    }

    /// Close the underlying connection.
    ///
    /// Other clones of this store fail with a database error afterwards.
    pub async fn close(self) -> Result<(), Error> {
        self.conn.close().await.map_err(Error::from)
    }

    /// Current schema version recorded in the store.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }

    /// Truncate the cache-type collections (module snapshots and pending actions).
    ///
    /// User-authored collections are left untouched. Returns the number of
    /// deleted rows.
    pub async fn clear_cache_collections(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let modules = tx.execute("DELETE FROM module_cache", [])?;
                let actions = tx.execute("DELETE FROM pending_actions", [])?;
                tx.commit()?;
                Ok((modules + actions) as u64)
            })
            .await
            .map_err(Error::from)
    }
}

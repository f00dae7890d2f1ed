//! Bucket storage operations.
//!
//! The bucket manager exclusively owns cached response bytes. Other
//! components read and write buckets only through these methods.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio_rusqlite::{Connection, params, rusqlite};

use super::{BucketName, RequestKey};
use crate::store::connection::prepare;
use crate::store::migrations::BUCKET_MIGRATIONS;
use crate::{Error, HeaderList};

/// A stored HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HeaderList,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    pub fn new(status: u16, headers: HeaderList, body: Vec<u8>) -> Self {
        Self { status, headers, body, stored_at: crate::store::now() }
    }
}

/// Handle to the named cache buckets.
///
/// `max_bytes` bounds the total body bytes stored across all buckets.
#[derive(Clone, Debug)]
pub struct BucketManager {
    conn: Connection,
    max_bytes: u64,
}

impl BucketManager {
    /// Open the bucket database at the specified path.
    pub async fn open(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        prepare(&conn, BUCKET_MIGRATIONS).await?;
        Ok(Self { conn, max_bytes })
    }

    /// Open an in-memory bucket database for testing.
    pub async fn open_in_memory(max_bytes: u64) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        prepare(&conn, BUCKET_MIGRATIONS).await?;
        Ok(Self { conn, max_bytes })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Create the bucket if it doesn't exist. Idempotent.
    pub async fn open_bucket(&self, name: &BucketName) -> Result<(), Error> {
        let name = name.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_bucket(conn, &name)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Exact-key lookup. A missing bucket reads as a miss.
    pub async fn match_entry(&self, name: &BucketName, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        let bucket = name.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let result = conn.query_row(
                    "SELECT status, headers_json, body, stored_at FROM bucket_entries
                     WHERE bucket = ?1 AND key_hash = ?2",
                    params![bucket, key_hash],
                    |row| {
                        Ok((
                            row.get::<_, u16>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                );

                match result {
                    Ok((status, headers_json, body, stored_at)) => Ok(Some(CachedResponse {
                        status,
                        headers: serde_json::from_str(&headers_json)?,
                        body,
                        stored_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response, overwriting any existing entry for the key.
    ///
    /// Creates the bucket on first write.
    ///
    /// # Errors
    ///
    /// Returns `Error::QuotaExceeded` if the write would push total stored
    /// bytes past `max_bytes`. Nothing is written in that case.
    pub async fn put(&self, name: &BucketName, key: &RequestKey, response: &CachedResponse) -> Result<(), Error> {
        let name = name.clone();
        let key = key.clone();
        let key_hash = key.hash();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();
        let limit = self.max_bytes;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_bucket(&tx, &name)?;

                let bucket = name.to_string();
                let existing: u64 = tx
                    .query_row(
                        "SELECT COALESCE(SUM(size), 0) FROM bucket_entries WHERE bucket = ?1 AND key_hash = ?2",
                        params![bucket, key_hash],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                let total: u64 = tx
                    .query_row("SELECT COALESCE(SUM(size), 0) FROM bucket_entries", [], |row| row.get(0))
                    .map_err(Error::from)?;

                let size = response.body.len() as u64;
                let needed = total - existing + size;
                if needed > limit {
                    return Err(Error::QuotaExceeded { bucket, needed, limit });
                }

                tx.execute(
                    "INSERT INTO bucket_entries (bucket, key_hash, method, url, status, headers_json, body, size, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(bucket, key_hash) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        size = excluded.size,
                        stored_at = excluded.stored_at",
                    params![
                        bucket,
                        key_hash,
                        key.method,
                        key.url,
                        response.status,
                        headers_json,
                        response.body,
                        size,
                        response.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a single entry. Returns false if it wasn't cached.
    pub async fn delete_entry(&self, name: &BucketName, key: &RequestKey) -> Result<bool, Error> {
        let bucket = name.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM bucket_entries WHERE bucket = ?1 AND key_hash = ?2",
                    params![bucket, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every bucket whose name is not in `keep`.
    ///
    /// Returns the deleted bucket names, sorted.
    pub async fn delete_buckets_not_in(&self, keep: &[BucketName]) -> Result<Vec<String>, Error> {
        let keep: HashSet<String> = keep.iter().map(ToString::to_string).collect();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                let names = {
                    let mut stmt = tx.prepare("SELECT name FROM buckets ORDER BY name")?;
                    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                    rows.collect::<Result<Vec<_>, _>>()?
                };

                let mut deleted = Vec::new();
                for name in names.into_iter().filter(|n| !keep.contains(n)) {
                    tx.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                    deleted.push(name);
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every bucket. Returns the number deleted.
    pub async fn delete_all(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> { Ok(conn.execute("DELETE FROM buckets", [])? as u64) })
            .await
            .map_err(Error::from)
    }

    /// Names of all existing buckets, sorted by name.
    pub async fn bucket_names(&self) -> Result<Vec<BucketName>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<BucketName>, Error> {
                let mut stmt = conn.prepare("SELECT purpose, version FROM buckets ORDER BY name")?;
                let mut rows = stmt.query([])?;
                let mut names = Vec::new();
                while let Some(row) = rows.next()? {
                    let purpose: String = row.get(0)?;
                    names.push(BucketName::new(purpose.parse()?, row.get::<_, String>(1)?));
                }
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Request keys cached in a bucket, sorted by URL.
    pub async fn keys(&self, name: &BucketName) -> Result<Vec<RequestKey>, Error> {
        let bucket = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM bucket_entries WHERE bucket = ?1 ORDER BY url")?;
                let keys = stmt
                    .query_map(params![bucket], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Total body bytes stored across all buckets.
    pub async fn usage_bytes(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COALESCE(SUM(size), 0) FROM bucket_entries", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }
}

fn ensure_bucket(conn: &rusqlite::Connection, name: &BucketName) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO buckets (name, purpose, version, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name.to_string(), name.purpose.as_str(), name.version, crate::store::now()],
    )?;
    Ok(())
}

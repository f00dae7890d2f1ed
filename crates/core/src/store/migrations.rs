//! Database schema migrations.
//!
//! Uses a simple version table approach to track applied migrations.
//! Each migration is a SQL batch that transforms the schema. The store and
//! the bucket manager keep separate migration lists so that a failed upgrade
//! only takes down the database it belongs to.

use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::{Connection, params};

/// A migration: (version, SQL).
pub type Migration = (&'static str, &'static str);

/// Structured store migrations.
///
/// Migrations must be applied in order. The version number is an
/// incrementing integer used to track which migrations have been applied.
/// All migrations are idempotent using CREATE IF NOT EXISTS.
pub const STORE_MIGRATIONS: &[Migration] = &[
    ("1", include_str!("../../migrations/001_user_records.sql")),
    ("2", include_str!("../../migrations/002_offline_cache.sql")),
];

/// Cache bucket migrations.
pub const BUCKET_MIGRATIONS: &[Migration] = &[("1", include_str!("../../migrations/buckets/001_buckets.sql"))];

/// Latest schema version in a migration list.
pub fn latest_version(migrations: &[Migration]) -> Result<i64, Error> {
    migrations.iter().try_fold(0, |max, (version, _)| {
        let v: i64 = version
            .parse()
            .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
        Ok(max.max(v))
    })
}

/// Run any pending migrations.
///
/// This creates the _migrations table if it doesn't exist, checks the
/// current version, and applies any migrations that haven't been run yet.
/// Each migration runs in its own transaction.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` if the database was written by a newer
/// schema than this build knows, and a database error if a migration SQL
/// fails to execute.
pub async fn run(conn: &Connection, migrations: &'static [Migration]) -> Result<(), Error> {
    let latest = latest_version(migrations)?;

    conn.call(move |conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(Error::from)?;

        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })
            .map_err(Error::from)?;

        if current > latest {
            return Err(Error::MigrationFailed(format!(
                "schema version {current} is newer than supported version {latest}"
            )));
        }

        for (version, sql) in migrations {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
            if version_num > current {
                tracing::info!(version = version_num, "applying schema migration");
                let tx = conn.transaction()?;
                tx.execute_batch(sql)
                    .map_err(|e| Error::MigrationFailed(format!("version {version_num}: {e}")))?;
                tx.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version_num, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
                tx.commit()?;
            }
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

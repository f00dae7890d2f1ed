//! Opens the store and bucket databases independently.
//!
//! A database whose schema upgrade fails is replaced by an in-memory one,
//! so the other database and the channel keep working. Anything other than
//! a failed upgrade is still fatal.

use std::path::Path;

use tether_core::{AppConfig, BucketManager, Error, Store};

pub struct Storage {
    pub store: Store,
    pub buckets: BucketManager,
    /// Databases running in memory because their upgrade failed.
    pub degraded: Vec<&'static str>,
}

pub async fn open(config: &AppConfig) -> Result<Storage, Error> {
    let mut degraded = Vec::new();

    let store = match Store::open(&config.db_path).await {
        Ok(store) => store,
        Err(e @ Error::MigrationFailed(_)) => {
            upgrade_failed("store", &config.db_path, &e);
            degraded.push("store");
            Store::open_in_memory().await?
        }
        Err(e) => return Err(e),
    };

    let buckets = match BucketManager::open(&config.cache_db_path, config.max_cache_bytes).await {
        Ok(buckets) => buckets,
        Err(e @ Error::MigrationFailed(_)) => {
            upgrade_failed("buckets", &config.cache_db_path, &e);
            degraded.push("buckets");
            BucketManager::open_in_memory(config.max_cache_bytes).await?
        }
        Err(e) => return Err(e),
    };

    Ok(Storage { store, buckets, degraded })
}

fn upgrade_failed(database: &str, path: &Path, err: &Error) {
    tracing::error!(
        database,
        path = %path.display(),
        error = %err,
        "schema upgrade failed, continuing with an in-memory database"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::store::NewPendingAction;
    use tether_core::{BucketName, Purpose};

    fn config(dir: &Path) -> AppConfig {
        AppConfig {
            db_path: dir.join("store.sqlite"),
            cache_db_path: dir.join("cache.sqlite"),
            ..Default::default()
        }
    }

    /// Leave a database that claims a schema version no build knows yet.
    async fn write_future_schema(path: &Path) {
        let conn = tokio_rusqlite::Connection::open(path).await.unwrap();
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE _migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);
                 INSERT INTO _migrations (version, applied_at) VALUES (99, 'later');",
            )
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_open_both_databases() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&config(dir.path())).await.unwrap();

        assert!(storage.degraded.is_empty());
        assert_eq!(storage.store.schema_version().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_store_upgrade_keeps_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_future_schema(&config.db_path).await;

        let storage = open(&config).await.unwrap();

        assert_eq!(storage.degraded, vec!["store"]);
        let action = NewPendingAction {
            url: "https://app.example.com/api/notes".into(),
            method: "POST".into(),
            headers: Vec::new(),
            body: None,
        };
        storage.store.enqueue_action(&action).await.unwrap();

        let bucket = BucketName::new(Purpose::Static, "v1");
        storage.buckets.open_bucket(&bucket).await.unwrap();
        let reopened = BucketManager::open(&config.cache_db_path, config.max_cache_bytes).await.unwrap();
        assert_eq!(reopened.bucket_names().await.unwrap(), vec![bucket]);
    }

    #[tokio::test]
    async fn test_failed_bucket_upgrade_keeps_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_future_schema(&config.cache_db_path).await;

        let storage = open(&config).await.unwrap();

        assert_eq!(storage.degraded, vec!["buckets"]);
        assert!(storage.buckets.bucket_names().await.unwrap().is_empty());
        assert_eq!(storage.store.schema_version().await.unwrap(), 2);
    }
}

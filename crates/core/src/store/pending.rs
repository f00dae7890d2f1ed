//! Durable FIFO of mutating requests awaiting replay.
//!
//! Actions are immutable once enqueued. The only mutation is deletion,
//! after a successful replay or an explicit discard. Replay order is
//! ascending id.

use super::connection::Store;
use crate::{Error, HeaderList};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::Row;

/// A queued mutating request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: i64,
    pub url: String,
    pub method: String,
    pub headers: HeaderList,
    pub body: Option<Vec<u8>>,
    pub enqueued_at: String,
}

/// A request captured for later delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPendingAction {
    pub url: String,
    pub method: String,
    pub headers: HeaderList,
    pub body: Option<Vec<u8>>,
}

fn action_from_row(row: &Row<'_>) -> Result<PendingAction, Error> {
    let headers_json: String = row.get(3)?;
    Ok(PendingAction {
        id: row.get(0)?,
        url: row.get(1)?,
        method: row.get(2)?,
        headers: serde_json::from_str(&headers_json)?,
        body: row.get(4)?,
        enqueued_at: row.get(5)?,
    })
}

impl Store {
    /// Persist a captured request and return its generated id.
    pub async fn enqueue_action(&self, action: &NewPendingAction) -> Result<i64, Error> {
        let headers_json = serde_json::to_string(&action.headers)?;
        let action = action.clone();
        let enqueued_at = super::now();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO pending_actions (url, method, headers_json, body, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![action.url, action.method, headers_json, action.body, enqueued_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Snapshot of every queued action in replay order.
    pub async fn pending_actions(&self) -> Result<Vec<PendingAction>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PendingAction>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, url, method, headers_json, body, timestamp FROM pending_actions ORDER BY id ASC",
                )?;
                let mut rows = stmt.query([])?;
                let mut actions = Vec::new();
                while let Some(row) = rows.next()? {
                    actions.push(action_from_row(row)?);
                }
                Ok(actions)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove an action after successful replay or explicit discard.
    ///
    /// Returns false if it was already gone.
    pub async fn delete_action(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                Ok(conn.execute("DELETE FROM pending_actions WHERE id = ?1", params![id])? > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn pending_count(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM pending_actions", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }

    /// Discard every queued action. Returns the number discarded.
    pub async fn clear_pending_actions(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> { Ok(conn.execute("DELETE FROM pending_actions", [])? as u64) })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(path: &str) -> NewPendingAction {
        NewPendingAction {
            url: format!("https://app.example.com{path}"),
            method: "POST".to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(br#"{"ok":true}"#.to_vec()),
        }
    }

    #[tokio::test]
    async fn test_enqueue_preserves_fields() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store.enqueue_action(&action("/api/notes")).await.unwrap();

        let actions = store.pending_actions().await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, id);
        assert_eq!(actions[0].method, "POST");
        assert_eq!(actions[0].headers[0].1, "application/json");
        assert_eq!(actions[0].body.as_deref(), Some(br#"{"ok":true}"#.as_slice()));
    }

    #[tokio::test]
    async fn test_order_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");

        let store = Store::open(&path).await.unwrap();
        for path in ["/api/a", "/api/b", "/api/c"] {
            store.enqueue_action(&action(path)).await.unwrap();
        }
        store.close().await.unwrap();

        let reopened = Store::open(&path).await.unwrap();
        let urls: Vec<String> = reopened
            .pending_actions()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://app.example.com/api/a",
                "https://app.example.com/api/b",
                "https://app.example.com/api/c"
            ]
        );
    }

    #[tokio::test]
    async fn test_ids_stay_monotonic_after_delete() {
        let store = Store::open_in_memory().await.unwrap();
        let a = store.enqueue_action(&action("/api/a")).await.unwrap();
        assert!(store.delete_action(a).await.unwrap());
        let b = store.enqueue_action(&action("/api/b")).await.unwrap();
        assert!(b > a);
        assert!(!store.delete_action(a).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_cache_collections_keeps_user_records() {
        let store = Store::open_in_memory().await.unwrap();
        store.enqueue_action(&action("/api/a")).await.unwrap();
        store.put_module("m1", &serde_json::json!({})).await.unwrap();
        store
            .add_note(&crate::store::NewNote { module_id: "m1".into(), submodule_id: None, content: "keep".into() })
            .await
            .unwrap();

        let deleted = store.clear_cache_collections().await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.pending_count().await.unwrap(), 0);
        assert_eq!(store.module_count().await.unwrap(), 0);
        assert_eq!(store.note_count().await.unwrap(), 1);
    }
}

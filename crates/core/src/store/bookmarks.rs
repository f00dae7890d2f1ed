//! Bookmark CRUD operations.

use super::connection::Store;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub module_id: String,
    pub submodule_id: Option<String>,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBookmark {
    pub module_id: String,
    pub submodule_id: Option<String>,
    pub title: String,
}

impl Store {
    /// Insert a bookmark and return its generated id.
    pub async fn add_bookmark(&self, bookmark: &NewBookmark) -> Result<i64, Error> {
        let bookmark = bookmark.clone();
        let created_at = super::now();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO bookmarks (module_id, submodule_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![bookmark.module_id, bookmark.submodule_id, bookmark.title, created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Bookmarks for a module, or for one of its submodules when `submodule_id` is given.
    pub async fn bookmarks_for(&self, module_id: &str, submodule_id: Option<&str>) -> Result<Vec<Bookmark>, Error> {
        let module_id = module_id.to_string();
        let submodule_id = submodule_id.map(String::from);
        self.conn
            .call(move |conn| -> Result<Vec<Bookmark>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, module_id, submodule_id, title, created_at FROM bookmarks
                     WHERE module_id = ?1 AND (?2 IS NULL OR submodule_id = ?2)
                     ORDER BY id",
                )?;
                let bookmarks = stmt
                    .query_map(params![module_id, submodule_id], |row| {
                        Ok(Bookmark {
                            id: row.get(0)?,
                            module_id: row.get(1)?,
                            submodule_id: row.get(2)?,
                            title: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(bookmarks)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bookmark. Returns false if it did not exist.
    pub async fn delete_bookmark(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                Ok(conn.execute("DELETE FROM bookmarks WHERE id = ?1", params![id])? > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn bookmark_count(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM bookmarks", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bookmarks_by_module_and_submodule() {
        let store = Store::open_in_memory().await.unwrap();
        for (sub, title) in [(Some("s1"), "intro"), (Some("s2"), "deep dive"), (None, "overview")] {
            store
                .add_bookmark(&NewBookmark {
                    module_id: "m1".into(),
                    submodule_id: sub.map(String::from),
                    title: title.into(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.bookmarks_for("m1", None).await.unwrap().len(), 3);

        let s2 = store.bookmarks_for("m1", Some("s2")).await.unwrap();
        assert_eq!(s2.len(), 1);
        assert_eq!(s2[0].title, "deep dive");

        assert!(store.bookmarks_for("m2", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_bookmark() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .add_bookmark(&NewBookmark { module_id: "m1".into(), submodule_id: None, title: "x".into() })
            .await
            .unwrap();
        assert!(store.delete_bookmark(id).await.unwrap());
        assert_eq!(store.bookmark_count().await.unwrap(), 0);
    }
}

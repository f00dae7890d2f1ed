//! Note CRUD operations.

use super::connection::Store;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::Row;

/// A user note attached to a module (and optionally a submodule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub module_id: String,
    pub submodule_id: Option<String>,
    pub content: String,
    pub timestamp: String,
}

/// Fields supplied when creating a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNote {
    pub module_id: String,
    pub submodule_id: Option<String>,
    pub content: String,
}

fn note_from_row(row: &Row<'_>) -> tokio_rusqlite::rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        module_id: row.get(1)?,
        submodule_id: row.get(2)?,
        content: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

impl Store {
    /// Insert a note and return its generated id.
    pub async fn add_note(&self, note: &NewNote) -> Result<i64, Error> {
        let note = note.clone();
        let timestamp = super::now();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO notes (module_id, submodule_id, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    params![note.module_id, note.submodule_id, note.content, timestamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Notes for a module, oldest first.
    pub async fn notes_for_module(&self, module_id: &str) -> Result<Vec<Note>, Error> {
        self.query_notes(
            "SELECT id, module_id, submodule_id, content, timestamp
             FROM notes WHERE module_id = ?1 ORDER BY timestamp, id",
            module_id,
        )
        .await
    }

    /// Notes for a submodule, oldest first.
    pub async fn notes_for_submodule(&self, submodule_id: &str) -> Result<Vec<Note>, Error> {
        self.query_notes(
            "SELECT id, module_id, submodule_id, content, timestamp
             FROM notes WHERE submodule_id = ?1 ORDER BY timestamp, id",
            submodule_id,
        )
        .await
    }

    async fn query_notes(&self, sql: &'static str, key: &str) -> Result<Vec<Note>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<Note>, Error> {
                let mut stmt = conn.prepare(sql)?;
                let notes = stmt
                    .query_map(params![key], note_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(notes)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a note. Returns false if it did not exist.
    pub async fn delete_note(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Total number of notes.
    pub async fn note_count(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }
}

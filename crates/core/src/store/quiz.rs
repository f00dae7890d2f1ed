//! Quiz progress records.

use super::connection::Store;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::Row;

/// One recorded quiz attempt for a user on a submodule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizProgress {
    pub id: i64,
    pub submodule_id: String,
    pub user_id: String,
    pub score: f64,
    pub answers: serde_json::Value,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuizProgress {
    pub submodule_id: String,
    pub user_id: String,
    pub score: f64,
    pub answers: serde_json::Value,
}

fn progress_from_row(row: &Row<'_>) -> Result<QuizProgress, Error> {
    let answers_json: String = row.get(4)?;
    Ok(QuizProgress {
        id: row.get(0)?,
        submodule_id: row.get(1)?,
        user_id: row.get(2)?,
        score: row.get(3)?,
        answers: serde_json::from_str(&answers_json)?,
        recorded_at: row.get(5)?,
    })
}

impl Store {
    /// Record a quiz attempt and return its generated id.
    pub async fn record_quiz_progress(&self, progress: &NewQuizProgress) -> Result<i64, Error> {
        let answers_json = serde_json::to_string(&progress.answers)?;
        let progress = progress.clone();
        let recorded_at = super::now();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO quiz_progress (submodule_id, user_id, score, answers_json, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![progress.submodule_id, progress.user_id, progress.score, answers_json, recorded_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// All attempts by a user, oldest first.
    pub async fn quiz_progress_for_user(&self, user_id: &str) -> Result<Vec<QuizProgress>, Error> {
        self.query_progress(
            "SELECT id, submodule_id, user_id, score, answers_json, recorded_at
             FROM quiz_progress WHERE user_id = ?1 ORDER BY id",
            user_id,
        )
        .await
    }

    /// All attempts on a submodule, oldest first.
    pub async fn quiz_progress_for_submodule(&self, submodule_id: &str) -> Result<Vec<QuizProgress>, Error> {
        self.query_progress(
            "SELECT id, submodule_id, user_id, score, answers_json, recorded_at
             FROM quiz_progress WHERE submodule_id = ?1 ORDER BY id",
            submodule_id,
        )
        .await
    }

    async fn query_progress(&self, sql: &'static str, key: &str) -> Result<Vec<QuizProgress>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<QuizProgress>, Error> {
                let mut stmt = conn.prepare(sql)?;
                let mut rows = stmt.query(params![key])?;
                let mut progress = Vec::new();
                while let Some(row) = rows.next()? {
                    progress.push(progress_from_row(row)?);
                }
                Ok(progress)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn delete_quiz_progress(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                Ok(conn.execute("DELETE FROM quiz_progress WHERE id = ?1", params![id])? > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn quiz_progress_count(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM quiz_progress", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }
}

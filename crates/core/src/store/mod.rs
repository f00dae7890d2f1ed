//! SQLite-backed structured local store.
//!
//! Persists the records the UI reads directly, independent of the request
//! path, using SQLite with async access via tokio-rusqlite:
//!
//! - User-authored collections: notes, bookmarks, quiz progress
//! - Cache-type collections: module snapshots, pending actions
//! - Schema versioning with one-time upgrades on open
//!
//! The store is an explicit value: open it once and pass it (or a clone) to
//! every component that needs it.

pub mod bookmarks;
pub mod connection;
pub mod migrations;
pub mod modules;
pub mod notes;
pub mod pending;
pub mod quiz;

use chrono::{DateTime, SecondsFormat, Utc};

pub use crate::Error;

pub use bookmarks::{Bookmark, NewBookmark};
pub use connection::Store;
pub use modules::ModuleCacheEntry;
pub use notes::{NewNote, Note};
pub use pending::{NewPendingAction, PendingAction};
pub use quiz::{NewQuizProgress, QuizProgress};

/// Fixed-width RFC 3339 timestamp so stored values sort lexicographically.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    timestamp(Utc::now())
}

//! Unified error types for tether.
//!
//! Every variant renders with a stable code prefix so hosts can match on
//! [`Error::code`] without parsing messages.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the store, the bucket manager and the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a non-GET request key).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored record could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt record: {0}")]
    Serialization(String),

    /// Writing a cache entry would exceed the configured byte quota.
    #[error("QUOTA_EXCEEDED: bucket {bucket} needs {needed} bytes, limit is {limit}")]
    QuotaExceeded { bucket: String, needed: u64, limit: u64 },

    /// The network could not be reached and no cached fallback exists.
    #[error("OFFLINE: {0}")]
    Offline(String),

    /// The network could not be reached; the request was queued for replay.
    #[error("QUEUED: action {id} will be replayed later ({reason})")]
    Queued { id: i64, reason: String },

    /// A control message was rejected in the current lifecycle state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => "CACHE_ERROR",
            Error::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Error::Offline(_) => "OFFLINE",
            Error::Queued { .. } => "QUEUED",
            Error::InvalidState(_) => "INVALID_STATE",
        }
    }

    /// Whether this error means the network was unreachable.
    ///
    /// Queued mutations count as offline: the caller did not get a response.
    pub fn is_offline(&self) -> bool {
        matches!(self, Error::Offline(_) | Error::Queued { .. })
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Offline("https://example.com/api/x".to_string());
        assert!(err.to_string().contains("OFFLINE"));
        assert!(err.to_string().contains("/api/x"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::MigrationFailed("x".into()).code(), "CACHE_ERROR");
        assert_eq!(Error::QuotaExceeded { bucket: "static-v1".into(), needed: 10, limit: 5 }.code(), "QUOTA_EXCEEDED");
        assert_eq!(Error::Queued { id: 3, reason: "down".into() }.code(), "QUEUED");
    }

    #[test]
    fn test_queued_counts_as_offline() {
        assert!(Error::Queued { id: 1, reason: "down".into() }.is_offline());
        assert!(Error::Offline("down".into()).is_offline());
        assert!(!Error::InvalidInput("bad".into()).is_offline());
    }
}

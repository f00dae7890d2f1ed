//! Network adapter error types.

use std::sync::Arc;

/// Errors from the network adapter.
///
/// The engine treats every variant as "offline": the request never
/// produced a response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    /// The host reported no connectivity; no request was attempted.
    #[error("offline: host reports no connectivity")]
    HostOffline,

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Connection refused, DNS failure, reset, etc.
    #[error("network error: {0}")]
    Unreachable(Arc<reqwest::Error>),

    /// The request could not be built (bad header, unsupported method).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { NetworkError::Timeout } else { NetworkError::Unreachable(Arc::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(NetworkError::HostOffline.to_string().contains("offline"));
        assert!(NetworkError::InvalidRequest("bad header".into()).to_string().contains("bad header"));
    }
}

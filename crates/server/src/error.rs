//! Structured errors for the host channel.
//!
//! Every failure is reported back on the channel as a reply carrying a
//! stable code, mirroring the engine's error codes.

use serde::Serialize;

/// Failures while handling one channel line.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The line was not a recognized message.
    #[error("INVALID_INPUT: {0}")]
    InvalidMessage(String),

    /// The engine rejected or failed the request.
    #[error(transparent)]
    Engine(#[from] tether_core::Error),
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::InvalidMessage(err.to_string())
    }
}

/// Error payload written to the channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReply {
    pub code: &'static str,
    pub message: String,
}

impl From<HostError> for ErrorReply {
    fn from(err: HostError) -> Self {
        let code = match &err {
            HostError::InvalidMessage(_) => "INVALID_INPUT",
            HostError::Engine(e) => e.code(),
        };
        ErrorReply { code, message: err.to_string() }
    }
}

//! Observable events for failures the engine absorbs.
//!
//! Storage write failures never fail a request, but they are not silent
//! either: each one is logged and broadcast to any subscriber.

use serde::Serialize;
use tokio::sync::broadcast;

/// An absorbed failure or notable side effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A response could not be written to its bucket; the network response was still returned.
    CacheWriteDropped { bucket: String, url: String, reason: String },
    /// A mutating request was captured for later replay.
    RequestQueued { id: i64, method: String, url: String },
    /// Superseded buckets were deleted on activation.
    BucketsEvicted { names: Vec<String> },
    /// A resource could not be fetched while pre-warming.
    PrewarmFailed { url: String, reason: String },
}

/// Broadcast sink for [`Diagnostic`] events.
///
/// Cloning shares the channel. Emitting with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    tx: broadcast::Sender<Diagnostic>,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: Diagnostic) {
        match &event {
            Diagnostic::CacheWriteDropped { bucket, url, reason } => {
                tracing::warn!(%bucket, %url, %reason, "cache write dropped");
            }
            Diagnostic::RequestQueued { id, method, url } => {
                tracing::info!(id, %method, %url, "request queued for replay");
            }
            Diagnostic::BucketsEvicted { names } => {
                tracing::info!(count = names.len(), ?names, "evicted superseded buckets");
            }
            Diagnostic::PrewarmFailed { url, reason } => {
                tracing::warn!(%url, %reason, "prewarm fetch failed");
            }
        }
        let _ = self.tx.send(event);
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(64)
    }
}

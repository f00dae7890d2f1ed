//! Core types and shared functionality for tether.
//!
//! This crate provides:
//! - The structured local store (notes, bookmarks, quiz progress, module snapshots, pending actions)
//! - Versioned named cache buckets for HTTP responses
//! - Diagnostic events for absorbed failures
//! - Unified error types
//! - Configuration structures

pub mod buckets;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod store;

pub use buckets::{BucketManager, BucketName, CachedResponse, Purpose, RequestKey};
pub use config::AppConfig;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::Error;
pub use store::{PendingAction, Store};

/// Ordered list of HTTP header name/value pairs.
pub type HeaderList = Vec<(String, String)>;

//! Client-side engine for tether.
//!
//! This crate provides the network adapter, request classification and
//! caching strategies, the sync coordinator that replays queued mutations,
//! and the lifecycle manager that owns cache-version activation. The
//! [`Engine`] ties them together behind one control-message dispatcher.

pub mod classify;
pub mod connectivity;
pub mod engine;
pub mod fetch;
pub mod intercept;
pub mod lifecycle;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{Classifier, RequestClass, Strategy};
pub use connectivity::Connectivity;
pub use engine::{ControlMessage, ControlOutcome, Engine};
pub use fetch::{FetchClient, FetchConfig, HttpRequest, HttpResponse, Network, NetworkError, RequestMode};
pub use intercept::{InterceptOptions, Interceptor, ResponseSource, Served};
pub use lifecycle::{ClearReport, InstallReport, LifecycleManager, LifecycleState, PrewarmReport};
pub use sync::{ReplayOutcome, SyncCoordinator, SyncReport, SyncTrigger};

//! Replay of queued mutations.
//!
//! A pass reads a snapshot of the pending-action queue in id order and
//! re-sends each action exactly as captured. Actions answered with a 2xx
//! are dequeued; everything else stays queued for the next pass. Passes
//! never overlap, and actions enqueued while a pass runs wait for the next
//! one.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use tether_core::{Error, PendingAction, Store};
use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use url::Url;

use crate::connectivity::Connectivity;
use crate::fetch::{HttpRequest, HttpResponse, Network, NetworkError};

/// What started a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Connectivity came back.
    Reconnect,
    /// Explicit "sync now" from the UI.
    Manual,
    /// Timer while online.
    Periodic,
}

/// Result of replaying one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayOutcome {
    pub id: i64,
    pub success: bool,
    /// Response status, if the server answered.
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl ReplayOutcome {
    fn failed(id: i64, status: Option<u16>, error: impl Into<String>) -> Self {
        Self { id, success: false, status, error: Some(error.into()) }
    }
}

/// Summary of one pass, in replay order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    pub outcomes: Vec<ReplayOutcome>,
}

impl SyncReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct SyncCoordinator {
    store: Store,
    network: Arc<dyn Network>,
    connectivity: Connectivity,
    pass: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(store: Store, network: Arc<dyn Network>, connectivity: Connectivity) -> Self {
        Self { store, network, connectivity, pass: Mutex::new(()) }
    }

    /// Run one replay pass. Waits for any pass already in progress.
    pub async fn sync_now(&self, trigger: SyncTrigger) -> Result<SyncReport, Error> {
        let _pass = self.pass.lock().await;

        let actions = self.store.pending_actions().await?;
        tracing::info!(?trigger, pending = actions.len(), "sync pass started");

        let mut outcomes = Vec::with_capacity(actions.len());
        for action in &actions {
            outcomes.push(self.replay(action).await);
        }

        let report = SyncReport { trigger, outcomes };
        tracing::info!(?trigger, succeeded = report.succeeded(), failed = report.failed(), "sync pass finished");
        Ok(report)
    }

    /// Background loop: a Reconnect pass on every offline→online transition
    /// and, when `period` is set, a Periodic pass on each tick while online.
    ///
    /// Runs until the task is aborted.
    pub async fn run(self: Arc<Self>, period: Option<Duration>) {
        let mut online = self.connectivity.subscribe();
        let mut was_online = *online.borrow_and_update();
        let mut ticker = period.map(|p| {
            let mut ticker = tokio::time::interval_at(Instant::now() + p, p);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    if now_online && !was_online {
                        self.run_pass(SyncTrigger::Reconnect).await;
                    }
                    was_online = now_online;
                }
                _ = tick(&mut ticker) => {
                    if self.connectivity.is_online() {
                        self.run_pass(SyncTrigger::Periodic).await;
                    }
                }
            }
        }
    }

    async fn run_pass(&self, trigger: SyncTrigger) {
        if let Err(e) = self.sync_now(trigger).await {
            tracing::error!(?trigger, error = %e, "sync pass failed");
        }
    }

    async fn replay(&self, action: &PendingAction) -> ReplayOutcome {
        let request = match to_request(action) {
            Ok(request) => request,
            Err(reason) => return ReplayOutcome::failed(action.id, None, reason),
        };

        match self.send(&request).await {
            Ok(response) if response.is_success() => {
                let error = match self.store.delete_action(action.id).await {
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!(id = action.id, error = %e, "replayed action could not be dequeued");
                        Some(format!("replayed but still queued: {e}"))
                    }
                };
                tracing::debug!(id = action.id, status = response.status, "replayed action");
                ReplayOutcome { id: action.id, success: true, status: Some(response.status), error }
            }
            Ok(response) => {
                tracing::debug!(id = action.id, status = response.status, "replay rejected, keeping action");
                ReplayOutcome::failed(action.id, Some(response.status), format!("HTTP {}", response.status))
            }
            Err(e) => {
                tracing::debug!(id = action.id, error = %e, "replay failed, keeping action");
                ReplayOutcome::failed(action.id, None, e.to_string())
            }
        }
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        if !self.connectivity.is_online() {
            return Err(NetworkError::HostOffline);
        }
        self.network.send(request).await
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Rebuild the captured request exactly as it was sent.
fn to_request(action: &PendingAction) -> Result<HttpRequest, String> {
    let method = Method::from_bytes(action.method.as_bytes()).map_err(|e| format!("invalid method: {e}"))?;
    let url = Url::parse(&action.url).map_err(|e| format!("invalid url: {e}"))?;

    let mut request = HttpRequest::new(method, url);
    request.headers = action.headers.clone();
    request.body = action.body.clone().map(Bytes::from);
    Ok(request)
}

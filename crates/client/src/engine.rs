//! Engine facade and control-message dispatcher.
//!
//! The engine owns one interceptor, lifecycle manager and sync coordinator
//! wired to the same store, buckets, network and connectivity signal.
//! Hosts drive it through [`Engine::fetch`] for intercepted requests and
//! [`Engine::handle_message`] for UI control messages.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tether_core::{AppConfig, BucketManager, Diagnostics, Error, Store};
use url::Url;

use crate::connectivity::Connectivity;
use crate::fetch::{HttpRequest, Network, canonicalize};
use crate::intercept::{InterceptOptions, Interceptor, Served};
use crate::lifecycle::{ClearReport, InstallReport, LifecycleManager, LifecycleState, PrewarmReport};
use crate::sync::{SyncCoordinator, SyncReport, SyncTrigger};

/// Control messages from the UI.
///
/// ```json
/// {"type": "ACTIVATE_NOW"}
/// {"type": "PREWARM_GROUP", "groupId": "m42", "resourceUrls": ["/api/modules/m42"]}
/// {"type": "CLEAR_ALL"}
/// {"type": "SYNC_NOW"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Skip the waiting period and activate the installed version.
    ActivateNow,
    /// Fetch and cache a named group of resources ahead of use.
    #[serde(rename_all = "camelCase")]
    PrewarmGroup { group_id: String, resource_urls: Vec<String> },
    /// Delete every bucket and the cache-type store collections.
    ClearAll,
    /// Replay queued mutations now.
    SyncNow,
}

/// Result of a handled control message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    Activated { evicted: Vec<String> },
    Prewarmed(PrewarmReport),
    Cleared(ClearReport),
    Synced(SyncReport),
}

pub struct Engine {
    interceptor: Interceptor,
    lifecycle: LifecycleManager,
    sync: Arc<SyncCoordinator>,
    connectivity: Connectivity,
    diagnostics: Diagnostics,
    store: Store,
    skip_waiting: bool,
}

impl Engine {
    /// Wire an engine. Nothing is installed until [`Engine::startup`].
    pub fn new(config: &AppConfig, store: Store, buckets: BucketManager, network: Arc<dyn Network>) -> Result<Self, Error> {
        let connectivity = Connectivity::new(true);
        let diagnostics = Diagnostics::default();

        let interceptor = Interceptor::new(
            config,
            store.clone(),
            buckets.clone(),
            network.clone(),
            connectivity.clone(),
            diagnostics.clone(),
        )?;
        let lifecycle =
            LifecycleManager::new(config, interceptor.clone(), store.clone(), buckets, diagnostics.clone());
        let sync = Arc::new(SyncCoordinator::new(store.clone(), network, connectivity.clone()));

        Ok(Self {
            interceptor,
            lifecycle,
            sync,
            connectivity,
            diagnostics,
            store,
            skip_waiting: config.skip_waiting,
        })
    }

    /// Install the current version, activating it when configured to skip waiting.
    pub async fn startup(&self) -> Result<InstallReport, Error> {
        self.lifecycle.startup(self.skip_waiting).await
    }

    /// Intercept a request.
    ///
    /// Before activation GET requests skip the caches. Other methods always
    /// take the capture path, whatever the lifecycle state.
    pub async fn fetch(&self, request: &HttpRequest, options: InterceptOptions) -> Result<Served, Error> {
        if request.method == Method::GET && self.lifecycle.state() != LifecycleState::Active {
            return self.interceptor.bypass(request).await;
        }
        self.interceptor.handle(request, options).await
    }

    /// Resolve a possibly relative URL against the configured origin.
    pub fn resolve(&self, url: &str) -> Result<Url, Error> {
        canonicalize(url, self.interceptor.origin()).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))
    }

    /// Single dispatcher for UI control messages.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<ControlOutcome, Error> {
        tracing::debug!(?message, "control message");
        match message {
            ControlMessage::ActivateNow => {
                let evicted = self.lifecycle.activate().await?;
                Ok(ControlOutcome::Activated { evicted })
            }
            ControlMessage::PrewarmGroup { group_id, resource_urls } => {
                Ok(ControlOutcome::Prewarmed(self.lifecycle.prewarm_group(&group_id, &resource_urls).await))
            }
            ControlMessage::ClearAll => Ok(ControlOutcome::Cleared(self.lifecycle.clear_all().await?)),
            ControlMessage::SyncNow => Ok(ControlOutcome::Synced(self.sync.sync_now(SyncTrigger::Manual).await?)),
        }
    }

    /// Record the host's connectivity observation.
    pub fn set_online(&self, online: bool) {
        self.connectivity.set_online(online);
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Shared handle for running [`SyncCoordinator::run`] in the background.
    pub fn sync(&self) -> Arc<SyncCoordinator> {
        self.sync.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::ResponseSource;
    use crate::testing::{MockNetwork, engine, engine_with, test_config};

    #[test]
    fn test_parse_control_messages() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"PREWARM_GROUP","groupId":"m42","resourceUrls":["/api/modules/m42"]}"#)
                .unwrap();
        assert_eq!(
            msg,
            ControlMessage::PrewarmGroup { group_id: "m42".into(), resource_urls: vec!["/api/modules/m42".into()] }
        );

        let msg: ControlMessage = serde_json::from_str(r#"{"type":"ACTIVATE_NOW"}"#).unwrap();
        assert_eq!(msg, ControlMessage::ActivateNow);
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"CLEAR_ALL"}"#).unwrap();
        assert_eq!(msg, ControlMessage::ClearAll);
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"REBOOT"}"#).is_err());
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"PREWARM_GROUP"}"#).is_err());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = ControlOutcome::Activated { evicted: vec!["static-v0".into()] };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "activated", "evicted": ["static-v0"]}));
    }

    #[tokio::test]
    async fn test_offline_module_read_scenario() {
        let network = MockNetwork::new();
        network.route("/api/modules/m42", 200, r#"{"title":"Module 42"}"#);
        network.route("/img/m42/diagram.png", 200, "png-v1");
        let engine = engine(network.clone()).await;
        engine.startup().await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Active);
        let module = engine.resolve("/api/modules/m42").unwrap();

        let first = engine.fetch(&HttpRequest::get(module.clone()), Default::default()).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);

        engine.set_online(false);
        let calls_before = network.call_count();
        let second = engine.fetch(&HttpRequest::get(module.clone()), Default::default()).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(&second.response.body[..], br#"{"title":"Module 42"}"#);
        assert_eq!(network.call_count(), calls_before);

        engine.set_online(true);
        network.route("/api/modules/m42", 200, r#"{"title":"Module 42 v2"}"#);
        network.route("/img/m42/diagram.png", 200, "png-v2");
        let outcome = engine
            .handle_message(ControlMessage::PrewarmGroup {
                group_id: "m42".into(),
                resource_urls: vec!["/api/modules/m42".into(), "/img/m42/diagram.png".into()],
            })
            .await
            .unwrap();
        let ControlOutcome::Prewarmed(report) = outcome else { panic!("unexpected outcome {outcome:?}") };
        assert_eq!(report.cached.len(), 2);
        assert!(network.calls()[calls_before..].contains(&"GET /api/modules/m42".to_string()));

        engine.set_online(false);
        let image = engine.resolve("/img/m42/diagram.png").unwrap();
        let cached_module = engine.fetch(&HttpRequest::get(module), Default::default()).await.unwrap();
        let cached_image = engine.fetch(&HttpRequest::get(image), Default::default()).await.unwrap();
        assert_eq!(&cached_module.response.body[..], br#"{"title":"Module 42 v2"}"#);
        assert_eq!(&cached_image.response.body[..], b"png-v2");
    }

    #[tokio::test]
    async fn test_waiting_engine_bypasses_caches() {
        let network = MockNetwork::new();
        network.route("/js/app.js", 200, "js");
        let config = AppConfig { skip_waiting: false, ..test_config() };
        let engine = engine_with(network.clone(), config).await;
        engine.startup().await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Waiting);

        let calls = network.call_count();
        let request = HttpRequest::get(engine.resolve("/js/app.js").unwrap());
        engine.fetch(&request, Default::default()).await.unwrap();
        let served = engine.fetch(&request, Default::default()).await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(network.call_count(), calls + 2);

        engine.handle_message(ControlMessage::ActivateNow).await.unwrap();
        let served = engine.fetch(&request, Default::default()).await.unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_waiting_engine_still_queues_offline_mutations() {
        let config = AppConfig { skip_waiting: false, ..test_config() };
        let engine = engine_with(MockNetwork::new(), config).await;
        engine.startup().await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Waiting);

        engine.set_online(false);
        let request = HttpRequest::new(Method::POST, engine.resolve("/api/notes").unwrap()).with_body("{}");
        let err = engine.fetch(&request, InterceptOptions::queued()).await.unwrap_err();

        assert!(matches!(err, Error::Queued { .. }));
        assert_eq!(engine.store().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sync_now_replays_queued_mutation() {
        let network = MockNetwork::new();
        network.route("/api/notes", 201, "");
        let engine = engine(network.clone()).await;
        engine.startup().await.unwrap();

        engine.set_online(false);
        let request = HttpRequest::new(Method::POST, engine.resolve("/api/notes").unwrap()).with_body("{}");
        let err = engine.fetch(&request, InterceptOptions::queued()).await.unwrap_err();
        assert!(matches!(err, Error::Queued { .. }));

        engine.set_online(true);
        let outcome = engine.handle_message(ControlMessage::SyncNow).await.unwrap();
        let ControlOutcome::Synced(report) = outcome else { panic!("unexpected outcome {outcome:?}") };
        assert_eq!(report.trigger, SyncTrigger::Manual);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(engine.store().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_all_message() {
        let network = MockNetwork::new();
        network.route("/api/modules/m1", 200, "{}");
        let engine = engine(network).await;
        engine.startup().await.unwrap();
        engine.fetch(&HttpRequest::get(engine.resolve("/api/modules/m1").unwrap()), Default::default()).await.unwrap();

        let outcome = engine.handle_message(ControlMessage::ClearAll).await.unwrap();

        let ControlOutcome::Cleared(report) = outcome else { panic!("unexpected outcome {outcome:?}") };
        assert_eq!(report.buckets_deleted, 4);
    }

    #[tokio::test]
    async fn test_resolve_rejects_other_schemes() {
        let engine = engine(MockNetwork::new()).await;
        assert!(matches!(engine.resolve("ftp://files.example.com/a"), Err(Error::InvalidUrl(_))));
        assert_eq!(engine.resolve("/a?b=1#c").unwrap().as_str(), "https://app.example.com/a?b=1");
    }
}

//! Scripted network and in-memory fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tether_core::{AppConfig, BucketManager, Diagnostics, Store};
use url::Url;

use crate::connectivity::Connectivity;
use crate::engine::Engine;
use crate::fetch::{HttpRequest, HttpResponse, Network, NetworkError};
use crate::intercept::Interceptor;

pub(crate) const ORIGIN: &str = "https://app.example.com";

/// Quota small enough for tests to hit on purpose.
pub(crate) const TEST_MAX_BYTES: u64 = 1024;

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        origin: ORIGIN.to_string(),
        cache_version: "v1".to_string(),
        max_cache_bytes: TEST_MAX_BYTES,
        ..Default::default()
    }
}

/// Network fake answering by path. Unknown paths get a 404.
#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, (u16, Bytes)>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl MockNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn route(&self, path: &str, status: u16, body: impl Into<Bytes>) {
        self.routes.lock().unwrap().insert(path.to_string(), (status, body.into()));
    }

    /// Simulate transport failure. Calls are still recorded.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// `"METHOD path"` for every call, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Network for MockNetwork {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        let path = request.url.path().to_string();
        self.calls.lock().unwrap().push(format!("{} {}", request.method, path));

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Timeout);
        }

        let routes = self.routes.lock().unwrap();
        Ok(match routes.get(&path) {
            Some((status, body)) => HttpResponse::new(*status, body.clone()),
            None => HttpResponse::new(404, "not found"),
        })
    }
}

pub(crate) struct Fixture {
    pub interceptor: Interceptor,
    pub store: Store,
    pub buckets: BucketManager,
    pub connectivity: Connectivity,
    pub diagnostics: Diagnostics,
}

pub(crate) async fn interceptor(network: Arc<MockNetwork>) -> Fixture {
    let store = Store::open_in_memory().await.unwrap();
    let buckets = BucketManager::open_in_memory(TEST_MAX_BYTES).await.unwrap();
    let connectivity = Connectivity::new(true);
    let diagnostics = Diagnostics::default();
    let interceptor = Interceptor::new(
        &test_config(),
        store.clone(),
        buckets.clone(),
        network,
        connectivity.clone(),
        diagnostics.clone(),
    )
    .unwrap();

    Fixture { interceptor, store, buckets, connectivity, diagnostics }
}

pub(crate) async fn engine(network: Arc<MockNetwork>) -> Engine {
    engine_with(network, test_config()).await
}

pub(crate) async fn engine_with(network: Arc<MockNetwork>, config: AppConfig) -> Engine {
    let store = Store::open_in_memory().await.unwrap();
    let buckets = BucketManager::open_in_memory(config.max_cache_bytes).await.unwrap();
    Engine::new(&config, store, buckets, network).unwrap()
}

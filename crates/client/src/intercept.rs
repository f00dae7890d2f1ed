//! Request interception: strategy execution and offline capture.
//!
//! GET requests are classified and served cache-first or network-first
//! from the bucket for their class. Every other method goes straight to
//! the network; when that fails, mutating requests may be captured into
//! the pending-action queue for later replay.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use tether_core::store::NewPendingAction;
use tether_core::{AppConfig, BucketManager, BucketName, CachedResponse, Diagnostic, Diagnostics, Error, Purpose};
use tether_core::{RequestKey, Store};
use url::Url;

use crate::classify::{Classifier, RequestClass, Strategy};
use crate::connectivity::Connectivity;
use crate::fetch::{HttpRequest, HttpResponse, Network, NetworkError, RequestMode, canonicalize};

/// Per-request behavior the caller opts into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptOptions {
    /// Capture a mutating request for replay when the network is unreachable.
    pub queue_when_offline: bool,
}

impl InterceptOptions {
    pub fn queued() -> Self {
        Self { queue_when_offline: true }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
}

/// A response plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: HttpResponse,
    pub source: ResponseSource,
    /// Set for GET requests that went through a caching strategy.
    pub class: Option<RequestClass>,
}

impl Served {
    fn network(response: HttpResponse, class: Option<RequestClass>) -> Self {
        Self { response, source: ResponseSource::Network, class }
    }

    fn cached(cached: CachedResponse, source: ResponseSource, class: RequestClass) -> Self {
        Self { response: cached.into(), source, class: Some(class) }
    }
}

/// Strategy executor shared by the engine and the lifecycle manager.
#[derive(Clone)]
pub struct Interceptor {
    buckets: BucketManager,
    store: Store,
    network: Arc<dyn Network>,
    classifier: Classifier,
    version: String,
    origin: Url,
    offline_page: Url,
    connectivity: Connectivity,
    diagnostics: Diagnostics,
}

impl Interceptor {
    pub fn new(
        config: &AppConfig, store: Store, buckets: BucketManager, network: Arc<dyn Network>,
        connectivity: Connectivity, diagnostics: Diagnostics,
    ) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let offline_page =
            canonicalize(&config.offline_page, &origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            buckets,
            store,
            network,
            classifier: Classifier::from_config(config),
            version: config.cache_version.clone(),
            origin,
            offline_page,
            connectivity,
            diagnostics,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn offline_page(&self) -> &Url {
        &self.offline_page
    }

    pub fn classify(&self, url: &Url) -> RequestClass {
        self.classifier.classify(url)
    }

    /// Bucket for a purpose under the current version.
    pub fn bucket(&self, purpose: Purpose) -> BucketName {
        BucketName::new(purpose, &self.version)
    }

    /// Serve a request through the caching strategies.
    pub async fn handle(&self, request: &HttpRequest, options: InterceptOptions) -> Result<Served, Error> {
        if request.method != Method::GET {
            return self.pass_through(request, options).await;
        }

        let class = self.classifier.classify(&request.url);
        let bucket = self.bucket(class.purpose());
        let key = cache_key(&request.url);

        match class.strategy() {
            Strategy::CacheFirst => self.cache_first(request, class, &bucket, &key).await,
            Strategy::NetworkFirst => self.network_first(request, class, &bucket, &key).await,
        }
    }

    /// Plain network fetch with no caching or capture.
    pub async fn bypass(&self, request: &HttpRequest) -> Result<Served, Error> {
        self.send(request)
            .await
            .map(|response| Served::network(response, None))
            .map_err(|e| offline_error(request, &e))
    }

    /// Fetch `url` fresh from the network and overwrite its entry in `purpose`'s bucket.
    ///
    /// Returns the response status. Only 2xx responses are stored; a failed
    /// write is an error here since caching is the whole point of the call.
    pub async fn refresh(&self, url: &Url, purpose: Purpose) -> Result<u16, Error> {
        let request = HttpRequest::get(url.clone());
        let response = self.send(&request).await.map_err(|e| offline_error(&request, &e))?;

        if response.is_success() {
            let bucket = self.bucket(purpose);
            self.buckets.put(&bucket, &cache_key(url), &response.to_cached()).await?;
            tracing::debug!(%url, %bucket, "refreshed cache entry");
        }
        Ok(response.status)
    }

    async fn cache_first(
        &self, request: &HttpRequest, class: RequestClass, bucket: &BucketName, key: &RequestKey,
    ) -> Result<Served, Error> {
        if let Some(cached) = self.lookup(bucket, key).await {
            tracing::debug!(url = %request.url, %bucket, "cache hit");
            return Ok(Served::cached(cached, ResponseSource::Cache, class));
        }

        tracing::debug!(url = %request.url, %bucket, "cache miss");
        match self.send(request).await {
            Ok(response) => {
                self.store_copy(bucket, key, &response).await;
                Ok(Served::network(response, Some(class)))
            }
            Err(err) => self.offline_fallback(request, class, &err).await,
        }
    }

    async fn network_first(
        &self, request: &HttpRequest, class: RequestClass, bucket: &BucketName, key: &RequestKey,
    ) -> Result<Served, Error> {
        match self.send(request).await {
            Ok(response) => {
                self.store_copy(bucket, key, &response).await;
                Ok(Served::network(response, Some(class)))
            }
            Err(err) => {
                if let Some(cached) = self.lookup(bucket, key).await {
                    tracing::debug!(url = %request.url, %bucket, error = %err, "network failed, serving cached copy");
                    return Ok(Served::cached(cached, ResponseSource::Cache, class));
                }
                self.offline_fallback(request, class, &err).await
            }
        }
    }

    async fn pass_through(&self, request: &HttpRequest, options: InterceptOptions) -> Result<Served, Error> {
        match self.send(request).await {
            Ok(response) => Ok(Served::network(response, None)),
            Err(err) if request.is_mutating() && options.queue_when_offline => self.capture(request, &err).await,
            Err(err) => Err(offline_error(request, &err)),
        }
    }

    /// Persist a failed mutation for replay. The caller still sees a failure.
    async fn capture(&self, request: &HttpRequest, err: &NetworkError) -> Result<Served, Error> {
        let action = NewPendingAction {
            url: request.url.to_string(),
            method: request.method.to_string(),
            headers: request.headers.clone(),
            body: request.body.as_ref().map(|b| b.to_vec()),
        };

        match self.store.enqueue_action(&action).await {
            Ok(id) => {
                self.diagnostics.emit(Diagnostic::RequestQueued {
                    id,
                    method: action.method,
                    url: action.url,
                });
                Err(Error::Queued { id, reason: err.to_string() })
            }
            Err(store_err) => {
                tracing::warn!(url = %request.url, error = %store_err, "failed to queue request");
                Err(offline_error(request, err))
            }
        }
    }

    async fn offline_fallback(
        &self, request: &HttpRequest, class: RequestClass, err: &NetworkError,
    ) -> Result<Served, Error> {
        if request.mode == RequestMode::Navigate {
            let bucket = self.bucket(Purpose::Static);
            if let Some(page) = self.lookup(&bucket, &cache_key(&self.offline_page)).await {
                tracing::debug!(url = %request.url, "serving offline page");
                return Ok(Served::cached(page, ResponseSource::OfflineFallback, class));
            }
        }
        Err(offline_error(request, err))
    }

    /// Bucket read. A read failure is logged and treated as a miss.
    async fn lookup(&self, bucket: &BucketName, key: &RequestKey) -> Option<CachedResponse> {
        match self.buckets.match_entry(bucket, key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(%bucket, url = %key.url, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Store a copy of a 2xx response. Failures become diagnostics.
    async fn store_copy(&self, bucket: &BucketName, key: &RequestKey, response: &HttpResponse) {
        if !response.is_success() {
            return;
        }
        if let Err(e) = self.buckets.put(bucket, key, &response.to_cached()).await {
            self.diagnostics.emit(Diagnostic::CacheWriteDropped {
                bucket: bucket.to_string(),
                url: key.url.clone(),
                reason: e.to_string(),
            });
        }
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        if !self.connectivity.is_online() {
            return Err(NetworkError::HostOffline);
        }
        self.network.send(request).await
    }
}

/// Cache identity for a URL. Fragments never reach the server.
fn cache_key(url: &Url) -> RequestKey {
    let mut url = url.clone();
    url.set_fragment(None);
    RequestKey::get(url.as_str())
}

fn offline_error(request: &HttpRequest, err: &NetworkError) -> Error {
    Error::Offline(format!("{} {}: {err}", request.method, request.url))
}

//! Network adapter.
//!
//! ### Request/Response model
//! - Method, absolute URL, headers and optional body in
//! - Status, headers and body out
//! - Non-2xx statuses are responses, not errors
//!
//! ### Offline semantics
//! - Any transport failure surfaces as [`NetworkError`]; callers treat
//!   every `NetworkError` as "offline"
//! - The adapter imposes the configured timeout; the engine adds none

pub mod error;
pub mod url;

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{Client, Method, header};
use tether_core::{CachedResponse, Error, HeaderList};

pub use self::url::{UrlError, canonicalize};
pub use error::NetworkError;

/// Whether the request is a top-level page navigation.
///
/// Only navigations fall back to the offline page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    Subresource,
    Navigate,
}

/// An outbound request as seen by the engine.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: ::url::Url,
    pub headers: HeaderList,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
}

impl HttpRequest {
    pub fn new(method: Method, url: ::url::Url) -> Self {
        Self { method, url, headers: Vec::new(), body: None, mode: RequestMode::Subresource }
    }

    pub fn get(url: ::url::Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A GET for a top-level page.
    pub fn navigate(url: ::url::Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether this request changes server state and may be queued for replay.
    pub fn is_mutating(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
    }
}

/// A response from the network or a cache bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderList,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy suitable for storing in a bucket.
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse::new(self.status, self.headers.clone(), self.body.to_vec())
    }
}

impl From<CachedResponse> for HttpResponse {
    fn from(cached: CachedResponse) -> Self {
        Self { status: cached.status, headers: cached.headers, body: Bytes::from(cached.body) }
    }
}

/// Transport used by the engine. Implemented by [`FetchClient`] in
/// production and by scripted fakes in tests.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Send a request and return whatever the server answered.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "tether/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "tether/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&tether_core::AppConfig> for FetchConfig {
    fn from(config: &tether_core::AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// reqwest-backed network adapter.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        for (name, value) in &request.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;
            let value =
                header::HeaderValue::from_str(value).map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?;

        tracing::debug!(
            "{} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(HttpResponse { status, headers, body })
    }
}

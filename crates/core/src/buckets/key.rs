//! Request identity used as the cache key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Error;

/// Normalized request identity: method (GET only) plus absolute URL,
/// including the query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    /// Key for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".to_string(), url: url.into() }
    }

    /// Key for an arbitrary method; only GET requests are cacheable.
    pub fn new(method: &str, url: impl Into<String>) -> Result<Self, Error> {
        if !method.eq_ignore_ascii_case("GET") {
            return Err(Error::InvalidInput(format!("only GET requests are cacheable, got {method}")));
        }
        Ok(Self::get(url))
    }

    /// Content-addressed form stored in the bucket table.
    pub fn hash(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }
}

/// Compute the stored cache key for a request.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

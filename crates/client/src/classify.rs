//! Request classification.
//!
//! Maps a GET request's URL to a [`RequestClass`], which fixes the bucket
//! purpose and caching strategy. Rules are ordered, most specific first:
//!
//! 1. API prefix → `api-data`
//! 2. Media extension or upload prefix → `media`
//! 3. Known static path or asset extension → `static-asset`
//! 4. Everything else → `dynamic`

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tether_core::{AppConfig, Purpose};
use url::Url;

static MEDIA_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mp4|webm|mp3|wav|ogg|m4a|png|jpe?g|gif|webp|svg|avif)$").expect("invalid media regex")
});

static ASSET_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(js|mjs|css|woff2?|ttf|otf|eot|ico|webmanifest)$").expect("invalid asset regex")
});

/// Which source is authoritative for a request class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

/// Named caching policy for a class of GET requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestClass {
    StaticAsset,
    ApiData,
    Media,
    Dynamic,
}

impl RequestClass {
    pub fn purpose(&self) -> Purpose {
        match self {
            RequestClass::StaticAsset => Purpose::Static,
            RequestClass::ApiData => Purpose::Api,
            RequestClass::Media => Purpose::Media,
            RequestClass::Dynamic => Purpose::Dynamic,
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            RequestClass::StaticAsset | RequestClass::Media => Strategy::CacheFirst,
            RequestClass::ApiData | RequestClass::Dynamic => Strategy::NetworkFirst,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::StaticAsset => "static-asset",
            RequestClass::ApiData => "api-data",
            RequestClass::Media => "media",
            RequestClass::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered URL rules. Static configuration, not persisted.
#[derive(Debug, Clone)]
pub struct Classifier {
    api_prefix: String,
    upload_prefix: String,
    static_paths: HashSet<String>,
}

impl Classifier {
    pub fn new(
        api_prefix: impl Into<String>, upload_prefix: impl Into<String>, static_paths: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            api_prefix: api_prefix.into(),
            upload_prefix: upload_prefix.into(),
            static_paths: static_paths.into_iter().collect(),
        }
    }

    /// Rules from configuration; the critical-asset list doubles as the known static paths.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.api_prefix, &config.upload_prefix, config.critical_assets.iter().cloned())
    }

    pub fn classify(&self, url: &Url) -> RequestClass {
        let path = url.path();

        if path.starts_with(&self.api_prefix) {
            RequestClass::ApiData
        } else if MEDIA_EXTENSION.is_match(path) || path.starts_with(&self.upload_prefix) {
            RequestClass::Media
        } else if self.static_paths.contains(path) || ASSET_EXTENSION.is_match(path) {
            RequestClass::StaticAsset
        } else {
            RequestClass::Dynamic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::from_config(&AppConfig::default())
    }

    fn classify(path: &str) -> RequestClass {
        classifier().classify(&Url::parse("https://app.example.com").unwrap().join(path).unwrap())
    }

    #[test]
    fn test_api_prefix_wins() {
        assert_eq!(classify("/api/modules/m42"), RequestClass::ApiData);
        assert_eq!(classify("/api/export/video.mp4"), RequestClass::ApiData);
    }

    #[test]
    fn test_media() {
        assert_eq!(classify("/img/cover.PNG"), RequestClass::Media);
        assert_eq!(classify("/uploads/slides/deck"), RequestClass::Media);
        assert_eq!(classify("/uploads/bundle.js"), RequestClass::Media);
    }

    #[test]
    fn test_static_assets() {
        assert_eq!(classify("/"), RequestClass::StaticAsset);
        assert_eq!(classify("/offline.html"), RequestClass::StaticAsset);
        assert_eq!(classify("/js/vendor.js?v=3"), RequestClass::StaticAsset);
        assert_eq!(classify("/fonts/inter.woff2"), RequestClass::StaticAsset);
    }

    #[test]
    fn test_dynamic_fallback() {
        assert_eq!(classify("/dashboard"), RequestClass::Dynamic);
        assert_eq!(classify("/modules/m42.html"), RequestClass::Dynamic);
    }

    #[test]
    fn test_class_policies() {
        assert_eq!(RequestClass::StaticAsset.strategy(), Strategy::CacheFirst);
        assert_eq!(RequestClass::Media.strategy(), Strategy::CacheFirst);
        assert_eq!(RequestClass::ApiData.strategy(), Strategy::NetworkFirst);
        assert_eq!(RequestClass::Dynamic.purpose(), Purpose::Dynamic);
        assert_eq!(RequestClass::ApiData.purpose(), Purpose::Api);
    }
}

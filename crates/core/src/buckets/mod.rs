//! Versioned, named caches of HTTP responses.
//!
//! A bucket is identified by `(purpose, version)` and named
//! `{purpose}-{version}`, e.g. `static-v1.0.0`. Exactly one bucket per
//! purpose is current; buckets from other versions are garbage once the
//! new version activates.

pub mod key;
pub mod manager;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

pub use key::{RequestKey, compute_request_key};
pub use manager::{BucketManager, CachedResponse};

/// What a bucket holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Static,
    Dynamic,
    Api,
    Media,
}

impl Purpose {
    pub const ALL: [Purpose; 4] = [Purpose::Static, Purpose::Dynamic, Purpose::Api, Purpose::Media];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Static => "static",
            Purpose::Dynamic => "dynamic",
            Purpose::Api => "api",
            Purpose::Media => "media",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Purpose::Static),
            "dynamic" => Ok(Purpose::Dynamic),
            "api" => Ok(Purpose::Api),
            "media" => Ok(Purpose::Media),
            other => Err(Error::InvalidInput(format!("unknown bucket purpose: {other}"))),
        }
    }
}

/// Identity of a cache bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketName {
    pub purpose: Purpose,
    pub version: String,
}

impl BucketName {
    pub fn new(purpose: Purpose, version: impl Into<String>) -> Self {
        Self { purpose, version: version.into() }
    }

    /// The current bucket set for a version, one per purpose.
    pub fn keep_set(version: &str) -> Vec<BucketName> {
        Purpose::ALL.iter().map(|p| BucketName::new(*p, version)).collect()
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.purpose, self.version)
    }
}

impl FromStr for BucketName {
    type Err = Error;

    /// Parse `{purpose}-{version}`. The version may itself contain dashes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (purpose, version) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidInput(format!("bucket name without version: {s}")))?;
        if version.is_empty() {
            return Err(Error::InvalidInput(format!("bucket name without version: {s}")));
        }
        Ok(BucketName::new(purpose.parse()?, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_display() {
        assert_eq!(BucketName::new(Purpose::Static, "v1.0.0").to_string(), "static-v1.0.0");
        assert_eq!(BucketName::new(Purpose::Api, "v2").to_string(), "api-v2");
    }

    #[test]
    fn test_bucket_name_parse_keeps_dashed_version() {
        let name: BucketName = "media-v2-beta".parse().unwrap();
        assert_eq!(name.purpose, Purpose::Media);
        assert_eq!(name.version, "v2-beta");
    }

    #[test]
    fn test_bucket_name_parse_rejects_unknown() {
        assert!("thumbnails-v1".parse::<BucketName>().is_err());
        assert!("static".parse::<BucketName>().is_err());
        assert!("static-".parse::<BucketName>().is_err());
    }

    #[test]
    fn test_keep_set_covers_every_purpose() {
        let names: Vec<String> = BucketName::keep_set("v2").iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["static-v2", "dynamic-v2", "api-v2", "media-v2"]);
    }
}

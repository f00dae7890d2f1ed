//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TETHER_*)
//! 2. TOML config file (if TETHER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TETHER_*)
/// 2. TOML config file (if TETHER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the structured store database.
    ///
    /// Set via TETHER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Path to the cache bucket database.
    ///
    /// Set via TETHER_CACHE_DB_PATH environment variable.
    #[serde(default = "default_cache_db_path")]
    pub cache_db_path: PathBuf,

    /// Engine cache version. Buckets of any other version are deleted on activation.
    ///
    /// Set via TETHER_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin that relative request URLs resolve against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path prefix for API endpoints (api-data class).
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path prefix for user uploads (media class).
    #[serde(default = "default_upload_prefix")]
    pub upload_prefix: String,

    /// Page served for navigations that fail while offline.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Assets pre-populated into the static bucket on install.
    #[serde(default = "default_critical_assets")]
    pub critical_assets: Vec<String>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Upper bound on cached body bytes across all buckets.
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: u64,

    /// Module snapshots older than this are evicted on install.
    #[serde(default = "default_module_cache_max_age_secs")]
    pub module_cache_max_age_secs: u64,

    /// Interval between periodic sync passes. 0 disables periodic sync.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Activate a freshly installed version immediately instead of waiting
    /// for an ACTIVATE_NOW message.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tether-store.sqlite")
}

fn default_cache_db_path() -> PathBuf {
    PathBuf::from("./tether-cache.sqlite")
}

fn default_cache_version() -> String {
    "v1.0.0".into()
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_upload_prefix() -> String {
    "/uploads/".into()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_critical_assets() -> Vec<String> {
    ["/", "/index.html", "/offline.html", "/manifest.json", "/css/app.css", "/js/app.js"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_user_agent() -> String {
    "tether/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_cache_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_module_cache_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_sync_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_db_path: default_cache_db_path(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            api_prefix: default_api_prefix(),
            upload_prefix: default_upload_prefix(),
            offline_page: default_offline_page(),
            critical_assets: default_critical_assets(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_cache_bytes: default_max_cache_bytes(),
            module_cache_max_age_secs: default_module_cache_max_age_secs(),
            sync_interval_secs: default_sync_interval_secs(),
            skip_waiting: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Periodic sync interval, or None when disabled.
    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_secs > 0).then(|| Duration::from_secs(self.sync_interval_secs))
    }

    pub fn module_cache_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.module_cache_max_age_secs as i64)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TETHER_`
    /// 2. TOML file from `TETHER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TETHER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TETHER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./tether-store.sqlite"));
        assert_eq!(config.cache_version, "v1.0.0");
        assert_eq!(config.api_prefix, "/api/");
        assert_eq!(config.offline_page, "/offline.html");
        assert!(config.critical_assets.contains(&config.offline_page));
        assert_eq!(config.max_cache_bytes, 50 * 1024 * 1024);
        assert!(config.skip_waiting);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.sync_interval(), Some(Duration::from_secs(300)));
        assert_eq!(config.module_cache_max_age(), chrono::Duration::days(7));

        let disabled = AppConfig { sync_interval_secs: 0, ..Default::default() };
        assert_eq!(disabled.sync_interval(), None);
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("tether.toml", "cache_version = \"v2\"\norigin = \"https://learn.example.com\"")?;
            jail.set_env("TETHER_CONFIG_FILE", "tether.toml");
            jail.set_env("TETHER_CACHE_VERSION", "v3");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_version, "v3");
            assert_eq!(config.origin, "https://learn.example.com");
            Ok(())
        });
    }
}

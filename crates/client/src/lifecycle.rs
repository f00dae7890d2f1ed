//! Cache-version lifecycle.
//!
//! ```text
//! Idle → Installing → Waiting → Active
//! ```
//!
//! Install prepares the current version's buckets and pre-populates the
//! critical assets. Activation deletes every bucket outside the current
//! keep-set and hands interception to the new version. Until then the
//! engine serves requests without its caches.

use serde::Serialize;
use tether_core::{AppConfig, BucketManager, BucketName, Diagnostic, Diagnostics, Error, Purpose, Store};
use tokio::sync::watch;
use url::Url;

use crate::fetch::canonicalize;
use crate::intercept::Interceptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing installed yet
    Idle,
    /// Buckets being prepared and pre-populated
    Installing,
    /// Installed, waiting for activation
    Waiting,
    /// Current version intercepts requests
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallReport {
    pub version: String,
    pub cached: Vec<String>,
    pub failed: Vec<String>,
    pub modules_evicted: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrewarmReport {
    pub group_id: String,
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearReport {
    pub buckets_deleted: u64,
    pub records_deleted: u64,
}

pub struct LifecycleManager {
    interceptor: Interceptor,
    store: Store,
    buckets: BucketManager,
    diagnostics: Diagnostics,
    critical_assets: Vec<String>,
    module_max_age: chrono::Duration,
    state: watch::Sender<LifecycleState>,
}

impl LifecycleManager {
    pub fn new(
        config: &AppConfig, interceptor: Interceptor, store: Store, buckets: BucketManager, diagnostics: Diagnostics,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            interceptor,
            store,
            buckets,
            diagnostics,
            critical_assets: config.critical_assets.clone(),
            module_max_age: config.module_cache_max_age(),
            state,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn version(&self) -> &str {
        self.interceptor.version()
    }

    /// Prepare the current version.
    ///
    /// Individual asset failures are counted, not fatal. A storage failure
    /// aborts the install and restores the previous state.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let previous = self.state.send_replace(LifecycleState::Installing);
        tracing::info!(version = self.version(), "installing cache version");

        match self.prepare().await {
            Ok(report) => {
                self.state.send_replace(LifecycleState::Waiting);
                tracing::info!(
                    version = %report.version,
                    cached = report.cached.len(),
                    failed = report.failed.len(),
                    modules_evicted = report.modules_evicted,
                    "install finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.state.send_replace(previous);
                tracing::error!(version = self.version(), error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn prepare(&self) -> Result<InstallReport, Error> {
        for bucket in BucketName::keep_set(self.version()) {
            self.buckets.open_bucket(&bucket).await?;
        }

        let (cached, failed) = self.fetch_all(&self.critical_assets, Some(Purpose::Static)).await;
        let modules_evicted = self.store.purge_stale_modules(self.module_max_age).await?;

        Ok(InstallReport { version: self.version().to_string(), cached, failed, modules_evicted })
    }

    /// Delete every bucket outside the current keep-set and start intercepting.
    ///
    /// Returns the deleted bucket names.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        match self.state() {
            LifecycleState::Waiting | LifecycleState::Active => {}
            state => {
                return Err(Error::InvalidState(format!("cannot activate while {state:?}; install first")));
            }
        }

        let evicted = self.buckets.delete_buckets_not_in(&BucketName::keep_set(self.version())).await?;
        if !evicted.is_empty() {
            self.diagnostics.emit(Diagnostic::BucketsEvicted { names: evicted.clone() });
        }

        self.state.send_replace(LifecycleState::Active);
        tracing::info!(version = self.version(), "cache version active");
        Ok(evicted)
    }

    /// Install, then activate immediately when `skip_waiting` is set.
    pub async fn startup(&self, skip_waiting: bool) -> Result<InstallReport, Error> {
        let report = self.install().await?;
        if skip_waiting {
            self.activate().await?;
        }
        Ok(report)
    }

    /// Fetch a named group of resources fresh and overwrite their cache entries.
    pub async fn prewarm_group(&self, group_id: &str, resource_urls: &[String]) -> PrewarmReport {
        let (cached, failed) = self.fetch_all(resource_urls, None).await;
        tracing::info!(group_id, cached = cached.len(), failed = failed.len(), "prewarmed resource group");
        PrewarmReport { group_id: group_id.to_string(), cached, failed }
    }

    /// Delete every bucket and truncate the cache-type collections.
    ///
    /// Notes, bookmarks and quiz progress are untouched.
    pub async fn clear_all(&self) -> Result<ClearReport, Error> {
        let buckets_deleted = self.buckets.delete_all().await?;
        let records_deleted = self.store.clear_cache_collections().await?;
        tracing::info!(buckets_deleted, records_deleted, "cleared all caches");
        Ok(ClearReport { buckets_deleted, records_deleted })
    }

    /// Refresh each resource into `purpose`'s bucket, or its class bucket when `None`.
    async fn fetch_all(&self, resources: &[String], purpose: Option<Purpose>) -> (Vec<String>, Vec<String>) {
        let mut cached = Vec::new();
        let mut failed = Vec::new();

        for resource in resources {
            match self.fetch_one(resource, purpose).await {
                Ok(url) => cached.push(url.to_string()),
                Err(reason) => {
                    self.diagnostics.emit(Diagnostic::PrewarmFailed { url: resource.clone(), reason });
                    failed.push(resource.clone());
                }
            }
        }
        (cached, failed)
    }

    async fn fetch_one(&self, resource: &str, purpose: Option<Purpose>) -> Result<Url, String> {
        let url = canonicalize(resource, self.interceptor.origin()).map_err(|e| e.to_string())?;
        let purpose = purpose.unwrap_or_else(|| self.interceptor.classify(&url).purpose());

        match self.interceptor.refresh(&url, purpose).await {
            Ok(status) if (200..300).contains(&status) => Ok(url),
            Ok(status) => Err(format!("HTTP {status}")),
            Err(e) => Err(e.to_string()),
        }
    }
}

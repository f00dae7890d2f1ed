//! tether host entry point.
//!
//! Loads configuration, opens the local store and cache buckets, installs
//! the current cache version and then serves the JSON-lines control channel
//! on stdio. Logging goes to stderr to keep stdout for channel replies.

use std::sync::Arc;

use anyhow::Result;
use tether_client::{Engine, FetchClient, FetchConfig};
use tether_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.cache_version, origin = %config.origin, "starting tether engine");

    let storage::Storage { store, buckets, degraded } = storage::open(&config).await?;
    if !degraded.is_empty() {
        tracing::warn!(?degraded, "running with in-memory databases; their data will not persist");
    }
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let engine = Arc::new(Engine::new(&config, store.clone(), buckets, network)?);

    let install = engine.startup().await?;
    tracing::info!(
        state = ?engine.state(),
        cached = install.cached.len(),
        failed = install.failed.len(),
        "engine ready"
    );

    let sync_task = tokio::spawn(engine.sync().run(config.sync_interval()));
    let channel = handler::ChannelHandler::new(engine.clone());

    tokio::select! {
        served = channel.serve(tokio::io::stdin(), tokio::io::stdout()) => served?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    sync_task.abort();
    drop(channel);
    drop(engine);
    store.close().await?;
    tracing::info!("tether engine stopped");

    Ok(())
}

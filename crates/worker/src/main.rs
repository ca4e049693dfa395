//! minaret-worker entry point.
//!
//! Runs one cache generation as a JSON-lines worker on stdio.
//! Logging goes to stderr so stdout carries only protocol lines.

use std::sync::Arc;

use anyhow::Result;
use minaret_client::{FetchClient, FetchConfig};
use minaret_core::{AppConfig, CacheDb, CacheStorage, MemoryStorage};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use crate::controller::{CacheController, Deps};
use crate::host::StdioHost;
use crate::scheduler::TokioScheduler;

mod controller;
mod error;
mod events;
mod host;
mod notify;
mod scheduler;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;

    let storage: Arc<dyn CacheStorage> = if config.is_in_memory() {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(CacheDb::open(&config.db_path).await?)
    };
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let (host, outbox) = StdioHost::new();

    let deps = Deps {
        storage,
        network,
        notifier: host.clone(),
        clients: host.clone(),
        scheduler: Arc::new(TokioScheduler),
    };
    let controller = Arc::new(CacheController::new(config, deps)?);

    tracing::info!(
        static_store = controller.static_cache_name(),
        dynamic_store = controller.dynamic_cache_name(),
        "starting minaret-worker on stdio"
    );

    if controller.resume().await? {
        tracing::info!("serving from previously installed generation");
    }

    host::serve(controller, host, outbox, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    tracing::info!("minaret-worker stopped");
    Ok(())
}

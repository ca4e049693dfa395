//! The offline cache controller.
//!
//! One controller is one cache generation. It owns the generation's static
//! and dynamic stores and reacts to the events the host forwards:
//!
//! - lifecycle: install, activate, skip-waiting (`lifecycle.rs`)
//! - fetch interception (`fetch.rs`, decisions in `policy.rs`)
//! - push messages and notification clicks (`push.rs`)
//! - background and periodic sync (`sync.rs`)

mod fetch;
mod lifecycle;
pub mod policy;
mod push;
mod sync;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use minaret_client::{Network, canonicalize};
use minaret_core::cache::match_in;
use minaret_core::{AppConfig, CacheStorage, ConfigError, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::notify::{Clients, Notifier};
use crate::scheduler::{Scheduler, TaskHandle};

pub use lifecycle::{ActivateReport, InstallReport};
pub use policy::FetchOutcome;
pub use push::{ClickOutcome, PushOutcome};
pub use sync::SyncStatus;

/// Where the generation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Created, install not yet attempted.
    Parsed,
    Installing,
    /// Installed; waiting to take over from the previous generation.
    Waiting,
    Active,
    /// Failed to install. Never becomes active.
    Redundant,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Parsed => "parsed",
            Lifecycle::Installing => "installing",
            Lifecycle::Waiting => "waiting",
            Lifecycle::Active => "active",
            Lifecycle::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Collaborators injected into the controller.
#[derive(Clone)]
pub struct Deps {
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub notifier: Arc<dyn Notifier>,
    pub clients: Arc<dyn Clients>,
    pub scheduler: Arc<dyn Scheduler>,
}

pub struct CacheController {
    config: AppConfig,
    origin: Url,
    root_url: Url,
    static_name: String,
    dynamic_name: String,
    pub(crate) deps: Deps,
    state: Mutex<Lifecycle>,
    /// Serializes install and activate.
    transition: tokio::sync::Mutex<()>,
    pending: Mutex<Vec<TaskHandle>>,
    next_tag: AtomicU64,
}

impl CacheController {
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the configured origin is unusable.
    pub fn new(config: AppConfig, deps: Deps) -> Result<Self, ConfigError> {
        let origin = config.origin_url()?;
        let root_url = canonicalize("/", &origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;

        Ok(Self {
            static_name: config.static_cache_name(),
            dynamic_name: config.dynamic_cache_name(),
            config,
            origin,
            root_url,
            deps,
            state: Mutex::new(Lifecycle::Parsed),
            transition: tokio::sync::Mutex::new(()),
            pending: Mutex::new(Vec::new()),
            next_tag: AtomicU64::new(1),
        })
    }

    pub fn state(&self) -> Lifecycle {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: Lifecycle) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(from = %*state, to = %next, "lifecycle transition");
        *state = next;
    }

    #[cfg(test)]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn static_cache_name(&self) -> &str {
        &self.static_name
    }

    pub fn dynamic_cache_name(&self) -> &str {
        &self.dynamic_name
    }

    #[cfg(test)]
    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    fn next_tag(&self) -> String {
        format!("{}-{}", self.config.cache_prefix, self.next_tag.fetch_add(1, Ordering::Relaxed))
    }

    /// Look `key` up in the static then the dynamic store. Storage errors
    /// count as a miss.
    async fn lookup(&self, key: &str) -> Option<Response> {
        let names = [self.static_name.as_str(), self.dynamic_name.as_str()];
        match match_in(self.deps.storage.as_ref(), &names, key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache lookup failed; treating as miss");
                None
            }
        }
    }

    /// Write a copy of `response` into the dynamic store if it is cacheable.
    /// Failures are logged and otherwise ignored.
    async fn store_dynamic(&self, key: &str, response: &Response) {
        if !policy::should_store(response) {
            tracing::debug!(key, status = response.status, "not caching non-success response");
            return;
        }
        let result = async {
            let store = self.deps.storage.open(&self.dynamic_name).await?;
            store.put(key, response).await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "failed to write dynamic cache entry");
        }
    }

    fn track(&self, handle: TaskHandle) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished() && !h.is_cancelled());
        pending.push(handle);
    }

    /// Number of scheduled tasks that have neither run nor been cancelled.
    #[cfg(test)]
    pub fn pending_tasks(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.iter().filter(|h| !h.is_finished() && !h.is_cancelled()).count()
    }

    /// Cancel every pending scheduled task. Called when the process is
    /// about to exit.
    pub fn shutdown(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let count = pending.len();
        for handle in pending.drain(..) {
            handle.cancel();
        }
        tracing::info!(cancelled = count, "controller shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[test]
    fn test_cache_names_follow_config() {
        let h = Harness::new();
        assert_eq!(h.controller.static_cache_name(), "minaret-static-v2");
        assert_eq!(h.controller.dynamic_cache_name(), "minaret-dynamic-v2");
        assert_eq!(h.controller.root_url().as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_starts_parsed() {
        let h = Harness::new();
        assert_eq!(h.controller.state(), Lifecycle::Parsed);
    }

    #[test]
    fn test_new_rejects_bad_origin() {
        let h = Harness::new();
        let config = AppConfig { origin: "mailto:imam@example.com".into(), ..Default::default() };
        assert!(CacheController::new(config, h.deps()).is_err());
    }

    #[test]
    fn test_tags_are_unique() {
        let h = Harness::new();
        let a = h.controller.next_tag();
        let b = h.controller.next_tag();
        assert_ne!(a, b);
        assert!(a.starts_with("minaret-"));
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(Lifecycle::Waiting.to_string(), "waiting");
        assert_eq!(serde_json::to_value(Lifecycle::Redundant).unwrap(), "redundant");
    }
}

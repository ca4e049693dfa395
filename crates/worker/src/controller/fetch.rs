//! Fetch interception.

use minaret_core::Request;

use super::policy::{self, FetchOutcome, Plan, Source};
use super::{CacheController, Lifecycle};

impl CacheController {
    /// Answer a request from a controlled page.
    ///
    /// Never fails: every error path ends in a cached response, the offline
    /// root document, a 503, a no-match or a passthrough.
    pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        if self.state() != Lifecycle::Active {
            return FetchOutcome::Passthrough;
        }

        let Some(key) = policy::cache_key(request, &self.origin) else {
            tracing::trace!(method = %request.method, url = %request.url, "not intercepted");
            return FetchOutcome::Passthrough;
        };

        let cached = self.lookup(key.as_str()).await;
        let navigate = request.is_navigation();

        match policy::plan(&key, cached, navigate, &self.config.api_prefix) {
            Plan::Serve(response) => {
                tracing::debug!("cache hit for {}", key);
                FetchOutcome::respond(response, Source::Cache)
            }
            Plan::NetworkFirst => {
                let outgoing = Request { url: key.to_string(), ..request.clone() };
                match self.deps.network.fetch(&outgoing).await {
                    Ok(response) => {
                        self.store_dynamic(key.as_str(), &response).await;
                        FetchOutcome::respond(response, Source::Network)
                    }
                    Err(e) => {
                        tracing::warn!(url = %key, error = %e, "api request failed; checking cache");
                        policy::api_fallback(self.lookup(key.as_str()).await)
                    }
                }
            }
            Plan::Network { navigate } => {
                let outgoing = Request { url: key.to_string(), ..request.clone() };
                match self.deps.network.fetch(&outgoing).await {
                    Ok(response) => {
                        self.store_dynamic(key.as_str(), &response).await;
                        FetchOutcome::respond(response, Source::Network)
                    }
                    Err(e) => {
                        tracing::warn!(url = %key, navigate, error = %e, "request failed; serving offline fallback");
                        let root = if navigate { self.lookup(self.root_url.as_str()).await } else { None };
                        policy::offline_fallback(navigate, root)
                    }
                }
            }
        }
    }
}

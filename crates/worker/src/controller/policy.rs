//! Fetch interception decision table.
//!
//! Everything here is pure: given what the cache said and what the network
//! did, decide what the page gets. The I/O lives in `fetch.rs`.
//!
//! | cached | path  | network | result                          |
//! |--------|-------|---------|---------------------------------|
//! | hit    | any   | -       | cached response                 |
//! | miss   | api   | ok      | live response (2xx stored)      |
//! | miss   | api   | failed  | cache re-check, else no-match   |
//! | miss   | other | ok      | live response (2xx stored)      |
//! | miss   | other | failed  | root document if navigation, else 503 |

use minaret_client::canonicalize;
use minaret_core::{Request, Response};
use serde::{Deserialize, Serialize};
use url::Url;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    Network,
    /// The cached root document standing in for a failed navigation.
    OfflineFallback,
    /// The synthetic 503.
    Offline,
}

/// What the page receives for an intercepted (or ignored) request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Serve this response.
    Respond { response: Response, source: Source },
    /// Not intercepted; the host performs the request natively.
    Passthrough,
    /// Network failed and nothing was cached; the page sees a plain network
    /// failure.
    NoMatch,
}

impl FetchOutcome {
    pub fn respond(response: Response, source: Source) -> Self {
        Self::Respond { response, source }
    }

    #[cfg(test)]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Respond { response, .. } => Some(response),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn source(&self) -> Option<Source> {
        match self {
            Self::Respond { source, .. } => Some(*source),
            _ => None,
        }
    }
}

/// Next step after the cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Serve(Response),
    /// API miss: network, then cache re-check, then no-match.
    NetworkFirst,
    /// Other miss: network, then offline fallback.
    Network { navigate: bool },
}

/// Cache key for `request`, or `None` when the request must not be
/// intercepted (non-GET, or not an http(s) URL).
pub fn cache_key(request: &Request, origin: &Url) -> Option<Url> {
    if !request.is_get() {
        return None;
    }
    canonicalize(&request.url, origin).ok()
}

pub fn is_api(key: &Url, api_prefix: &str) -> bool {
    key.path().starts_with(api_prefix)
}

/// Decide what to do once the cache has been consulted.
pub fn plan(key: &Url, cached: Option<Response>, navigate: bool, api_prefix: &str) -> Plan {
    match cached {
        Some(response) => Plan::Serve(response),
        None if is_api(key, api_prefix) => Plan::NetworkFirst,
        None => Plan::Network { navigate },
    }
}

/// Only 2xx responses are written to a store.
pub fn should_store(response: &Response) -> bool {
    response.is_success()
}

/// API request whose network attempt failed.
pub fn api_fallback(cached: Option<Response>) -> FetchOutcome {
    match cached {
        Some(response) => FetchOutcome::respond(response, Source::Cache),
        None => FetchOutcome::NoMatch,
    }
}

/// Non-API request whose network attempt failed.
pub fn offline_fallback(navigate: bool, root: Option<Response>) -> FetchOutcome {
    match (navigate, root) {
        (true, Some(root)) => FetchOutcome::respond(root, Source::OfflineFallback),
        _ => FetchOutcome::respond(Response::offline(), Source::Offline),
    }
}

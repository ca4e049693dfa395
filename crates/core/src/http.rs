//! Request and response types shared by the cache, the network client and
//! the worker's wire protocol.
//!
//! Bodies are raw bytes in memory and base64 on the JSON wire.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How the page issued the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// A top-level page navigation.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// An outgoing request observed on a controlled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub mode: RequestMode,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

impl Request {
    /// A plain GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into(), method: default_method(), mode: RequestMode::default(), headers: BTreeMap::new() }
    }

    /// A navigation GET request.
    pub fn navigate(url: impl Into<String>) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response, either live from the network or replayed from a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,

    #[serde(default)]
    pub status_text: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default, with = "base64_body")]
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: String::new(), headers: BTreeMap::new(), body: body.into() }
    }

    /// The synthetic reply for a non-navigation request that could not reach
    /// the network and had nothing cached.
    pub fn offline() -> Self {
        Self { status_text: "Service Unavailable".into(), ..Self::new(503, Bytes::from_static(b"Offline")) }
            .with_header("Content-Type", "text/plain")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let req: Request = serde_json::from_str(r#"{"url": "/api/prayer-times"}"#).unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.mode, RequestMode::NoCors);
        assert!(req.is_get());
        assert!(!req.is_navigation());
    }

    #[test]
    fn test_request_mode_kebab_case() {
        let req: Request = serde_json::from_str(r#"{"url": "/", "mode": "navigate"}"#).unwrap();
        assert!(req.is_navigation());

        let req: Request = serde_json::from_str(r#"{"url": "/", "mode": "same-origin"}"#).unwrap();
        assert_eq!(req.mode, RequestMode::SameOrigin);
    }

    #[test]
    fn test_is_get_case_insensitive() {
        assert!(Request::get("/").with_method("get").is_get());
        assert!(!Request::get("/").with_method("POST").is_get());
    }

    #[test]
    fn test_offline_response() {
        let resp = Response::offline();
        assert_eq!(resp.status, 503);
        assert_eq!(resp.body.as_ref(), b"Offline");
        assert_eq!(resp.headers.get("content-type").map(String::as_str), Some("text/plain"));
        assert!(!resp.is_success());
    }

    #[test]
    fn test_is_success_range() {
        assert!(Response::new(200, "").is_success());
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(304, "").is_success());
        assert!(!Response::new(199, "").is_success());
    }

    #[test]
    fn test_body_is_base64_on_the_wire() {
        let resp = Response::new(200, "hi");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["body"], "aGk=");

        let back: Response = serde_json::from_value(json).unwrap();
        assert_eq!(back.body.as_ref(), b"hi");
    }

    #[test]
    fn test_body_rejects_invalid_base64() {
        let result: Result<Response, _> = serde_json::from_str(r#"{"status": 200, "body": "***"}"#);
        assert!(result.is_err());
    }
}

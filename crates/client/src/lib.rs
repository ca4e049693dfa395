//! Network access for minaret.
//!
//! This crate provides the [`Network`] seam the controller fetches through,
//! its reqwest implementation and URL canonicalization for cache keys.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, canonicalize};

//! Core types and shared functionality for minaret.
//!
//! This crate provides:
//! - Request/response types carried between the cache, the network and the host
//! - Cache storage abstraction with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStorage, CacheStore, MemoryStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, RequestMode, Response};

//! Named response caches.
//!
//! This module provides the storage abstraction the controller works
//! against and two backends for it:
//!
//! - SQLite via tokio-rusqlite ([`CacheDb`]), persistent across restarts
//! - process memory ([`MemoryStorage`])
//!
//! Row keys are SHA-256 of store name and URL; migrations run on open.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::SqliteStore;
pub use memory::{MemoryStorage, MemoryStore};
pub use store::{CacheStorage, CacheStore, match_in};

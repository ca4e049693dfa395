//! Storage abstraction over named response caches.
//!
//! A [`CacheStorage`] is the set of named stores; a [`CacheStore`] is one
//! store mapping normalized request URLs to responses. Both are injected
//! into the controller so tests can run against memory or in-memory SQLite.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Error;
use crate::http::Response;

/// One named cache store.
///
/// Writes are overwrite-on-put; two racing puts for the same key leave
/// whichever landed last.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Response>, Error>;

    async fn put(&self, key: &str, response: &Response) -> Result<(), Error>;

    /// Returns true if an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, Error>;

    async fn keys(&self) -> Result<Vec<String>, Error>;
}

/// The collection of named stores.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a store, creating it empty if it does not exist.
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheStore>, Error>;

    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Delete a store and everything in it. Returns true if it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Store names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;
}

/// Look `key` up in each named store in turn, returning the first hit.
///
/// Stores that do not exist are skipped rather than created.
pub async fn match_in(storage: &dyn CacheStorage, names: &[&str], key: &str) -> Result<Option<Response>, Error> {
    for name in names {
        if !storage.has(name).await? {
            continue;
        }
        let store = storage.open(name).await?;
        if let Some(response) = store.get(key).await? {
            return Ok(Some(response));
        }
    }
    Ok(None)
}

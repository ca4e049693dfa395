//! Process-local cache storage.
//!
//! Nothing survives the process. Used by tests and by `db_path = ":memory:"`
//! runs that do not want SQLite at all.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::store::{CacheStorage, CacheStore};
use crate::Error;
use crate::http::Response;

/// In-memory [`CacheStorage`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    stores: Arc<Mutex<Vec<Arc<MemoryStore>>>>,
}

/// One in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    entries: Mutex<BTreeMap<String, Response>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, name: &str) -> Option<Arc<MemoryStore>> {
        let stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores.iter().find(|s| s.name == name).cloned()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheStore>, Error> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = stores.iter().find(|s| s.name == name) {
            return Ok(existing.clone());
        }
        let store = Arc::new(MemoryStore { name: name.to_string(), entries: Mutex::new(BTreeMap::new()) });
        stores.push(store.clone());
        Ok(store)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.find(name).is_some())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        let before = stores.len();
        stores.retain(|s| s.name != name);
        Ok(stores.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(stores.iter().map(|s| s.name.clone()).collect())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Response>, Error> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, response: &Response) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}

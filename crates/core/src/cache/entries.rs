//! SQLite-backed [`CacheStorage`].
//!
//! Store names live in `cache_stores`; responses live in `cache_entries`
//! keyed by [`compute_cache_key`]. Deleting a store cascades to its rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use super::store::{CacheStorage, CacheStore};
use crate::Error;
use crate::http::Response;

/// Handle to one store inside a [`CacheDb`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: CacheDb,
    name: String,
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheStore>, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![owned, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Arc::new(SqliteStore { db: self.clone(), name: name.to_string() }))
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at ASC, rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Response>, Error> {
        let hash = compute_cache_key(&self.name, key);
        self.db
            .conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, status_text, headers_json, body
                     FROM cache_entries WHERE hash = ?1",
                )?;

                let row = stmt.query_row(params![hash], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                });

                match row {
                    Ok((status, status_text, headers_json, body)) => {
                        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;
                        Ok(Some(Response { status, status_text, headers, body: Bytes::from(body) }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, key: &str, response: &Response) -> Result<(), Error> {
        let hash = compute_cache_key(&self.name, key);
        let store = self.name.clone();
        let url = key.to_string();
        let status = response.status;
        let status_text = response.status_text.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (hash, store, url, status, status_text, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(hash) DO UPDATE SET
                        status = excluded.status,
                        status_text = excluded.status_text,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        hash,
                        store,
                        url,
                        status,
                        status_text,
                        headers_json,
                        body,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let hash = compute_cache_key(&self.name, key);
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE hash = ?1", params![hash])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE store = ?1 ORDER BY stored_at ASC, rowid ASC")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> CacheDb {
        CacheDb::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = storage().await;
        let store = db.open("minaret-static-v1").await.unwrap();
        let response = Response::new(200, "<html></html>").with_header("Content-Type", "text/html");

        store.put("http://localhost:3000/", &response).await.unwrap();

        let got = store.get("http://localhost:3000/").await.unwrap().unwrap();
        assert_eq!(got, response);
        assert_eq!(got.headers.get("content-type").map(String::as_str), Some("text/html"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = storage().await;
        let store = db.open("s").await.unwrap();
        assert!(store.get("http://localhost:3000/nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = storage().await;
        let store = db.open("s").await.unwrap();
        store.put("k", &Response::new(200, "old")).await.unwrap();
        store.put("k", &Response::new(201, "new")).await.unwrap();

        let got = store.get("k").await.unwrap().unwrap();
        assert_eq!(got.status, 201);
        assert_eq!(got.body.as_ref(), b"new");
        assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn test_same_key_in_two_stores_is_independent() {
        let db = storage().await;
        let a = db.open("a").await.unwrap();
        let b = db.open("b").await.unwrap();
        a.put("k", &Response::new(200, "a")).await.unwrap();

        assert!(b.get("k").await.unwrap().is_none());
        assert!(a.delete("k").await.unwrap());
        assert!(!a.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_names_and_cascade_delete() {
        let db = storage().await;
        let old = db.open("minaret-static-v0").await.unwrap();
        db.open("minaret-static-v1").await.unwrap();
        old.put("k", &Response::new(200, "stale")).await.unwrap();

        assert_eq!(
            db.keys().await.unwrap(),
            vec!["minaret-static-v0".to_string(), "minaret-static-v1".to_string()]
        );

        assert!(db.delete("minaret-static-v0").await.unwrap());
        assert!(!db.has("minaret-static-v0").await.unwrap());

        let entries: i64 = db
            .conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_put_into_deleted_store_fails() {
        let db = storage().await;
        let store = db.open("gone").await.unwrap();
        db.delete("gone").await.unwrap();

        let result = store.put("k", &Response::new(200, "x")).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }
}

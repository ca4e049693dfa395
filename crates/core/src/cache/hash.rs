//! Row keys for stored responses.

use sha2::{Digest, Sha256};

/// Compute the row key of `url` inside the store named `store`.
///
/// The same URL in two stores yields two keys, so deleting one store never
/// touches the other's rows.
pub fn compute_cache_key(store: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(store.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

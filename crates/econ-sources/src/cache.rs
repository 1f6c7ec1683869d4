//! Time-bounded in-memory cache for transformed datasets.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Canonical cache key: SHA-256 over the namespace and the JSON encoding of
/// the request parameters.
///
/// Struct fields serialize in declaration order, so equal requests always
/// produce the same key.
pub fn cache_key<P: Serialize>(namespace: &str, params: &P) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(params)?;
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"\0");
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Key-value cache whose entries expire a fixed duration after insertion.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return a clone of the cached value if it has not expired.
    /// Expired entries are evicted on lookup.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key`, dropping every entry that has expired.
    pub async fn insert(&self, key: String, value: V) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

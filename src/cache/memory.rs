//! In-process cache store.
//!
//! Backs single-process deployments and tests. Expiry is lazy: an expired
//! entry is dropped the next time it is read. There is no size bound.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use super::store::{CacheStore, StoreError};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Bytes,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_stored_bytes_verbatim() {
        let store = MemoryStore::new();
        store
            .set("post_1", Bytes::from_static(b"{\"id\":1}"), Duration::from_secs(60))
            .await
            .expect("set");

        let cached = store.get("post_1").await.expect("get");
        assert_eq!(cached, Some(Bytes::from_static(b"{\"id\":1}")));
        assert_eq!(store.get("post_2").await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set("posts", Bytes::from_static(b"[]"), Duration::from_secs(120))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(store.get("posts").await.expect("get").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("posts").await.expect("get").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn overwrite_replaces_entry_wholesale() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set("users", Bytes::from_static(b"[1]"), ttl).await.expect("set");
        store.set("users", Bytes::from_static(b"[2]"), ttl).await.expect("set");

        assert_eq!(
            store.get("users").await.expect("get"),
            Some(Bytes::from_static(b"[2]"))
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn deleting_absent_key_is_not_an_error() {
        let store = MemoryStore::new();
        store.delete("missing").await.expect("delete absent key");
    }
}

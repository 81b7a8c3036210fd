//! Cache store capability.
//!
//! The store is an external, concurrency-safe key-value service with
//! per-key expiry. The proxy only needs `get`, `set` with a TTL and
//! `delete`; everything else about the store is its own business.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("cache store unreachable: {message}")]
    Unavailable { message: String },
    #[error("cache store `{op}` failed for `{key}`: {message}")]
    Command {
        op: &'static str,
        key: String,
        message: String,
    },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn command(op: &'static str, key: &str, message: impl Into<String>) -> Self {
        Self::Command {
            op,
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Shared key-value store with per-key expiry.
///
/// `get` returns `Ok(None)` for an absent or expired key; `Err` is reserved
/// for failures talking to the store, so a miss is never confused with an
/// outage.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

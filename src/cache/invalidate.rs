use std::sync::Arc;

use metrics::counter;
use tracing::info;

use super::keys::CacheKey;
use super::store::{CacheStore, StoreError};

const METRIC_CACHE_INVALIDATE: &str = "postproxy_cache_invalidate_total";

/// Deletes single cache entries by exact key.
///
/// There is no prefix or wildcard form: each resource family is dropped
/// through its own known key.
#[derive(Clone)]
pub struct Invalidator {
    store: Arc<dyn CacheStore>,
}

impl Invalidator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Delete `key`. Deleting an absent key succeeds.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.store.delete(key.as_str()).await?;
        counter!(METRIC_CACHE_INVALIDATE).increment(1);
        info!(target = "postproxy::cache::invalidate", key = %key, "cache entry invalidated");
        Ok(())
    }
}

//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, RedisError, aio::ConnectionManager};
use tracing::info;

use super::store::{CacheStore, StoreError};

/// Cache store over a single multiplexed Redis connection.
///
/// The connection manager reconnects on its own; clones share the same
/// underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://:password@redis:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|err| StoreError::unavailable(err.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| StoreError::unavailable(err.to_string()))?;
        info!(target = "postproxy::cache::redis", "Connected to Redis");
        Ok(Self { connection })
    }
}

fn map_error(op: &'static str, key: &str, err: RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        StoreError::unavailable(err.to_string())
    } else {
        StoreError::command(op, key, err.to_string())
    }
}

/// Redis rejects a zero expiry, so sub-millisecond TTLs round up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = connection
            .get(key)
            .await
            .map_err(|err| map_error("get", key, err))?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection
            .pset_ex::<_, _, ()>(key, value.as_ref(), ttl_millis(ttl))
            .await
            .map_err(|err| map_error("set", key, err))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection
            .del::<_, ()>(key)
            .await
            .map_err(|err| map_error("delete", key, err))
    }
}

//! Read-through resolution.
//!
//! 1. Look the key up in the store; a hit is returned verbatim.
//! 2. On a miss, run the fetch, write its payload under the key with the
//!    given TTL, then return it.
//! 3. A failed fetch is returned as-is and nothing is written.
//! 4. A store failure on lookup is surfaced; it never falls through to
//!    upstream.
//!
//! With coalescing enabled, concurrent misses on one key share a single
//! fetch-and-store. Without it every miss fetches on its own and the last
//! write wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use tracing::debug;

use super::inflight::{InFlight, Role};
use super::keys::CacheKey;
use super::store::{CacheStore, StoreError};

const METRIC_CACHE_HIT: &str = "postproxy_cache_hit_total";
const METRIC_CACHE_MISS: &str = "postproxy_cache_miss_total";
const METRIC_CACHE_COALESCED: &str = "postproxy_cache_coalesced_total";

/// Payload produced by a fetch, plus whatever the caller wants to carry
/// back alongside it.
#[derive(Debug, Clone)]
pub struct Fetched<M = ()> {
    pub payload: Bytes,
    pub meta: M,
}

impl Fetched<()> {
    pub fn payload(payload: Bytes) -> Self {
        Self { payload, meta: () }
    }
}

/// Where a resolved payload came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin<M = ()> {
    /// Served from the store; no upstream call was made.
    Cache,
    /// Fetched by this caller and written to the store.
    Upstream(M),
    /// Shared from a concurrent caller's fetch.
    Joined(M),
}

impl<M> Origin<M> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Cache => "hit",
            Origin::Upstream(_) => "miss",
            Origin::Joined(_) => "joined",
        }
    }

    pub fn is_cache(&self) -> bool {
        matches!(self, Origin::Cache)
    }
}

#[derive(Debug, Clone)]
pub struct Resolved<M = ()> {
    pub payload: Bytes,
    pub origin: Origin<M>,
}

pub struct Resolver<M = (), E = StoreError>
where
    M: Clone,
    E: Clone,
{
    store: Arc<dyn CacheStore>,
    inflight: Option<InFlight<Result<Fetched<M>, E>>>,
}

impl<M: Clone, E: Clone> Clone for Resolver<M, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            inflight: self.inflight.clone(),
        }
    }
}

impl<M, E> Resolver<M, E>
where
    M: Clone + Send + Sync + 'static,
    E: From<StoreError> + Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn CacheStore>, coalesce_misses: bool) -> Self {
        Self {
            store,
            inflight: coalesce_misses.then(InFlight::new),
        }
    }

    /// Return the cached payload for `key`, or populate it from `fetch`.
    pub async fn resolve<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Resolved<M>, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Fetched<M>, E>> + Send + 'static,
    {
        if let Some(payload) = self.store.get(key.as_str()).await? {
            counter!(METRIC_CACHE_HIT).increment(1);
            debug!(key = %key, outcome = "hit", "serving cached payload");
            return Ok(Resolved {
                payload,
                origin: Origin::Cache,
            });
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        debug!(key = %key, outcome = "miss", "cache miss, fetching upstream");

        let store = Arc::clone(&self.store);
        let owned_key = key.clone();
        let populate = async move {
            let fetched = fetch().await?;
            store
                .set(owned_key.as_str(), fetched.payload.clone(), ttl)
                .await?;
            Ok::<_, E>(fetched)
        };

        let Some(inflight) = &self.inflight else {
            let fetched = populate.await?;
            return Ok(Resolved {
                payload: fetched.payload,
                origin: Origin::Upstream(fetched.meta),
            });
        };

        let (result, role) = inflight.run(key.as_str(), move || populate).await;
        let fetched = result?;
        let origin = match role {
            Role::Leader => Origin::Upstream(fetched.meta),
            Role::Follower => {
                counter!(METRIC_CACHE_COALESCED).increment(1);
                debug!(key = %key, outcome = "joined", "joined in-flight fetch");
                Origin::Joined(fetched.meta)
            }
        };

        Ok(Resolved {
            payload: fetched.payload,
            origin,
        })
    }

    /// Detach any in-flight fetch for `key` so the next miss starts afresh.
    pub fn forget_in_flight(&self, key: &CacheKey) {
        if let Some(inflight) = &self.inflight {
            inflight.forget(key.as_str());
        }
    }
}

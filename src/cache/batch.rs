//! Multi-fetch aggregation.
//!
//! A batch of ids is cached as one JSON array under a composite key. On a
//! miss every id is fetched upstream by its own task; results are collected
//! as the tasks finish, so item order is completion order, not request
//! order.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::warn;

use crate::application::ProxyError;
use crate::domain::{Resource, ResourceKind};
use crate::upstream::{FetchError, ResourceFetcher};

use super::keys::{BatchKeyOrder, CacheKey};
use super::resolver::{Fetched, Origin, Resolver};
use super::store::CacheStore;

const METRIC_BATCH_FAILED_ITEMS: &str = "postproxy_batch_failed_items_total";

/// What happens to a batch when some of its item fetches fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchFailurePolicy {
    /// Failed ids are left out of the aggregate and reported alongside it;
    /// the aggregate is still cached, even when it ends up empty.
    #[default]
    Partial,
    /// Any failed id fails the whole batch and nothing is cached.
    AllOrNothing,
}

impl BatchFailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchFailurePolicy::Partial => "partial",
            BatchFailurePolicy::AllOrNothing => "all_or_nothing",
        }
    }
}

impl FromStr for BatchFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "partial" => Ok(BatchFailurePolicy::Partial),
            "all_or_nothing" | "strict" => Ok(BatchFailurePolicy::AllOrNothing),
            other => Err(format!(
                "unknown batch failure policy `{other}` (expected `partial` or `all_or_nothing`)"
            )),
        }
    }
}

/// One id whose fetch failed while the rest of its batch succeeded.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub id: u64,
    pub error: ProxyError,
}

#[derive(Debug, Clone)]
pub struct BatchMeta<T> {
    items: Vec<T>,
    failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    /// Decoded items, in completion order on a fresh fetch.
    pub items: Vec<T>,
    /// Aggregate JSON array exactly as cached.
    pub payload: Bytes,
    /// Empty unless this caller (or the fetch it joined) populated the entry
    /// and some ids failed.
    pub failures: Vec<BatchFailure>,
    pub origin: Origin,
}

impl<T> BatchOutcome<T> {
    pub fn failed_ids(&self) -> Vec<u64> {
        self.failures.iter().map(|failure| failure.id).collect()
    }
}

pub struct BatchResolver<T>
where
    T: Clone,
{
    resolver: Resolver<BatchMeta<T>, ProxyError>,
    fetcher: Arc<dyn ResourceFetcher>,
    order: BatchKeyOrder,
    policy: BatchFailurePolicy,
    _item: PhantomData<fn() -> T>,
}

impl<T> BatchResolver<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn ResourceFetcher>,
        order: BatchKeyOrder,
        policy: BatchFailurePolicy,
        coalesce_misses: bool,
    ) -> Self {
        Self {
            resolver: Resolver::new(store, coalesce_misses),
            fetcher,
            order,
            policy,
            _item: PhantomData,
        }
    }

    /// Resolve the aggregate for `ids`, each id addressed as `item(id)`.
    pub async fn resolve(
        &self,
        kind: ResourceKind,
        ids: &[u64],
        ttl: Duration,
        item: fn(u64) -> Resource,
    ) -> Result<BatchOutcome<T>, ProxyError> {
        if ids.is_empty() {
            return Err(ProxyError::invalid_input("ids must not be empty"));
        }

        let ids = self.order.normalize(ids);
        let key = CacheKey::for_batch(kind, &ids);
        let fetcher = Arc::clone(&self.fetcher);
        let policy = self.policy;

        let resolved = self
            .resolver
            .resolve(&key, ttl, move || fan_out(fetcher, ids, item, policy))
            .await?;

        let (items, failures, origin) = match resolved.origin {
            Origin::Cache => {
                let items = serde_json::from_slice(&resolved.payload)
                    .map_err(|err| ProxyError::decode(format!("cached {kind}"), err))?;
                (items, Vec::new(), Origin::Cache)
            }
            Origin::Upstream(meta) => (meta.items, meta.failures, Origin::Upstream(())),
            Origin::Joined(meta) => (meta.items, meta.failures, Origin::Joined(())),
        };

        Ok(BatchOutcome {
            items,
            payload: resolved.payload,
            failures,
            origin,
        })
    }

    pub fn forget_in_flight(&self, key: &CacheKey) {
        self.resolver.forget_in_flight(key);
    }
}

async fn fetch_item<T: DeserializeOwned>(
    fetcher: &dyn ResourceFetcher,
    resource: Resource,
) -> Result<T, ProxyError> {
    let path = resource.upstream_path();
    let body = fetcher.fetch(&path).await?;
    serde_json::from_slice(&body).map_err(|err| ProxyError::decode(path, err))
}

async fn fan_out<T>(
    fetcher: Arc<dyn ResourceFetcher>,
    ids: Vec<u64>,
    item: fn(u64) -> Resource,
    policy: BatchFailurePolicy,
) -> Result<Fetched<BatchMeta<T>>, ProxyError>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let mut tasks = JoinSet::new();
    let mut outstanding: HashMap<u64, usize> = HashMap::new();
    for &id in &ids {
        *outstanding.entry(id).or_default() += 1;
        let fetcher = Arc::clone(&fetcher);
        tasks.spawn(async move { (id, fetch_item::<T>(fetcher.as_ref(), item(id)).await) });
    }

    let mut items = Vec::with_capacity(ids.len());
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (id, result) = match joined {
            Ok(reported) => reported,
            Err(err) => {
                warn!(
                    target = "postproxy::cache::batch",
                    error = %err,
                    "batch item task failed"
                );
                continue;
            }
        };
        if let Some(count) = outstanding.get_mut(&id) {
            *count -= 1;
        }
        match result {
            Ok(value) => items.push(value),
            Err(error) => failures.push(BatchFailure { id, error }),
        }
    }

    // Ids whose task never reported back.
    for (id, count) in outstanding {
        for _ in 0..count {
            failures.push(BatchFailure {
                id,
                error: ProxyError::from(FetchError::unreachable(
                    &item(id).upstream_path(),
                    "fetch task did not complete",
                )),
            });
        }
    }

    if let Some(first) = failures.first() {
        if policy == BatchFailurePolicy::AllOrNothing {
            return Err(first.error.clone());
        }
        counter!(METRIC_BATCH_FAILED_ITEMS).increment(failures.len() as u64);
        warn!(
            target = "postproxy::cache::batch",
            failed = ?failures.iter().map(|failure| failure.id).collect::<Vec<_>>(),
            fetched = items.len(),
            "batch cached without failed ids"
        );
    }

    let payload = serde_json::to_vec(&items)
        .map_err(|err| ProxyError::decode("batch aggregate", err))?;

    Ok(Fetched {
        payload: Bytes::from(payload),
        meta: BatchMeta { items, failures },
    })
}

use std::sync::Arc;

use bytes::Bytes;
use postproxy_types::{Post, User};
use serde::de::DeserializeOwned;

use crate::application::error::ProxyError;
use crate::cache::{
    BatchOutcome, BatchResolver, CacheConfig, CacheKey, CacheStore, Fetched, Invalidator, Origin,
    Resolver,
};
use crate::domain::{Resource, ResourceKind};
use crate::upstream::ResourceFetcher;

/// Checks an upstream body before it is cached. The body itself is cached
/// and served unchanged.
type Check = fn(&str, &Bytes) -> Result<(), ProxyError>;

/// Any JSON object, whatever its fields.
type Object = serde_json::Map<String, serde_json::Value>;

/// A payload ready to be written to the response.
#[derive(Debug, Clone)]
pub struct Served {
    pub payload: Bytes,
    pub origin: Origin,
}

/// The proxy's operations over one cache store and one upstream.
pub struct ProxyService {
    resolver: Resolver<(), ProxyError>,
    recent_posts: BatchResolver<Post>,
    invalidator: Invalidator,
    fetcher: Arc<dyn ResourceFetcher>,
    config: CacheConfig,
}

impl ProxyService {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn ResourceFetcher>,
        config: CacheConfig,
    ) -> Self {
        Self {
            resolver: Resolver::new(Arc::clone(&store), config.coalesce_misses),
            recent_posts: BatchResolver::new(
                Arc::clone(&store),
                Arc::clone(&fetcher),
                config.batch_key_order,
                config.batch_failure_policy,
                config.coalesce_misses,
            ),
            invalidator: Invalidator::new(store),
            fetcher,
            config,
        }
    }

    pub async fn posts(&self) -> Result<Served, ProxyError> {
        self.serve(Resource::Posts, decodes::<Vec<Object>>).await
    }

    /// Single post. Its body is cached without any decode check.
    pub async fn post(&self, id: u64) -> Result<Served, ProxyError> {
        self.serve(Resource::Post(id), unchecked).await
    }

    pub async fn users(&self) -> Result<Served, ProxyError> {
        self.serve(Resource::Users, decodes::<Vec<User>>).await
    }

    pub async fn user(&self, id: u64) -> Result<Served, ProxyError> {
        self.serve(Resource::User(id), decodes::<User>).await
    }

    pub async fn user_posts(&self, user_id: u64) -> Result<Served, ProxyError> {
        self.serve(Resource::UserPosts(user_id), decodes::<Vec<Post>>).await
    }

    /// Posts for `ids`, fetched concurrently and cached as one aggregate.
    pub async fn recent_posts(&self, ids: &[u64]) -> Result<BatchOutcome<Post>, ProxyError> {
        let kind = ResourceKind::RecentPosts;
        self.recent_posts
            .resolve(kind, ids, self.config.ttl_for(kind), Resource::Post)
            .await
    }

    /// Drop the cached post list.
    pub async fn clear_posts(&self) -> Result<CacheKey, ProxyError> {
        let key = CacheKey::for_resource(Resource::Posts);
        self.drop_key(&key).await?;
        Ok(key)
    }

    /// Drop one cache entry by its exact key.
    pub async fn invalidate(&self, raw_key: &str) -> Result<CacheKey, ProxyError> {
        let raw_key = raw_key.trim();
        if raw_key.is_empty() {
            return Err(ProxyError::invalid_input("cache key must not be empty"));
        }
        let key = CacheKey::from_raw(raw_key);
        self.drop_key(&key).await?;
        Ok(key)
    }

    async fn drop_key(&self, key: &CacheKey) -> Result<(), ProxyError> {
        self.invalidator.invalidate(key).await?;
        // A fetch still in flight must not satisfy callers arriving after
        // the invalidation.
        self.resolver.forget_in_flight(key);
        self.recent_posts.forget_in_flight(key);
        Ok(())
    }

    async fn serve(&self, resource: Resource, check: Check) -> Result<Served, ProxyError> {
        let key = CacheKey::for_resource(resource);
        let ttl = self.config.ttl_for(resource.kind());
        let fetcher = Arc::clone(&self.fetcher);
        let path = resource.upstream_path();

        let resolved = self
            .resolver
            .resolve(&key, ttl, move || async move {
                let body = fetcher.fetch(&path).await?;
                check(&path, &body)?;
                Ok::<_, ProxyError>(Fetched::payload(body))
            })
            .await?;

        Ok(Served {
            payload: resolved.payload,
            origin: resolved.origin,
        })
    }
}

fn unchecked(_path: &str, _body: &Bytes) -> Result<(), ProxyError> {
    Ok(())
}

/// Fails unless `body` decodes as `T`.
fn decodes<T: DeserializeOwned>(path: &str, body: &Bytes) -> Result<(), ProxyError> {
    serde_json::from_slice::<T>(body)
        .map(drop)
        .map_err(|err| ProxyError::decode(path, err))
}

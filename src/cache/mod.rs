//! Read-through cache layer.
//!
//! - [`CacheStore`]: the external key-value store ([`RedisStore`] in
//!   production, [`MemoryStore`] for single-process runs and tests)
//! - [`Resolver`]: single-key read-through with per-key miss coalescing
//! - [`BatchResolver`]: concurrent fan-out cached as one aggregate
//! - [`Invalidator`]: exact-key deletion
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! redis_url = "redis://redis:6379/0"
//! collection_ttl_seconds = 120
//! entity_ttl_seconds = 300
//! batch_key_order = "as_given"
//! batch_failure_policy = "partial"
//! coalesce_misses = true
//! ```

mod batch;
mod config;
mod inflight;
mod invalidate;
mod keys;
mod memory;
mod redis;
mod resolver;
mod store;

pub use batch::{BatchFailure, BatchFailurePolicy, BatchOutcome, BatchResolver};
pub use config::CacheConfig;
pub(crate) use config::{DEFAULT_COLLECTION_TTL_SECS, DEFAULT_ENTITY_TTL_SECS};
pub use inflight::{InFlight, Role};
pub use invalidate::Invalidator;
pub use keys::{BatchKeyOrder, CacheKey};
pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use resolver::{Fetched, Origin, Resolved, Resolver};
pub use store::{CacheStore, StoreError};

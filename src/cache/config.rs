//! Cache configuration.
//!
//! TTLs per staleness class plus the batch and coalescing knobs, taken from
//! the `[cache]` section of `postproxy.toml`.

use std::time::Duration;

use crate::domain::{ResourceKind, TtlClass};

use super::batch::BatchFailurePolicy;
use super::keys::BatchKeyOrder;

pub(crate) const DEFAULT_COLLECTION_TTL_SECS: u64 = 120;
pub(crate) const DEFAULT_ENTITY_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of lists, filtered lists and batch aggregates.
    pub collection_ttl: Duration,
    /// Lifetime of single-entity lookups.
    pub entity_ttl: Duration,
    pub batch_key_order: BatchKeyOrder,
    pub batch_failure_policy: BatchFailurePolicy,
    /// Share one upstream fetch between concurrent misses on a key.
    pub coalesce_misses: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            collection_ttl: Duration::from_secs(DEFAULT_COLLECTION_TTL_SECS),
            entity_ttl: Duration::from_secs(DEFAULT_ENTITY_TTL_SECS),
            batch_key_order: BatchKeyOrder::default(),
            batch_failure_policy: BatchFailurePolicy::default(),
            coalesce_misses: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            collection_ttl: Duration::from_secs(settings.collection_ttl_seconds.get()),
            entity_ttl: Duration::from_secs(settings.entity_ttl_seconds.get()),
            batch_key_order: settings.batch_key_order,
            batch_failure_policy: settings.batch_failure_policy,
            coalesce_misses: settings.coalesce_misses,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for_class(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Collection => self.collection_ttl,
            TtlClass::Entity => self.entity_ttl,
        }
    }

    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        self.ttl_for_class(kind.ttl_class())
    }
}

//! Cache key derivation.
//!
//! Keys are plain strings shared with the external store:
//!
//! - collections: `<tag>` (`posts`, `users`)
//! - single entities: `<tag>_<id>` (`post_1`, `user_1`, `user_posts_1`)
//! - batches: `<tag>:<id>,<id>,...` (`recent_posts:3,1,2`)

use std::fmt;
use std::str::FromStr;

use crate::domain::{Resource, ResourceKind};

/// A string uniquely identifying one cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap a key that was derived elsewhere (e.g. supplied by an operator).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Key of a single upstream resource.
    pub fn for_resource(resource: Resource) -> Self {
        let tag = resource.kind().tag();
        match resource {
            Resource::Posts | Resource::Users => Self(tag.to_string()),
            Resource::Post(id) | Resource::User(id) | Resource::UserPosts(id) => {
                Self(format!("{tag}_{id}"))
            }
        }
    }

    /// Composite key of a batch lookup. Ids are joined exactly as given;
    /// callers normalise them first through [`BatchKeyOrder::normalize`].
    pub fn for_batch(kind: ResourceKind, ids: &[u64]) -> Self {
        let joined = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Self(format!("{}:{joined}", kind.tag()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalisation applied to batch id lists before key derivation and fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchKeyOrder {
    /// Ids are used in request order with duplicates kept, so the same set in
    /// a different order is a different cache entry.
    #[default]
    AsGiven,
    /// Ids are sorted ascending and deduplicated.
    Canonical,
}

impl BatchKeyOrder {
    pub fn normalize(self, ids: &[u64]) -> Vec<u64> {
        match self {
            BatchKeyOrder::AsGiven => ids.to_vec(),
            BatchKeyOrder::Canonical => {
                let mut normalized = ids.to_vec();
                normalized.sort_unstable();
                normalized.dedup();
                normalized
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchKeyOrder::AsGiven => "as_given",
            BatchKeyOrder::Canonical => "canonical",
        }
    }
}

impl FromStr for BatchKeyOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "as_given" | "literal" => Ok(BatchKeyOrder::AsGiven),
            "canonical" | "sorted" => Ok(BatchKeyOrder::Canonical),
            other => Err(format!(
                "unknown batch key order `{other}` (expected `as_given` or `canonical`)"
            )),
        }
    }
}

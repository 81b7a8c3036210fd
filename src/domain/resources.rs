//! Resource kinds served by the proxy.
//!
//! A [`ResourceKind`] names a family of cached artifacts and carries the tag
//! used in cache keys. A [`Resource`] is one addressable upstream resource
//! (kind plus parameters) and knows its upstream path.

use std::fmt;

/// Staleness class deciding which TTL applies to a cached artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Lists and bulk views.
    Collection,
    /// Single-entity lookups.
    Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Posts,
    Post,
    Users,
    User,
    UserPosts,
    RecentPosts,
}

impl ResourceKind {
    /// Tag used as the leading component of every cache key of this kind.
    ///
    /// Tags are distinct and never end in a digit, so `<tag>_<numeric id>`
    /// keys of different kinds cannot collide.
    pub const fn tag(self) -> &'static str {
        match self {
            ResourceKind::Posts => "posts",
            ResourceKind::Post => "post",
            ResourceKind::Users => "users",
            ResourceKind::User => "user",
            ResourceKind::UserPosts => "user_posts",
            ResourceKind::RecentPosts => "recent_posts",
        }
    }

    pub const fn ttl_class(self) -> TtlClass {
        match self {
            ResourceKind::Post | ResourceKind::User => TtlClass::Entity,
            ResourceKind::Posts
            | ResourceKind::Users
            | ResourceKind::UserPosts
            | ResourceKind::RecentPosts => TtlClass::Collection,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One upstream resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Posts,
    Post(u64),
    Users,
    User(u64),
    UserPosts(u64),
}

impl Resource {
    pub const fn kind(self) -> ResourceKind {
        match self {
            Resource::Posts => ResourceKind::Posts,
            Resource::Post(_) => ResourceKind::Post,
            Resource::Users => ResourceKind::Users,
            Resource::User(_) => ResourceKind::User,
            Resource::UserPosts(_) => ResourceKind::UserPosts,
        }
    }

    /// Path relative to the upstream base URL.
    pub fn upstream_path(self) -> String {
        match self {
            Resource::Posts => "/posts".to_string(),
            Resource::Post(id) => format!("/posts/{id}"),
            Resource::Users => "/users".to_string(),
            Resource::User(id) => format!("/users/{id}"),
            Resource::UserPosts(id) => format!("/posts?userId={id}"),
        }
    }
}

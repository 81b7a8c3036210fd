//! Upstream resource access.
//!
//! [`ResourceFetcher`] is the capability the cache layer consumes; the
//! production implementation is [`UpstreamClient`]. Tests substitute fakes.

mod client;
mod error;

use async_trait::async_trait;
use bytes::Bytes;

pub use client::{UpstreamClient, UpstreamConfig};
pub use error::FetchError;

/// Fetch the raw body of one upstream resource.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// `path` is relative to the upstream base URL and may carry a query
    /// string, e.g. `/posts?userId=1`.
    async fn fetch(&self, path: &str) -> Result<Bytes, FetchError>;
}

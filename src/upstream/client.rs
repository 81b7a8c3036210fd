use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::{counter, histogram};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::{FetchError, ResourceFetcher};

const METRIC_UPSTREAM_FETCH: &str = "postproxy_upstream_fetch_total";
const METRIC_UPSTREAM_FETCH_MS: &str = "postproxy_upstream_fetch_ms";

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: Url,
    /// Skip TLS certificate validation toward upstream. Insecure.
    pub accept_invalid_certs: bool,
}

/// HTTP client for the remote posts/users API.
///
/// One request per fetch: no retries and no timeout beyond the client
/// default. Any non-2xx answer is a [`FetchError::BadStatus`].
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client,
    base: Url,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(Self::user_agent());
        if config.accept_invalid_certs {
            warn!(
                target = "postproxy::upstream",
                base_url = %config.base_url,
                "TLS certificate validation toward upstream is DISABLED"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base: directory_base(config.base_url.clone()),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("postproxy/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| FetchError::InvalidPath {
                path: path.to_string(),
                message: err.to_string(),
            })
    }

    async fn send(&self, path: &str) -> Result<Bytes, FetchError> {
        let url = self.url(path)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::unreachable(path, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|err| FetchError::body(path, err))
    }
}

/// Ensure the base ends in `/` so relative joins keep any path prefix.
fn directory_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

#[async_trait]
impl ResourceFetcher for UpstreamClient {
    async fn fetch(&self, path: &str) -> Result<Bytes, FetchError> {
        let started = Instant::now();
        let result = self.send(path).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.outcome(),
        };
        counter!(METRIC_UPSTREAM_FETCH, "outcome" => outcome).increment(1);
        histogram!(METRIC_UPSTREAM_FETCH_MS).record(elapsed_ms);
        debug!(
            target = "postproxy::upstream",
            path,
            outcome,
            elapsed_ms,
            "upstream fetch finished"
        );

        result
    }
}

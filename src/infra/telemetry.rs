use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the proxy emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "postproxy_cache_hit_total",
            Unit::Count,
            "Total number of lookups served from the cache store."
        );
        describe_counter!(
            "postproxy_cache_miss_total",
            Unit::Count,
            "Total number of lookups that missed the cache store."
        );
        describe_counter!(
            "postproxy_cache_coalesced_total",
            Unit::Count,
            "Total number of misses that joined another caller's in-flight fetch."
        );
        describe_counter!(
            "postproxy_cache_invalidate_total",
            Unit::Count,
            "Total number of cache keys deleted by invalidation."
        );
        describe_counter!(
            "postproxy_upstream_fetch_total",
            Unit::Count,
            "Total number of upstream requests, labelled by outcome."
        );
        describe_histogram!(
            "postproxy_upstream_fetch_ms",
            Unit::Milliseconds,
            "Upstream request latency in milliseconds."
        );
        describe_counter!(
            "postproxy_batch_failed_items_total",
            Unit::Count,
            "Total number of batch items left out of a cached aggregate."
        );
    });
}

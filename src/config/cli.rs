use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the postproxy binary.
#[derive(Debug, Parser)]
#[command(
    name = "postproxy",
    version,
    about = "Read-through caching proxy for the posts/users API"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "POSTPROXY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the caching proxy HTTP service.
    Serve(Box<ServeArgs>),
    /// Delete cache entries by exact key and exit.
    Invalidate(InvalidateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverrides {
    /// Override the cache store backend (redis|memory).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub store: StoreOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the lifetime of cached lists and batches.
    #[arg(long = "cache-collection-ttl-seconds", value_name = "SECONDS")]
    pub cache_collection_ttl_seconds: Option<u64>,

    /// Override the lifetime of cached single entities.
    #[arg(long = "cache-entity-ttl-seconds", value_name = "SECONDS")]
    pub cache_entity_ttl_seconds: Option<u64>,

    /// Override batch id normalisation (as_given|canonical).
    #[arg(long = "cache-batch-key-order", value_name = "ORDER")]
    pub cache_batch_key_order: Option<String>,

    /// Override the batch failure policy (partial|all_or_nothing).
    #[arg(long = "cache-batch-failure-policy", value_name = "POLICY")]
    pub cache_batch_failure_policy: Option<String>,

    /// Toggle coalescing of concurrent misses on one key.
    #[arg(
        long = "cache-coalesce-misses",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_coalesce_misses: Option<bool>,

    /// Override the upstream API base URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub upstream_base_url: Option<String>,

    /// Skip TLS certificate validation toward upstream (insecure).
    #[arg(
        long = "upstream-accept-invalid-certs",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub upstream_accept_invalid_certs: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidateArgs {
    #[command(flatten)]
    pub store: StoreOverrides,

    /// Cache keys to delete, e.g. `posts` or `user_3`.
    #[arg(value_name = "KEY", required = true, num_args = 1..)]
    pub keys: Vec<String>,
}

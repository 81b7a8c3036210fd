use std::{process, sync::Arc};

use postproxy::{
    application::{AppError, ProxyService},
    cache::{CacheConfig, CacheKey, CacheStore, Invalidator, MemoryStore, RedisStore},
    config::{self, StoreBackend},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
    upstream::{UpstreamClient, UpstreamConfig},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Invalidate(args) => run_invalidate(settings, args).await,
    }
}

async fn init_store(settings: &config::CacheSettings) -> Result<Arc<dyn CacheStore>, AppError> {
    match settings.backend {
        StoreBackend::Redis => {
            let url = settings.redis_url.as_deref().ok_or_else(|| {
                AppError::from(InfraError::configuration("cache.redis_url is required"))
            })?;
            let store = RedisStore::connect(url)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("using the in-process memory store; cache entries are not shared");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = init_store(&settings.cache).await?;

    let upstream = UpstreamClient::new(&UpstreamConfig {
        base_url: settings.upstream.base_url.clone(),
        accept_invalid_certs: settings.upstream.accept_invalid_certs,
    })
    .map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to build upstream client: {err}"
        )))
    })?;

    let service = ProxyService::new(
        store,
        Arc::new(upstream),
        CacheConfig::from(&settings.cache),
    );
    let router = http::build_router(HttpState {
        service: Arc::new(service),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        addr = %settings.server.addr,
        upstream = %settings.upstream.base_url,
        "postproxy listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!("postproxy stopped");
    Ok(())
}

async fn run_invalidate(
    settings: config::Settings,
    args: config::InvalidateArgs,
) -> Result<(), AppError> {
    let store = init_store(&settings.cache).await?;
    let invalidator = Invalidator::new(store);

    for raw in &args.keys {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::validation("cache key must not be empty"));
        }
        invalidator
            .invalidate(&CacheKey::from_raw(raw))
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

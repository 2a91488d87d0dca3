//! pngpress - a caching front end for lossy PNG compression.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pngpress::{
    config::Config,
    fetch::RemoteFetcher,
    server::{create_router, RouterConfig},
    service::CompressService,
    store::OriginalStore,
    SubprocessEngine,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Originals: {}", config.originals_dir);
    info!(
        "  Engine: {} (timeout {}s)",
        config.engine, config.engine_timeout_secs
    );
    info!(
        "  Cache: {} variants, originals up to {} bytes",
        config.cache_variants, config.max_upload_bytes
    );
    info!(
        "  Admission: {} page / {} image",
        config.page_concurrency, config.image_concurrency
    );

    // Ensure the shard directory exists before the store touches it
    if let Err(e) = tokio::fs::create_dir_all(&config.originals_dir).await {
        error!(
            "Failed to create originals directory '{}': {}",
            config.originals_dir, e
        );
        return ExitCode::FAILURE;
    }

    // Create the original store
    let originals = Arc::new(OriginalStore::with_max_bytes(
        &config.originals_dir,
        config.max_upload_bytes,
    ));

    // Create the compression engine
    let engine = SubprocessEngine::with_program(&config.engine)
        .with_timeout(Duration::from_secs(config.engine_timeout_secs));

    // Create the remote fetcher
    let fetcher = match RemoteFetcher::new(
        config.max_upload_bytes,
        Duration::from_millis(config.fetch_timeout_ms),
    ) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Create the compression service
    let service = CompressService::with_cache_capacity(
        originals,
        engine,
        fetcher,
        config.cache_variants,
    )
    .with_max_dimension(config.max_dimension);

    // Build router configuration
    let router_config = build_router_config(&config);

    // Create router
    let router = create_router(service, router_config);

    // Bind and serve
    let addr = config.bind_address();

    info!("Server listening on http://{}", addr);
    info!("  curl http://{}/health", addr);
    info!(
        "  curl -F file=@image.png -F strength=40 http://{}/compress",
        addr
    );

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pngpress=debug,tower_http=debug"
    } else {
        "pngpress=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_concurrency(config.page_concurrency, config.image_concurrency)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

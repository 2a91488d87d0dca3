//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health          - Health check
//! POST /compress   - Submit an image for compression (page endpoint)
//! GET  /compressed - Retrieve compressed bytes (image endpoint)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pngpress::server::{create_router, RouterConfig};
//!
//! let router = create_router(service, RouterConfig::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    compress_handler, compressed_handler, health_handler, AppState, MAX_FILE_FIELD,
};
use crate::engine::CompressionEngine;
use crate::service::CompressService;

/// Default admission ceiling for the page (submit) endpoint.
pub const DEFAULT_PAGE_CONCURRENCY: u32 = 2;

/// Default admission ceiling for the image (retrieval) endpoint.
pub const DEFAULT_IMAGE_CONCURRENCY: u32 = 2;

/// Slack on top of the file field ceiling for multipart framing and the
/// small text fields.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Maximum concurrent requests on the submit endpoint
    pub page_concurrency: u32,

    /// Maximum concurrent requests on the retrieval endpoint
    pub image_concurrency: u32,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a configuration with the default ceilings.
    pub fn new() -> Self {
        Self {
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            image_concurrency: DEFAULT_IMAGE_CONCURRENCY,
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set the per-endpoint admission ceilings.
    pub fn with_concurrency(mut self, pages: u32, images: u32) -> Self {
        self.page_concurrency = pages;
        self.image_concurrency = images;
        self
    }

    /// Set specific allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// Wires the compression service behind the two admission-controlled
/// endpoints, applies the multipart body limit, CORS, and optional
/// request tracing.
pub fn create_router<E>(service: CompressService<E>, config: RouterConfig) -> Router
where
    E: CompressionEngine + 'static,
{
    let state = AppState::new(service, config.page_concurrency, config.image_concurrency);

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/compress", post(compress_handler::<E>))
        .route("/compressed", get(compressed_handler::<E>))
        .layer(DefaultBodyLimit::max(MAX_FILE_FIELD + BODY_LIMIT_SLACK))
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer from the configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST];

    match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(methods)
                .allow_headers([CONTENT_TYPE])
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any),
    }
}

// =============================================================================
// Tests
// =============================================================================

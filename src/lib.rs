//! # pngpress
//!
//! A caching orchestration service for lossy PNG compression.
//!
//! This library sits in front of an out-of-process compression engine
//! (pngloss by default) and makes sure the expensive work happens at most
//! once per unique (image content, parameters) pair. Originals are
//! content-addressed by their SHA-224 digest and persisted to a sharded
//! on-disk store; compressed variants live in a small in-memory cache.
//!
//! ## Features
//!
//! - **Content addressing**: Originals are stored and retrieved by digest,
//!   so identical uploads never occupy two shard files
//! - **Variant caching**: Compressed results are cached per (digest, params)
//!   pair and served without re-invoking the engine
//! - **Three input channels**: Direct upload, digest of a stored original,
//!   or a remote URL fetched with a strict timeout and no redirects
//! - **Admission control**: Each endpoint class admits a bounded number of
//!   concurrent requests and rejects the rest immediately
//! - **Dimension guard**: Declared image dimensions are checked from the
//!   header alone before any pixel data is touched
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`digest`] - SHA-224 content addressing and shard arithmetic
//! - [`params`] - Validated compression parameters
//! - [`store`] - On-disk original store and in-memory variant cache
//! - [`engine`] - Subprocess compression engine behind a trait
//! - [`fetch`] - Remote URL fetching with size and time limits
//! - [`service`] - The compression pipeline tying the above together
//! - [`admission`] - Per-endpoint concurrency ceilings
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pngpress::{
//!     create_router, CompressService, OriginalStore, RemoteFetcher, RouterConfig,
//!     SubprocessEngine,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let originals = Arc::new(OriginalStore::new("originals"));
//!     let engine = SubprocessEngine::new();
//!     let fetcher = RemoteFetcher::new(5 * 1024 * 1024, Duration::from_secs(1)).unwrap();
//!
//!     let service = CompressService::new(originals, engine, fetcher);
//!     let router = create_router(service, RouterConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod admission;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod params;
pub mod server;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use admission::{AdmissionController, AdmissionPermit};
pub use config::Config;
pub use digest::{shard_file_name, shard_path, Digest, DIGEST_SIZE, SHARD_COUNT};
pub use engine::{
    CompressionEngine, SubprocessEngine, DEFAULT_ENGINE_PROGRAM, DEFAULT_ENGINE_TIMEOUT_SECS,
};
pub use error::{CompressError, EngineError, FetchError, ParamError, StoreError};
pub use fetch::{RemoteFetcher, DEFAULT_FETCH_TIMEOUT};
pub use params::{CompressionParams, BLEED_NONE, BLEED_STANDARD, MAX_BLEED, MAX_STRENGTH};
pub use server::{
    create_router, AppState, CompressResponse, ErrorResponse, HealthResponse, RouterConfig,
    VariantQueryParams,
};
pub use service::{
    CompressOutcome, CompressRequest, CompressService, ImageInput, DEFAULT_MAX_DIMENSION,
};
pub use store::{
    CompressedCache, OriginalStore, VariantKey, DEFAULT_MAX_ORIGINAL_BYTES,
    DEFAULT_VARIANT_CACHE_CAPACITY,
};

//! Test utilities for integration tests.
//!
//! This module provides a mock compression engine, PNG fixtures, and
//! helpers for building routers and multipart requests.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use bytes::Bytes;
use image::ImageFormat;

use pngpress::engine::CompressionEngine;
use pngpress::error::EngineError;
use pngpress::fetch::RemoteFetcher;
use pngpress::params::CompressionParams;
use pngpress::service::CompressService;
use pngpress::store::OriginalStore;
use pngpress::{create_router, RouterConfig};

// =============================================================================
// Mock Engine with Invocation Tracking
// =============================================================================

/// A mock compression engine that counts invocations and produces
/// deterministic output derived from its input and parameters.
///
/// This is useful for verifying cache behavior: identical requests must
/// not re-invoke the engine.
#[derive(Clone, Default)]
pub struct MockEngine {
    calls: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompressionEngine for MockEngine {
    async fn compress(
        &self,
        original: Bytes,
        params: &CompressionParams,
    ) -> Result<Bytes, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = format!(
            "s{}b{}p{}:",
            params.strength(),
            params.bleed(),
            params.strip() as u8
        )
        .into_bytes();
        out.extend_from_slice(&original[..original.len().min(16)]);
        Ok(Bytes::from(out))
    }
}

/// An engine that always fails, for exercising the 5xx path.
#[derive(Clone, Default)]
pub struct FailingEngine;

#[async_trait]
impl CompressionEngine for FailingEngine {
    async fn compress(
        &self,
        _original: Bytes,
        _params: &CompressionParams,
    ) -> Result<Bytes, EngineError> {
        Err(EngineError::Failed {
            status: 1,
            stderr: "synthetic failure".to_string(),
        })
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build a router backed by an original store rooted at `dir`.
pub fn build_router<E>(dir: &Path, engine: E) -> Router
where
    E: CompressionEngine + 'static,
{
    build_router_with_config(dir, engine, RouterConfig::default().with_tracing(false))
}

/// Build a router with an explicit configuration.
pub fn build_router_with_config<E>(dir: &Path, engine: E, config: RouterConfig) -> Router
where
    E: CompressionEngine + 'static,
{
    let originals = Arc::new(OriginalStore::new(dir));
    let fetcher = RemoteFetcher::new(5 * 1024 * 1024, Duration::from_secs(1)).unwrap();
    let service = CompressService::new(originals, engine, fetcher);
    create_router(service, config)
}

/// Build a router with an explicit variant cache capacity.
pub fn build_router_with_capacity<E>(dir: &Path, engine: E, capacity: usize) -> Router
where
    E: CompressionEngine + 'static,
{
    let originals = Arc::new(OriginalStore::new(dir));
    let fetcher = RemoteFetcher::new(5 * 1024 * 1024, Duration::from_secs(1)).unwrap();
    let service = CompressService::with_cache_capacity(originals, engine, fetcher, capacity);
    create_router(service, RouterConfig::default().with_tracing(false))
}

// =============================================================================
// Test PNG Creation
// =============================================================================

/// Create a test PNG image of the given dimensions.
pub fn make_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    });

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

// =============================================================================
// Multipart Request Building
// =============================================================================

const BOUNDARY: &str = "pngpress-test-boundary";

/// Assemble a multipart/form-data body from (name, value) parts.
///
/// The `file` part carries a filename and a content type; every other
/// part is plain text.
pub fn multipart_body(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        if *name == "file" {
            body.extend_from_slice(
                b"Content-Disposition: form-data; name=\"file\"; filename=\"image.png\"\r\n",
            );
            body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        } else {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
        }
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Build a `POST /compress` request from multipart parts.
pub fn compress_request(parts: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/compress")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Build a `GET /compressed` request for a digest and parameter tuple.
pub fn variant_request(sum224: &str, strength: u8, bleed: u16, strip: bool) -> Request<Body> {
    Request::builder()
        .uri(format!(
            "/compressed?sum224={}&strength={}&bleed={}&strip={}",
            sum224, strength, bleed, strip as u8
        ))
        .body(Body::empty())
        .unwrap()
}

//! API integration tests for compression submission and retrieval.
//!
//! Tests verify:
//! - The full upload -> compress -> retrieve flow
//! - Parameter validation before any pipeline work
//! - Error cases (missing input, bad digest text, unknown digest,
//!   oversized dimensions, non-PNG input, engine failure)
//! - Admission control (immediate 503 at the ceiling)
//! - HTTP response codes and headers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use pngpress::digest::Digest;
use pngpress::RouterConfig;

use super::test_utils::{
    build_router, build_router_with_config, compress_request, make_png, variant_request,
    FailingEngine, MockEngine,
};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(dir.path(), MockEngine::new());

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

// =============================================================================
// Submission Flow
// =============================================================================

#[tokio::test]
async fn test_compress_upload_success() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let png = make_png(40, 40);
    let request = compress_request(&[
        ("file", &png),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["sum224"], Digest::of(&png).to_base64());
    assert_eq!(json["strength"], 10);
    assert_eq!(json["bleed"], 2);
    assert_eq!(json["strip"], false);
    assert_eq!(json["width"], 40);
    assert_eq!(json["height"], 40);
    assert_eq!(json["original_size"], png.len());
    assert_eq!(json["cache_hit"], false);
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_compress_then_retrieve_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let png = make_png(40, 40);
    let request = compress_request(&[
        ("file", &png),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Retrieve the bytes for the same (digest, params) tuple.
    let sum224 = Digest::of(&png).to_base64();
    let response = router
        .oneshot(variant_request(&sum224, 10, 2, false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/png"
    );
    assert_eq!(response.headers().get("x-cache-hit").unwrap(), "true");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.starts_with(b"s10b2p0:"));

    // The cached variant was served without re-invoking the engine.
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_resubmit_by_digest() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let png = make_png(40, 40);
    let request = compress_request(&[
        ("file", &png),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);
    router.clone().oneshot(request).await.unwrap();

    // Same content referenced by digest, different parameters: the
    // original is read back from disk and re-compressed.
    let sum224 = Digest::of(&png).to_base64();
    let request = compress_request(&[
        ("sum224", sum224.as_bytes()),
        ("strength", b"40"),
        ("bleed", b"2"),
        ("strip", b"1"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["strength"], 40);
    assert_eq!(json["strip"], true);
    assert_eq!(json["cache_hit"], false);
    assert_eq!(engine.calls(), 2);
}

// =============================================================================
// Parameter Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_strength_rejected_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let png = make_png(40, 40);
    let request = compress_request(&[
        ("file", &png),
        ("strength", b"86"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "invalid_parameters");

    // Validation failed before the pipeline ran.
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_missing_parameter_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(dir.path(), MockEngine::new());

    let png = make_png(40, 40);
    let request = compress_request(&[("file", &png), ("strength", b"10"), ("strip", b"0")]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_input_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(dir.path(), MockEngine::new());

    let request = compress_request(&[("strength", b"10"), ("bleed", b"2"), ("strip", b"0")]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "missing_input");
}

// =============================================================================
// Digest Errors
// =============================================================================

#[tokio::test]
async fn test_malformed_digest_text_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(dir.path(), MockEngine::new());

    let request = compress_request(&[
        ("sum224", b"not valid base64url!!"),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "bad_digest");
}

#[tokio::test]
async fn test_unknown_digest_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let sum224 = Digest::of(b"never stored").to_base64();
    let request = compress_request(&[
        ("sum224", sum224.as_bytes()),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "unknown_sum");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_retrieval_requires_digest() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(dir.path(), MockEngine::new());

    let request = Request::builder()
        .uri("/compressed?strength=10&bleed=2&strip=0")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Input Guards
// =============================================================================

#[tokio::test]
async fn test_oversized_dimensions_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    // A thin strip: tiny file, but the declared width breaks the bound.
    let png = make_png(3001, 1);
    let request = compress_request(&[
        ("file", &png),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "png_too_large");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_non_png_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let request = compress_request(&[
        ("file", b"this is not a png"),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "bad_png");
    assert_eq!(engine.calls(), 0);
}

// =============================================================================
// Engine Failure
// =============================================================================

#[tokio::test]
async fn test_engine_failure_maps_to_500() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(dir.path(), FailingEngine);

    let png = make_png(40, 40);
    let request = compress_request(&[
        ("file", &png),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "compression_failed");
}

// =============================================================================
// Admission Control
// =============================================================================

#[tokio::test]
async fn test_submit_rejected_at_admission_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let config = RouterConfig::default()
        .with_concurrency(0, 0)
        .with_tracing(false);
    let engine = MockEngine::new();
    let router = build_router_with_config(dir.path(), engine.clone(), config);

    let png = make_png(40, 40);
    let request = compress_request(&[
        ("file", &png),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ]);

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "server_busy");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_retrieval_rejected_at_admission_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let config = RouterConfig::default()
        .with_concurrency(0, 0)
        .with_tracing(false);
    let router = build_router_with_config(dir.path(), MockEngine::new(), config);

    let sum224 = Digest::of(b"anything").to_base64();
    let response = router
        .oneshot(variant_request(&sum224, 10, 2, false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

//! Variant cache behavior across requests and process restarts.
//!
//! Tests verify:
//! - Identical submissions share one engine invocation
//! - Distinct parameters produce distinct variants
//! - A cold cache recomputes from the on-disk original
//! - The fixed-capacity cache overwrites the oldest variant

use axum::http::StatusCode;
use http_body_util::BodyExt;
use tower::ServiceExt;

use pngpress::digest::Digest;

use super::test_utils::{
    build_router, build_router_with_capacity, compress_request, make_png, variant_request,
    MockEngine,
};

#[tokio::test]
async fn test_identical_submissions_share_one_engine_call() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let png = make_png(40, 40);
    let parts: &[(&str, &[u8])] = &[
        ("file", &png),
        ("strength", b"10"),
        ("bleed", b"2"),
        ("strip", b"0"),
    ];

    let first = router.clone().oneshot(compress_request(parts)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router.oneshot(compress_request(parts)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    let body = second.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["cache_hit"], true);
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_distinct_params_produce_distinct_variants() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let png = make_png(40, 40);
    for strength in [b"10", b"20"] {
        let response = router
            .clone()
            .oneshot(compress_request(&[
                ("file", &png),
                ("strength", strength),
                ("bleed", b"2"),
                ("strip", b"0"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(engine.calls(), 2);

    // Each parameter tuple retrieves its own bytes.
    let sum224 = Digest::of(&png).to_base64();
    let first = router
        .clone()
        .oneshot(variant_request(&sum224, 10, 2, false))
        .await
        .unwrap();
    let second = router
        .oneshot(variant_request(&sum224, 20, 2, false))
        .await
        .unwrap();

    let first_body = first.into_body().collect().await.unwrap().to_bytes();
    let second_body = second.into_body().collect().await.unwrap().to_bytes();
    assert!(first_body.starts_with(b"s10b2p0:"));
    assert!(second_body.starts_with(b"s20b2p0:"));
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_cold_cache_recomputes_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let png = make_png(40, 40);
    let sum224 = Digest::of(&png).to_base64();

    // Populate the original store through one router instance.
    {
        let router = build_router(dir.path(), MockEngine::new());
        let response = router
            .oneshot(compress_request(&[
                ("file", &png),
                ("strength", b"10"),
                ("bleed", b"2"),
                ("strip", b"0"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // A fresh instance over the same directory has an empty variant
    // cache but finds the original on disk.
    let engine = MockEngine::new();
    let router = build_router(dir.path(), engine.clone());

    let response = router
        .oneshot(variant_request(&sum224, 10, 2, false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-cache-hit").unwrap(), "false");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_cache_overwrites_oldest_variant() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new();
    let router = build_router_with_capacity(dir.path(), engine.clone(), 2);

    let png = make_png(40, 40);
    let sum224 = Digest::of(&png).to_base64();

    // Fill the two slots and push one more variant in.
    for strength in [b"10", b"20", b"30"] {
        let response = router
            .clone()
            .oneshot(compress_request(&[
                ("file", &png),
                ("strength", strength),
                ("bleed", b"2"),
                ("strip", b"0"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(engine.calls(), 3);

    // The first variant was overwritten and must be recomputed.
    let response = router
        .clone()
        .oneshot(variant_request(&sum224, 10, 2, false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-cache-hit").unwrap(), "false");
    assert_eq!(engine.calls(), 4);

    // The newest variant is still resident.
    let response = router
        .oneshot(variant_request(&sum224, 30, 2, false))
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-cache-hit").unwrap(), "true");
    assert_eq!(engine.calls(), 4);
}

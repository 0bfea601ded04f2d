//! API integration tests for aureo-server.
//!
//! These tests drive the router with realistic multipart requests, covering
//! the seal/detect flow through the REST endpoints.

use std::io::Cursor;
use std::sync::mpsc;
use std::time::Duration;

use aureo_server::{create_router_with_config, create_router_with_state, AppState, Config};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";

/// Helper to create a multipart body with a file and text fields
fn multipart(content: &[u8], file_type: &str, fields: &[(&str, &str)]) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"photo.png\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");

    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn png(image: RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn gradient(width: u32, height: u32) -> Vec<u8> {
    png(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 120])
    }))
}

fn test_config() -> Config {
    Config {
        seal_timeout_ms: 5_000,
        workers: 2,
        queue_capacity: 8,
        ..Config::default()
    }
}

/// Build the test router with a generous detection budget
fn create_test_app() -> Router {
    create_router_with_config(&test_config())
}

async fn post(app: Router, uri: &str, (content_type, body): (String, Vec<u8>)) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let (status, json) = get(create_test_app(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "aureo-server");
    assert_eq!(json["workers"], 2);
    assert_eq!(json["metrics"]["embeds"], 0);
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let (status, json) = get(create_test_app(), "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

// ============================================================================
// Seal Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_seal_endpoint_returns_sealed_image() {
    let source = gradient(120, 90);
    let (status, json) = post(
        create_test_app(),
        "/seal",
        multipart(&source, "image/png", &[("author_id", "tester")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["seal_id"].as_str().unwrap().starts_with("MBH-"));
    assert_eq!(json["author_id"], "tester");
    assert_eq!(json["width"], 120);
    assert_eq!(json["height"], 90);
    assert_eq!(json["record"]["id"], json["seal_id"]);

    let sealed = BASE64.decode(json["sealed_image"].as_str().unwrap()).unwrap();
    let decoded = image::load_from_memory(&sealed).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (120, 90));
    assert_ne!(sealed, source);
}

#[tokio::test]
async fn test_seal_missing_author_is_rejected() {
    let (status, json) = post(
        create_test_app(),
        "/seal",
        multipart(&gradient(64, 64), "image/png", &[]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_seal_anchor_out_of_range_is_rejected() {
    let (status, _) = post(
        create_test_app(),
        "/seal",
        multipart(
            &gradient(64, 64),
            "image/png",
            &[("author_id", "tester"), ("anchor_x", "1.5")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_seal_garbage_image_is_unreadable() {
    let (status, json) = post(
        create_test_app(),
        "/seal",
        multipart(b"not an image", "application/octet-stream", &[("author_id", "a")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "UNREADABLE_IMAGE");
}

#[tokio::test]
async fn test_seal_rejects_unsupported_content_type() {
    let (status, _) = post(
        create_test_app(),
        "/seal",
        multipart(&gradient(64, 64), "video/mp4", &[("author_id", "a")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_seal_file_over_limit_is_rejected() {
    let config = Config {
        max_file_size_mb: 0,
        ..test_config()
    };
    let (status, json) = post(
        create_router_with_config(&config),
        "/seal",
        multipart(&gradient(64, 64), "image/png", &[("author_id", "a")]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
}

// ============================================================================
// Detect Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_seal_then_detect_roundtrip() {
    let app = create_test_app();

    let (_, sealed) = post(
        app.clone(),
        "/seal",
        multipart(
            &gradient(200, 200),
            "image/png",
            &[("author_id", "tester"), ("anchor_x", "0.25"), ("anchor_y", "0.75")],
        ),
    )
    .await;
    let image = BASE64.decode(sealed["sealed_image"].as_str().unwrap()).unwrap();

    let (status, json) = post(app.clone(), "/detect", multipart(&image, "image/png", &[])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "found");
    assert_eq!(json["score"], 10);
    assert_eq!(json["result"]["found"], true);
    assert_eq!(json["firmaVisual"]["found"], true);
    assert_eq!(json["firmaVisual"]["hash"], json["result"]["hash"]);
    assert_eq!(json["result"]["hash"], sealed["block_hash"]);

    let x = json["result"]["center"]["x"].as_i64().unwrap();
    let y = json["result"]["center"]["y"].as_i64().unwrap();
    assert!((x - 50).abs() <= 1, "x = {}", x);
    assert!((y - 150).abs() <= 1, "y = {}", y);

    let (_, health) = get(app, "/health").await;
    assert_eq!(health["metrics"]["embeds"], 1);
    assert_eq!(health["metrics"]["seals_found"], 1);
}

#[tokio::test]
async fn test_detect_unsealed_image_not_found() {
    let flat = png(RgbImage::from_pixel(80, 80, Rgb([30, 30, 30])));
    let (status, json) = post(
        create_test_app(),
        "/detect",
        multipart(&flat, "image/png", &[("exif_score", "6")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "not_found");
    assert_eq!(json["score"], 6);
    assert!(json.get("firmaVisual").is_none());
}

#[tokio::test]
async fn test_detect_garbage_is_bad_request() {
    let (status, json) = post(
        create_test_app(),
        "/detect",
        multipart(b"\x00\x01\x02", "application/octet-stream", &[]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "UNREADABLE_IMAGE");
}

#[tokio::test]
async fn test_detect_missing_file_field() {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"exif_score\"\r\n\r\n3\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let (status, _) = post(
        create_test_app(),
        "/detect",
        (
            format!("multipart/form-data; boundary={}", BOUNDARY),
            body.into_bytes(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detect_over_budget_is_inconclusive() {
    let config = Config {
        seal_timeout_ms: 0,
        ..test_config()
    };
    let (status, json) = post(
        create_router_with_config(&config),
        "/detect",
        multipart(&gradient(1600, 1200), "image/png", &[]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "inconclusive");
    assert!(json["reason"].is_string());
    assert!(json.get("result").is_none());
}

#[tokio::test]
async fn test_detect_queue_full_is_service_unavailable() {
    let config = Config {
        workers: 1,
        queue_capacity: 1,
        ..test_config()
    };
    let state = AppState::new(&config);

    // Park the only worker, then fill the single queue slot.
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let busy = state
        .pool
        .submit(move |_| {
            started_tx.send(()).unwrap();
            release_rx.recv().ok();
        })
        .unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let queued = state.pool.submit(|_| ()).unwrap();

    let app = create_router_with_state(&config, state);
    let (status, json) = post(
        app.clone(),
        "/detect",
        multipart(&gradient(64, 64), "image/png", &[]),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");

    let (status, json) = get(app.clone(), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["ready"], false);

    release_tx.send(()).unwrap();
    busy.wait(Duration::from_secs(5)).unwrap();
    queued.wait(Duration::from_secs(5)).unwrap();
}

//! HTTP surface integration tests, using fake detection/embedding
//! capabilities so no model files are required.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use glance_core::{
    DetectError, EmbedError, Embedding, FaceDetector, FaceEmbedder, FaceRegion, ThresholdMatcher,
};
use glance_store::{FaceCache, IdentityStore};
use glanced::{routes, AppState};
use http_body_util::BodyExt;
use image::RgbImage;
use tower::ServiceExt;

struct OneFaceDetector;

impl FaceDetector for OneFaceDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<FaceRegion>, DetectError> {
        Ok(vec![FaceRegion {
            x: 8,
            y: 8,
            width: 16,
            height: 16,
            confidence: 0.92,
        }])
    }
}

/// Embeds every crop to the same fixed vector, so registering twice always
/// collides on the content hash.
struct FixedEmbedder;

impl FaceEmbedder for FixedEmbedder {
    fn embed(&self, _face: &RgbImage) -> Result<Embedding, EmbedError> {
        Ok(Embedding::new(vec![1.0, 0.0, 0.0]))
    }
}

async fn test_app() -> axum::Router {
    let state = AppState {
        detector: Arc::new(OneFaceDetector),
        embedder: Arc::new(FixedEmbedder),
        matcher: Arc::new(ThresholdMatcher::default()),
        store: IdentityStore::open_in_memory().await.unwrap(),
        cache: Arc::new(FaceCache::new()),
        cache_ttl: Duration::from_secs(60),
    };
    routes::router(state, 20)
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(64, 64, image::Rgb([100, 110, 120]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

const BOUNDARY: &str = "glance-test-boundary";

fn multipart_upload(uri: &str, file: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"frame.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = test_app().await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn detect_returns_face_regions() {
    let app = test_app().await;

    let response = app
        .oneshot(multipart_upload("/api/recognition/detect", &png_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["faces"].as_array().unwrap().len(), 1);
    assert_eq!(body["faces"][0]["x"], 8);
}

#[tokio::test]
async fn detect_rejects_undecodable_upload() {
    let app = test_app().await;

    let response = app
        .oneshot(multipart_upload("/api/recognition/detect", b"not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_then_recognize_roundtrip() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(multipart_upload(
            "/api/recognition/register?name=Alice",
            &png_bytes(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let registered = json_body(response).await;
    assert_eq!(registered["name"], "Alice");

    let response = app
        .oneshot(multipart_upload("/api/recognition/recognize", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["recognized_faces"][0]["name"], "Alice");
    assert_eq!(body["recognized_faces"][0]["id"], registered["id"]);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(multipart_upload(
            "/api/recognition/register?name=Alice",
            &png_bytes(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The fake embedder maps every crop to the same vector, so this is the
    // byte-identical-embedding case.
    let response = app
        .oneshot(multipart_upload(
            "/api/recognition/register?name=AliceAgain",
            &png_bytes(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_without_file_is_bad_request() {
    let app = test_app().await;

    let body = format!("--{BOUNDARY}--\r\n");
    let request = Request::post("/api/recognition/register?name=Alice")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

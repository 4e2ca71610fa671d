use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;
use tower::util::ServiceExt;

use crate::config::QlogConfig;
use crate::server::build_app;

fn build_test_app(dir: &tempfile::TempDir) -> Router {
    build_app(QlogConfig {
        log_root: dir.path().to_path_buf(),
        // Small chunks so multi-chunk scans are exercised over HTTP too.
        buffer_capacity: 8,
        ..QlogConfig::default()
    })
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn returns_last_lines_newest_first() {
    let dir = tempdir().expect("tmp");
    fs::write(dir.path().join("app.log"), "a\nb\nc\n").expect("write");
    let app = build_test_app(&dir);

    let (status, body) = get(&app, "/queryLog?relativePath=app.log&count=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!(["c", "b"]));
    assert_eq!(body["metadata"]["continuationToken"]["token"], "2");
}

#[tokio::test]
async fn continuation_token_pages_through_history() {
    let dir = tempdir().expect("tmp");
    fs::write(dir.path().join("app.log"), "a\nb\nc\n").expect("write");
    let app = build_test_app(&dir);

    let (_, first) = get(&app, "/queryLog?relativePath=app.log&count=2").await;
    let token = first["metadata"]["continuationToken"]["token"]
        .as_str()
        .expect("token")
        .to_string();

    let (status, second) = get(
        &app,
        &format!("/queryLog?relativePath=app.log&count=1&continuationToken={token}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"], serde_json::json!(["a"]));
    assert_eq!(second["metadata"], Value::Null);
}

#[tokio::test]
async fn count_defaults_to_one_thousand() {
    let dir = tempdir().expect("tmp");
    fs::write(dir.path().join("app.log"), "a\nb\nc\n").expect("write");
    let app = build_test_app(&dir);

    let (status, body) = get(&app, "/queryLog?relativePath=app.log").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!(["c", "b", "a"]));
    assert_eq!(body["metadata"], Value::Null);
}

#[tokio::test]
async fn filter_narrows_the_result() {
    let dir = tempdir().expect("tmp");
    fs::write(
        dir.path().join("app.log"),
        "INFO ready\nERROR disk full\nINFO ok\nERROR timeout\n",
    )
    .expect("write");
    let app = build_test_app(&dir);

    let (status, body) = get(&app, "/queryLog?relativePath=app.log&filter=ERROR").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        serde_json::json!(["ERROR timeout", "ERROR disk full"])
    );
}

#[tokio::test]
async fn start_skips_the_newest_lines() {
    let dir = tempdir().expect("tmp");
    fs::write(dir.path().join("app.log"), "a\nb\nc\nd\n").expect("write");
    let app = build_test_app(&dir);

    let (status, body) = get(&app, "/queryLog?relativePath=app.log&start=2&count=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!(["b"]));
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let dir = tempdir().expect("tmp");
    let app = build_test_app(&dir);

    let (status, body) = get(&app, "/queryLog?relativePath=absent.log").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().expect("message").contains("not found"));
}

#[tokio::test]
async fn out_of_range_count_is_rejected() {
    let dir = tempdir().expect("tmp");
    fs::write(dir.path().join("app.log"), "a\n").expect("write");
    let app = build_test_app(&dir);

    let (status, _) = get(&app, "/queryLog?relativePath=app.log&count=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/queryLog?relativePath=app.log&count=10001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/queryLog?relativePath=app.log&count=10000").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_continuation_token_is_rejected() {
    let dir = tempdir().expect("tmp");
    fs::write(dir.path().join("app.log"), "a\nb\n").expect("write");
    let app = build_test_app(&dir);

    let (status, body) = get(
        &app,
        "/queryLog?relativePath=app.log&continuationToken=bogus",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().expect("message").contains("token"));
}

#[tokio::test]
async fn stale_continuation_token_is_rejected() {
    let dir = tempdir().expect("tmp");
    fs::write(dir.path().join("app.log"), "a\nb\n").expect("write");
    let app = build_test_app(&dir);

    let (status, _) = get(
        &app,
        "/queryLog?relativePath=app.log&continuationToken=9999",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn paths_escaping_the_log_root_are_rejected() {
    let dir = tempdir().expect("tmp");
    let app = build_test_app(&dir);

    let (status, _) = get(&app, "/queryLog?relativePath=../secret.log").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/queryLog?relativePath=%2Fetc%2Fpasswd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_relative_path_is_rejected() {
    let dir = tempdir().expect("tmp");
    let app = build_test_app(&dir);

    let (status, _) = get(&app, "/queryLog?relativePath=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/queryLog").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn openapi_spec_served() {
    let dir = tempdir().expect("tmp");
    let app = build_test_app(&dir);

    let (status, body) = get(&app, "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/queryLog"].is_object());
}

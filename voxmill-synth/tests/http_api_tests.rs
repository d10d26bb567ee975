//! HTTP API integration tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

mod helpers;

use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use voxmill_synth::audio::io::encode_wav;
use voxmill_synth::{build_router, AppState};

use helpers::{failing_registry, sine, test_settings, FAIL_MARKER, PANIC_MARKER, TEST_SAMPLE_RATE};

async fn test_app(root: &Path) -> Router {
    let settings = test_settings(root);
    let registry = failing_registry(root).await;
    build_router(AppState::with_engines(settings, registry))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn encoded_tone(sample_rate: u32) -> String {
    let bytes = encode_wav(&sine(220.0, 0.4, 0.5, sample_rate)).unwrap();
    STANDARD.encode(bytes)
}

#[tokio::test]
async fn health_reports_module_and_engines() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "voxmill-synth");
    assert_eq!(body["engines"]["tts"], "xtts");
    assert_eq!(body["engines"]["vc"], "rvc");
    assert_eq!(body["loaded_engines"], json!(["tts_xtts"]));
}

#[tokio::test]
async fn tts_writes_a_served_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let (status, body) = post_json(&app, "/api/v1/tts", json!({ "text": "hello there" })).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["sample_rate"], TEST_SAMPLE_RATE);
    assert!(body["duration"].as_f64().unwrap() > 0.0);
    assert!(body["file_size"].as_u64().unwrap() > 44);
    assert_eq!(body["normalization"]["normalized"], true);

    let audio_url = body["audio_url"].as_str().unwrap();
    assert!(audio_url.starts_with("/outputs/tts_"));

    let response = app
        .clone()
        .oneshot(Request::builder().uri(audio_url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..4], b"RIFF");
}

#[tokio::test]
async fn tts_validation_errors_are_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    for body in [
        json!({ "text": "" }),
        json!({ "text": "   " }),
        json!({ "text": "hi", "speed": 5.0 }),
        json!({ "text": "hi", "language": "tlh" }),
        json!({ "speaker_id": "default" }),
    ] {
        let (status, response) = post_json(&app, "/api/v1/tts", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(response["error"]["code"], "VALIDATION_ERROR");
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn engine_failure_on_single_request_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let (status, body) = post_json(&app, "/api/v1/tts", json!({ "text": FAIL_MARKER })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "PROCESSING_FAILURE");

    let (status, body) = post_json(&app, "/api/v1/tts", json!({ "text": PANIC_MARKER })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "PROCESSING_FAILURE");
}

#[tokio::test]
async fn tts_listings() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let (status, body) = get(&app, "/api/v1/tts/speakers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["speakers"][0]["id"], "default");

    let (status, body) = get(&app, "/api/v1/tts/languages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], "xtts");
    assert!(body["languages"].as_array().unwrap().contains(&json!("zh")));
}

#[tokio::test]
async fn vc_converts_uploaded_audio() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let (status, body) = post_json(
        &app,
        "/api/v1/vc",
        json!({
            "source_audio": format!("data:audio/wav;base64,{}", encoded_tone(22050)),
            "target_speaker": "speaker_001",
            "preserve_pitch": false,
            "f0_method": "dio",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["audio_url"].as_str().unwrap().starts_with("/outputs/vc_"));
    assert_eq!(body["sample_rate"], TEST_SAMPLE_RATE);
    assert!((body["original_duration"].as_f64().unwrap() - 0.5).abs() < 1e-3);
    assert!(body["output_duration"].as_f64().unwrap() <= 0.5 + 1e-3);
}

#[tokio::test]
async fn vc_error_taxonomy() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;
    let audio = encoded_tone(TEST_SAMPLE_RATE);

    let (status, body) = post_json(
        &app,
        "/api/v1/vc",
        json!({ "source_audio": "***", "target_speaker": "default" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = post_json(
        &app,
        "/api/v1/vc",
        json!({ "source_audio": audio, "target_speaker": "default", "f0_method": "yin" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &app,
        "/api/v1/vc",
        json!({ "source_audio": audio, "target_speaker": "nobody" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn vc_speakers_and_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let (status, body) = get(&app, "/api/v1/vc/speakers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], "rvc");
    assert!(body["speakers"].as_array().unwrap().contains(&json!("speaker_003")));

    let (status, body) = get(&app, "/api/v1/profiles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profiles"][0]["id"], "default");

    let (status, body) = get(&app, "/api/v1/profiles/speaker_002").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["coloring"]["high"].as_f64().unwrap() as f32, 0.8);

    let (status, _) = get(&app, "/api/v1/profiles/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_job_lifecycle_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let (status, body) = post_json(
        &app,
        "/api/v1/batch/tts",
        json!({
            "items": [
                { "text": "first" },
                { "text": format!("second {}", FAIL_MARKER) },
                { "text": "third", "speed": 1.5 },
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "created");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/batch/jobs/{}", job_id);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    let job = loop {
        let (status, job) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        let completed = job["completed_items"].as_u64().unwrap();
        assert!(completed <= 3);
        assert_eq!(job["results"].as_array().unwrap().len() as u64, completed);
        if job["status"] == "completed" || job["status"] == "failed" {
            break job;
        }
        assert!(tokio::time::Instant::now() < deadline, "job did not finish");
        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    assert_eq!(job["status"], "completed");
    assert_eq!(job["total_items"], 3);
    assert_eq!(job["created_at"].as_str().unwrap().len(), 19);
    let statuses: Vec<&str> = job["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["completed", "failed", "completed"]);
    assert!(job["results"][1]["error"].is_string());
    assert!(job["results"][1].get("audio_url").is_none());

    let (status, list) = get(&app, "/api/v1/batch/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["jobs"][0]["job_id"], job_id.as_str());
}

#[tokio::test]
async fn batch_rejections_and_unknown_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let (status, _) = post_json(&app, "/api/v1/batch/tts", json!({ "items": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_many: Vec<Value> = (0..51).map(|i| json!({ "text": format!("item {}", i) })).collect();
    let (status, _) = post_json(&app, "/api/v1/batch/tts", json!({ "items": too_many })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/api/v1/batch/tts",
        json!({ "items": [{ "text": "a" }], "output_format": "mp3" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/api/v1/batch/jobs/00000000-0000-0000-0000-000000000000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = get(&app, "/api/v1/batch/jobs/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_event_stream_is_sse() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/batch/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/event-stream"));
}

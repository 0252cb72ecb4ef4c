//! Router integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeDelta, Utc};
use tempfile::TempDir;
use tower::ServiceExt;

use mfetch_api::{create_router, ApiConfig, AppState, ArtifactSweeper};
use mfetch_media::{
    ByteStream, FfmpegTranscoder, Id3Tagger, MediaError, MediaResult, StagingArea,
    ThumbnailFetcher, YtDlpBackend,
};
use mfetch_models::{ArtifactId, ArtifactRecord};
use mfetch_storage::ArtifactStore;
use mfetch_worker::{Collaborators, JobOrchestrator, PipelineSettings};

struct NoThumbnails;

#[async_trait]
impl ThumbnailFetcher for NoThumbnails {
    async fn open(&self, url: &str) -> MediaResult<ByteStream> {
        Err(MediaError::stage_io(format!("no thumbnail for {}", url)))
    }
}

async fn test_state(dir: &TempDir) -> AppState {
    let staging = StagingArea::create(dir.path().join("work")).await.unwrap();
    let store = ArtifactStore::open(dir.path().join("db.json"), dir.path().join("downloads"))
        .await
        .unwrap();
    let collaborators = Collaborators {
        backend: Arc::new(YtDlpBackend::default()),
        thumbnails: Arc::new(NoThumbnails),
        transcoder: Arc::new(FfmpegTranscoder::default()),
        tagger: Arc::new(Id3Tagger::new()),
    };
    let orchestrator = JobOrchestrator::new(
        collaborators,
        staging,
        Arc::new(store),
        PipelineSettings::default(),
    );
    AppState::from_orchestrator(ApiConfig::default(), orchestrator)
}

fn app(state: &AppState) -> Router {
    create_router(state.clone(), None)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let response = app(&state).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed_or_replaced() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let tagged = Request::builder()
        .uri("/health")
        .header("x-request-id", "edge-7f3a")
        .body(Body::empty())
        .unwrap();
    let response = app(&state).oneshot(tagged).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "edge-7f3a");

    let spoofed = Request::builder()
        .uri("/health")
        .header("x-request-id", "a b\tc")
        .body(Body::empty())
        .unwrap();
    let response = app(&state).oneshot(spoofed).await.unwrap();
    let minted = response.headers()["x-request-id"].to_str().unwrap();
    assert_ne!(minted, "a b\tc");
    assert!(uuid::Uuid::parse_str(minted).is_ok());
}

#[tokio::test]
async fn test_ready_endpoint() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let response = app(&state).oneshot(get("/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["index"]["status"], "ok");
}

#[tokio::test]
async fn test_ready_reports_corrupt_index() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;
    tokio::fs::write(dir.path().join("db.json"), "{ not json").await.unwrap();

    let response = app(&state).oneshot(get("/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["checks"]["index"]["status"], "error");
}

#[tokio::test]
async fn test_download_malformed_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let response = app(&state).oneshot(get("/downloads/not-an-id")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_download_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let uri = format!("/downloads/{}", ArtifactId::new());
    let response = app(&state).oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_streams_registered_artifact() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let record = ArtifactRecord::new("Great Song Live.mp3");
    tokio::fs::write(state.store.artifacts_dir().join(&record.filename), b"mp3-bytes")
        .await
        .unwrap();
    state.store.put(&record).await.unwrap();

    let response = app(&state).oneshot(get(&record.file_url())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(headers[header::CONTENT_LENGTH], "9");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("filename=\"Great Song Live.mp3\""));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"mp3-bytes");
}

#[tokio::test]
async fn test_download_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let record = ArtifactRecord::new("Gone_720p.mp4");
    state.store.put(&record).await.unwrap();

    let response = app(&state).oneshot(get(&record.file_url())).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_corrupt_index_is_server_error() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;
    tokio::fs::write(dir.path().join("db.json"), "[1, 2").await.unwrap();

    let uri = format!("/downloads/{}", ArtifactId::new());
    let response = app(&state).oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_sweeper_removes_expired_artifacts() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let mut expired = ArtifactRecord::new("Old.mp3");
    expired.created_at = Utc::now() - TimeDelta::hours(25);
    let fresh = ArtifactRecord::new("New.mp3");
    for record in [&expired, &fresh] {
        tokio::fs::write(state.store.artifacts_dir().join(&record.filename), b"x")
            .await
            .unwrap();
        state.store.put(record).await.unwrap();
    }

    let sweeper = ArtifactSweeper::new(
        Arc::clone(&state.store),
        state.staging.clone(),
        Duration::from_secs(3600),
    );
    let outcome = sweeper.run_once().await.unwrap();

    assert_eq!(outcome.artifacts.removed, 1);
    assert!(!state.store.artifacts_dir().join("Old.mp3").exists());
    assert!(state.store.artifacts_dir().join("New.mp3").exists());

    let response = app(&state).oneshot(get(&expired.file_url())).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app(&state).oneshot(get(&fresh.file_url())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir).await;

    let response = app(&state).oneshot(get("/db.json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

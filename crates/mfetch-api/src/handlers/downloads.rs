//! Artifact retrieval.

use std::path::Path;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use mfetch_models::ArtifactId;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Stream a finished artifact as an attachment.
///
/// Unknown or malformed ids and records whose file is gone answer 404.
pub async fn download_artifact(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Response> {
    let result = serve_artifact(&state, &id).await;
    metrics::record_artifact_download(match &result {
        Ok(_) => "served",
        Err(ApiError::NotFound(_)) => "not_found",
        Err(ApiError::Storage(e)) if e.is_not_found() => "not_found",
        Err(_) => "error",
    });
    result
}

async fn serve_artifact(state: &AppState, id: &str) -> ApiResult<Response> {
    let id = ArtifactId::parse(id).ok_or_else(|| ApiError::not_found(id))?;
    let record = state.store.get(&id).await?;
    let path = state.store.artifact_path(&record)?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(artifact_id = %id, path = %path.display(), "Artifact file is missing");
            return Err(ApiError::not_found(id.as_str()));
        }
        Err(e) => return Err(ApiError::internal(format!("cannot open artifact: {}", e))),
    };
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("cannot stat artifact: {}", e)))?
        .len();

    info!(artifact_id = %id, filename = %record.filename, bytes = length, "Serving artifact");

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&path))),
        (header::CONTENT_LENGTH, HeaderValue::from(length)),
        (header::CONTENT_DISPOSITION, content_disposition(&record.filename)?),
    ];

    Ok((StatusCode::OK, headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// `attachment` disposition carrying the stored filename.
///
/// The plain `filename` parameter gets an ASCII fallback, `filename*` the
/// exact UTF-8 name.
fn content_disposition(filename: &str) -> ApiResult<HeaderValue> {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value)
        .map_err(|e| ApiError::internal(format!("invalid disposition header: {}", e)))
}

//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the global Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "mfetch_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "mfetch_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "mfetch_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "mfetch_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "mfetch_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "mfetch_ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED: &str = "mfetch_ws_messages_received_total";

    // Artifact metrics
    pub const ARTIFACT_DOWNLOADS_TOTAL: &str = "mfetch_artifact_downloads_total";
    pub const ARTIFACTS_SWEPT_TOTAL: &str = "mfetch_artifacts_swept_total";
    pub const STAGING_FILES_PURGED_TOTAL: &str = "mfetch_staging_files_purged_total";
    pub const SWEEP_FAILURES_TOTAL: &str = "mfetch_sweep_failures_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record WebSocket connection.
pub fn record_ws_connection(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_CONNECTIONS_TOTAL, &labels).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(endpoint: &str, message_type: &str) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("type", message_type.to_string()),
    ];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Record WebSocket message received.
pub fn record_ws_message_received(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_MESSAGES_RECEIVED, &labels).increment(1);
}

/// Record an artifact retrieval attempt.
pub fn record_artifact_download(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::ARTIFACT_DOWNLOADS_TOTAL, &labels).increment(1);
}

/// Record the result of one sweep cycle.
pub fn record_sweep(artifacts_removed: usize, staging_purged: usize) {
    counter!(names::ARTIFACTS_SWEPT_TOTAL).increment(artifacts_removed as u64);
    counter!(names::STAGING_FILES_PURGED_TOTAL).increment(staging_purged as u64);
}

/// Record a sweep cycle that failed.
pub fn record_sweep_failure() {
    counter!(names::SWEEP_FAILURES_TOTAL).increment(1);
}

/// Sanitize path for metrics labels.
///
/// Artifact ids are replaced with `:id` so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/downloads/550e8400-e29b-41d4-a716-446655440000"),
            "/downloads/:id"
        );
        assert_eq!(sanitize_path("/downloads/not-an-id"), "/downloads/not-an-id");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}

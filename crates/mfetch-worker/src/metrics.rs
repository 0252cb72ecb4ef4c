//! Job metrics.

use metrics::{counter, histogram};
use mfetch_models::FormatType;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "mfetch_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "mfetch_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "mfetch_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "mfetch_job_duration_seconds";
    pub const FORMAT_LOOKUPS_TOTAL: &str = "mfetch_format_lookups_total";
}

pub fn record_job_started(format: FormatType) {
    let labels = [("format", format.as_str().to_string())];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(format: FormatType, duration_secs: f64) {
    let labels = [("format", format.as_str().to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_failed(format: FormatType, kind: &str) {
    let labels = [
        ("format", format.as_str().to_string()),
        ("kind", kind.to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_format_lookup(success: bool) {
    let labels = [("result", if success { "ok" } else { "error" }.to_string())];
    counter!(names::FORMAT_LOOKUPS_TOTAL, &labels).increment(1);
}

//! Structured job logging.
//!
//! Every line carries the job id and target format as fields, so a job can
//! be followed through the log with one filter.

use std::time::Duration;

use mfetch_models::{FormatType, JobId};
use tracing::{error, info, warn, Span};

use crate::error::WorkerError;

/// Logger bound to one download job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    format: FormatType,
}

impl JobLogger {
    pub fn new(job_id: &JobId, format: FormatType) -> Self {
        Self {
            job_id: job_id.clone(),
            format,
        }
    }

    pub fn log_start(&self, url: &str) {
        info!(job_id = %self.job_id, format = %self.format, url, "Job started");
    }

    /// One remote stream landed in staging.
    pub fn log_stream_fetched(&self, stream: &str, rendition_id: &str, bytes: u64) {
        info!(
            job_id = %self.job_id,
            format = %self.format,
            stream,
            rendition_id,
            bytes,
            "Stream fetched"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, format = %self.format, "{}", message);
    }

    pub fn log_failure(&self, err: &WorkerError) {
        error!(
            job_id = %self.job_id,
            format = %self.format,
            error_kind = err.kind(),
            error = %err,
            "Job failed"
        );
    }

    pub fn log_completion(&self, filename: &str, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            format = %self.format,
            filename,
            elapsed_ms = elapsed.as_millis() as u64,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn format(&self) -> FormatType {
        self.format
    }

    /// Span to instrument the job future with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, format = %self.format)
    }
}

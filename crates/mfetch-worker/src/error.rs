//! Worker error types.

use mfetch_models::SourceUrlError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing formatType for download")]
    MissingFormat,

    #[error("Quality {0} is not available for this source")]
    QualityUnavailable(String),

    #[error("No suitable {0} stream available")]
    NoRendition(String),

    #[error("Storage error: {0}")]
    Storage(#[from] mfetch_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] mfetch_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn quality_unavailable(label: impl Into<String>) -> Self {
        Self::QualityUnavailable(label.into())
    }

    pub fn no_rendition(kind: impl Into<String>) -> Self {
        Self::NoRendition(kind.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::InvalidRequest(_) | WorkerError::MissingFormat => "invalid_request",
            WorkerError::QualityUnavailable(_) | WorkerError::NoRendition(_) => "unavailable",
            WorkerError::Storage(_) => "storage",
            WorkerError::Media(mfetch_media::MediaError::Resolution(_)) => "resolution",
            WorkerError::Media(mfetch_media::MediaError::StageIo(_)) => "stage_io",
            WorkerError::Media(mfetch_media::MediaError::FfmpegFailed { .. }) => "transcode",
            WorkerError::Media(mfetch_media::MediaError::Tagging(_)) => "tagging",
            WorkerError::Media(_) | WorkerError::Io(_) | WorkerError::Internal(_) => "internal",
        }
    }
}

impl From<SourceUrlError> for WorkerError {
    fn from(e: SourceUrlError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

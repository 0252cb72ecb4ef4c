//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while resolving, fetching, transcoding or tagging media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("FFmpeg command failed: {message}{}", stderr_suffix(.exit_code, .stderr))]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Source is invalid, unsupported, unreachable or has no renditions.
    #[error("Could not resolve source: {0}")]
    Resolution(String),

    /// Remote stream or thumbnail could not be fetched or written.
    #[error("Stream transfer failed: {0}")]
    StageIo(String),

    #[error("Tagging failed: {0}")]
    Tagging(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn stderr_suffix(exit_code: &Option<i32>, stderr: &Option<String>) -> String {
    let mut suffix = String::new();
    if let Some(code) = exit_code {
        suffix.push_str(&format!(" (exit code {})", code));
    }
    if let Some(stderr) = stderr.as_deref().filter(|s| !s.is_empty()) {
        suffix.push_str(": ");
        suffix.push_str(stderr);
    }
    suffix
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a resolution failure error.
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution(message.into())
    }

    /// Create a stream transfer failure error.
    pub fn stage_io(message: impl Into<String>) -> Self {
        Self::StageIo(message.into())
    }

    /// Create a tagging failure error.
    pub fn tagging(message: impl Into<String>) -> Self {
        Self::Tagging(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Exit code of a failed external process, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            MediaError::FfmpegFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_failure_message_carries_diagnostics() {
        let err = MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("Invalid data found when processing input".to_string()),
            Some(1),
        );
        let msg = err.to_string();
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("Invalid data found"));
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_ffmpeg_failure_without_stderr() {
        let err = MediaError::ffmpeg_failed("killed", None, None);
        assert_eq!(err.to_string(), "FFmpeg command failed: killed");
    }
}

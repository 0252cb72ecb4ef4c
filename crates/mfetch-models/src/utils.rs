//! Utility functions for URL validation and file naming.

use thiserror::Error;
use url::Url;

/// Errors returned when a source URL is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceUrlError {
    #[error("Invalid URL: {0}")]
    Malformed(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,
}

/// Validate a client-supplied source URL.
///
/// Accepts absolute `http`/`https` URLs with a non-empty host.
pub fn validate_source_url(raw: &str) -> Result<Url, SourceUrlError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|_| SourceUrlError::Malformed(raw.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(SourceUrlError::UnsupportedScheme(other.to_string())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(SourceUrlError::MissingHost),
    }
}

/// Fallback name for titles that sanitize to nothing.
const FALLBACK_FILENAME: &str = "download";

/// Byte budget for a sanitized stem. Leaves room for a quality label, a
/// ` (n)` suffix and the extension under the usual 255-byte name limit.
pub const MAX_STEM_BYTES: usize = 200;

/// Longest prefix of `s` that is at most `max_bytes` long and ends on a char
/// boundary.
pub fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Turn a media title into a safe file stem.
///
/// Removes path separators, characters reserved on common filesystems and
/// control characters, trims whitespace and dots, and caps the result at
/// [`MAX_STEM_BYTES`].
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect();

    let trimmed = cleaned.trim().trim_matches('.').trim();
    let trimmed = truncate_to_bytes(trimmed, MAX_STEM_BYTES)
        .trim_end()
        .trim_end_matches('.');
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

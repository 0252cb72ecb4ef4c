//! Shared data models for the MediaFetch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Realtime protocol requests and status events
//! - Download jobs, target formats and pipeline stages
//! - Artifact records kept by the artifact store
//! - Normalized rendition information
//! - Source URL validation and filename sanitizing

pub mod artifact;
pub mod job;
pub mod rendition;
pub mod utils;
pub mod ws;

// Re-export common types
pub use artifact::{ArtifactId, ArtifactRecord, ARTIFACT_TTL};
pub use job::{FormatType, JobId, JobStage};
pub use rendition::{RenditionInfo, UNKNOWN_ARTIST, UNKNOWN_TITLE};
pub use utils::{
    sanitize_filename, truncate_to_bytes, validate_source_url, SourceUrlError, MAX_STEM_BYTES,
};
pub use ws::{ClientRequest, EventStatus, RequestType, StatusEvent};

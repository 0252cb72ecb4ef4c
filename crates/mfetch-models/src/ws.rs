//! Realtime protocol message types.
//!
//! Every frame on the status channel is one JSON document. Clients send
//! [`ClientRequest`]s, the server answers with an ordered stream of
//! [`StatusEvent`]s.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::job::{FormatType, JobStage};
use crate::rendition::RenditionInfo;
use crate::utils::{validate_source_url, SourceUrlError};

/// Kind of client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RequestType {
    /// Resolve the available qualities and metadata of a source
    GetFormats,
    /// Run a download-and-transcode job
    Download,
}

/// Request sent by a client over the status channel.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    /// Request kind
    #[serde(rename = "type")]
    pub kind: RequestType,

    /// Source URL
    #[validate(url)]
    pub url: String,

    /// Target format (required for downloads)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_type: Option<FormatType>,

    /// Requested quality label, e.g. "720p"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl ClientRequest {
    /// Create a formats request.
    pub fn get_formats(url: impl Into<String>) -> Self {
        Self {
            kind: RequestType::GetFormats,
            url: url.into(),
            format_type: None,
            quality: None,
        }
    }

    /// Create a download request.
    pub fn download(url: impl Into<String>, format_type: FormatType, quality: Option<String>) -> Self {
        Self {
            kind: RequestType::Download,
            url: url.into(),
            format_type: Some(format_type),
            quality,
        }
    }

    /// Validate the source URL: well-formed, http(s), with a host.
    pub fn validate_source(&self) -> Result<url::Url, SourceUrlError> {
        self.validate()
            .map_err(|_| SourceUrlError::Malformed(self.url.clone()))?;
        validate_source_url(&self.url)
    }

    /// Requested quality label; blank labels count as absent.
    pub fn quality_label(&self) -> Option<&str> {
        self.quality
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Status values carried by [`StatusEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    LoadingFormats,
    FormatsLoaded,
    Info,
    DownloadingVideo,
    DownloadingAudio,
    DownloadingThumb,
    /// Also repeated as a liveness ping while transcoding
    Merging,
    Done,
    Error,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::LoadingFormats => "loading_formats",
            EventStatus::FormatsLoaded => "formats_loaded",
            EventStatus::Info => "info",
            EventStatus::DownloadingVideo => "downloading_video",
            EventStatus::DownloadingAudio => "downloading_audio",
            EventStatus::DownloadingThumb => "downloading_thumb",
            EventStatus::Merging => "merging",
            EventStatus::Done => "done",
            EventStatus::Error => "error",
        }
    }

    /// Whether no further events follow for the request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventStatus::FormatsLoaded | EventStatus::Done | EventStatus::Error
        )
    }
}

impl From<JobStage> for EventStatus {
    fn from(stage: JobStage) -> Self {
        match stage {
            JobStage::Info => EventStatus::Info,
            JobStage::DownloadingVideo => EventStatus::DownloadingVideo,
            JobStage::DownloadingAudio => EventStatus::DownloadingAudio,
            JobStage::DownloadingThumbnail => EventStatus::DownloadingThumb,
            JobStage::Merging => EventStatus::Merging,
            JobStage::Registered => EventStatus::Done,
            JobStage::Failed => EventStatus::Error,
        }
    }
}

/// Event pushed from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub status: EventStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

impl StatusEvent {
    /// Create a plain event with only a status and a message.
    pub fn new(status: EventStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            qualities: None,
            thumbnail_url: None,
            title: None,
            artist: None,
            file_url: None,
            unique_id: None,
        }
    }

    /// Create the event announcing a pipeline stage.
    pub fn stage(stage: JobStage, message: impl Into<String>) -> Self {
        Self::new(stage.into(), message)
    }

    /// Create a formats-loaded event from resolved rendition info.
    pub fn formats_loaded(info: &RenditionInfo) -> Self {
        Self {
            qualities: Some(info.qualities.clone()),
            thumbnail_url: info.thumbnail_url.clone(),
            title: Some(info.title.clone()),
            artist: Some(info.artist.clone()),
            ..Self::new(EventStatus::FormatsLoaded, "Qualities loaded.")
        }
    }

    /// Create a done event carrying the retrieval id.
    pub fn done(message: impl Into<String>, unique_id: impl Into<String>) -> Self {
        let unique_id = unique_id.into();
        Self {
            file_url: Some(format!("/downloads/{}", unique_id)),
            unique_id: Some(unique_id),
            ..Self::new(EventStatus::Done, message)
        }
    }

    /// Create an error event. Error events never carry a retrieval id.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventStatus::Error, message)
    }

    /// Whether no further events follow for the request.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

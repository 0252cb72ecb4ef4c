//! Download job models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a download job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target format of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    /// Audio-only MP3 with embedded tags and cover art
    Mp3,
    /// Video with audio, muxed into MP4
    Mp4,
}

impl FormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatType::Mp3 => "mp3",
            FormatType::Mp4 => "mp4",
        }
    }

    /// File extension of the produced artifact.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Whether the job produces an audio-only artifact.
    pub fn is_audio(&self) -> bool {
        matches!(self, FormatType::Mp3)
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(FormatType::Mp3),
            "mp4" => Ok(FormatType::Mp4),
            other => Err(format!("Unknown format type: {}", other)),
        }
    }
}

/// Pipeline stage of a download job.
///
/// Audio jobs run `Info → DownloadingAudio → DownloadingThumbnail → Merging → Registered`,
/// video jobs run `Info → DownloadingVideo → DownloadingAudio → Merging → Registered`.
/// `Failed` is reachable from every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Info,
    DownloadingVideo,
    DownloadingAudio,
    DownloadingThumbnail,
    Merging,
    Registered,
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Info => "info",
            JobStage::DownloadingVideo => "downloading_video",
            JobStage::DownloadingAudio => "downloading_audio",
            JobStage::DownloadingThumbnail => "downloading_thumbnail",
            JobStage::Merging => "merging",
            JobStage::Registered => "registered",
            JobStage::Failed => "failed",
        }
    }

    /// Ordered stages a successful job of the given format passes through.
    pub fn sequence(format: FormatType) -> &'static [JobStage] {
        match format {
            FormatType::Mp3 => &[
                JobStage::Info,
                JobStage::DownloadingAudio,
                JobStage::DownloadingThumbnail,
                JobStage::Merging,
                JobStage::Registered,
            ],
            FormatType::Mp4 => &[
                JobStage::Info,
                JobStage::DownloadingVideo,
                JobStage::DownloadingAudio,
                JobStage::Merging,
                JobStage::Registered,
            ],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Registered | JobStage::Failed)
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

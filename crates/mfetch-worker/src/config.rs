//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Staging directory for job intermediates
    pub work_dir: PathBuf,
    /// Directory holding finished artifacts
    pub downloads_dir: PathBuf,
    /// Artifact index file
    pub index_path: PathBuf,
    /// Liveness ping period while transcoding
    pub heartbeat_interval: Duration,
    /// MP3 bitrate passed to FFmpeg
    pub audio_bitrate: String,
    /// Audio codec for MP4 muxing
    pub video_audio_codec: String,
    pub ytdlp_bin: String,
    pub ffmpeg_bin: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./work"),
            downloads_dir: PathBuf::from("./downloads"),
            index_path: PathBuf::from("./db.json"),
            heartbeat_interval: Duration::from_secs(3),
            audio_bitrate: "192k".to_string(),
            video_audio_codec: "aac".to_string(),
            ytdlp_bin: "yt-dlp".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            downloads_dir: std::env::var("DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.downloads_dir),
            index_path: std::env::var("INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_path),
            heartbeat_interval: Duration::from_secs(
                std::env::var("HEARTBEAT_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs: &u64| *secs > 0)
                    .unwrap_or(3),
            ),
            audio_bitrate: std::env::var("AUDIO_BITRATE").unwrap_or(defaults.audio_bitrate),
            video_audio_codec: std::env::var("VIDEO_AUDIO_CODEC")
                .unwrap_or(defaults.video_audio_codec),
            ytdlp_bin: std::env::var("YTDLP_BIN").unwrap_or(defaults.ytdlp_bin),
            ffmpeg_bin: std::env::var("FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
        }
    }
}

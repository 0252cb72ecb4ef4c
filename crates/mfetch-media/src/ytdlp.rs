//! Extraction backend powered by yt-dlp.
//!
//! Metadata comes from `yt-dlp -J`, rendition bytes from `yt-dlp -f <id> -o -`
//! with stdout piped into the caller's stream.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::extractor::{ByteStream, ExtractionBackend, Rendition, SourceProbe, Thumbnail};

/// yt-dlp JSON output (only the fields we use).
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<YtDlpThumbnail>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpThumbnail {
    url: String,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    format_note: Option<String>,
    height: Option<u32>,
    ext: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    /// Audio bitrate in kbit/s
    abr: Option<f64>,
    /// Total bitrate in kbit/s
    tbr: Option<f64>,
}

fn has_codec(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if c != "none")
}

impl YtDlpFormat {
    fn into_rendition(self) -> Option<Rendition> {
        let has_audio = has_codec(&self.acodec);
        let has_video = has_codec(&self.vcodec);
        if !has_audio && !has_video {
            // storyboards and other non-media entries
            return None;
        }

        let quality_label = if has_video {
            self.format_note
                .as_deref()
                .filter(|n| n.chars().next().is_some_and(|c| c.is_ascii_digit()))
                .map(str::to_string)
                .or_else(|| self.height.map(|h| format!("{}p", h)))
        } else {
            None
        };

        let mime_type = self.ext.as_deref().map(|ext| {
            let kind = if has_video { "video" } else { "audio" };
            format!("{}/{}", kind, ext)
        });

        let kbps = if has_video { self.tbr } else { self.abr.or(self.tbr) };
        let bitrate = kbps.filter(|b| *b > 0.0).map(|b| (b * 1000.0) as u64);

        Some(Rendition {
            id: self.format_id,
            quality_label,
            mime_type,
            bitrate,
            has_audio,
            has_video,
        })
    }
}

/// Parse `yt-dlp -J` output into a normalized probe.
fn parse_probe(json: &[u8]) -> MediaResult<SourceProbe> {
    let info: YtDlpInfo = serde_json::from_slice(json)?;

    let mut thumbnails: Vec<Thumbnail> = info
        .thumbnails
        .into_iter()
        .map(|t| Thumbnail {
            url: t.url,
            width: t.width,
        })
        .collect();
    if thumbnails.is_empty() {
        if let Some(url) = info.thumbnail {
            thumbnails.push(Thumbnail { url, width: None });
        }
    }

    Ok(SourceProbe {
        id: info.id,
        title: info.title,
        uploader: info.channel.or(info.uploader),
        thumbnails,
        renditions: info
            .formats
            .into_iter()
            .filter_map(YtDlpFormat::into_rendition)
            .collect(),
    })
}

/// Last meaningful stderr line of a failed yt-dlp run.
fn last_error_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("Unknown error")
        .to_string()
}

/// Extraction backend shelling out to yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    binary: String,
}

impl Default for YtDlpBackend {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn ensure_available(&self) -> MediaResult<()> {
        which::which(&self.binary)
            .map(|_| ())
            .map_err(|_| MediaError::YtDlpNotFound)
    }
}

#[async_trait]
impl ExtractionBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn probe(&self, source: &str) -> MediaResult<SourceProbe> {
        self.ensure_available()?;
        debug!(source = %source, "Probing source with yt-dlp");

        let output = Command::new(&self.binary)
            .args(["-J", "--no-playlist", "--no-warnings", source])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::resolution(format!(
                "yt-dlp failed: {}",
                last_error_line(&output.stderr)
            )));
        }

        let probe = parse_probe(&output.stdout)
            .map_err(|e| MediaError::resolution(format!("unreadable yt-dlp output: {}", e)))?;

        info!(
            source = %source,
            renditions = probe.renditions.len(),
            "Probed source"
        );
        Ok(probe)
    }

    async fn open_stream(&self, source: &str, rendition_id: &str) -> MediaResult<ByteStream> {
        self.ensure_available()?;
        debug!(source = %source, rendition = %rendition_id, "Opening rendition stream");

        let mut child = Command::new(&self.binary)
            .args([
                "-f",
                rendition_id,
                "-o",
                "-",
                "--no-part",
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                source,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("yt-dlp stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("yt-dlp stderr not captured"))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let completion = async move {
            let status = child
                .wait()
                .await
                .map_err(|e| MediaError::stage_io(format!("yt-dlp wait failed: {}", e)))?;
            let stderr = stderr_task.await.unwrap_or_default();
            if status.success() {
                Ok(())
            } else {
                Err(MediaError::stage_io(format!(
                    "yt-dlp exited with {}: {}",
                    status.code().map_or("signal".to_string(), |c| c.to_string()),
                    last_error_line(&stderr)
                )))
            }
        };

        Ok(ByteStream::from_reader(stdout).with_completion(completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "uploader": "RickAstleyVEVO",
        "channel": "Rick Astley",
        "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
        "thumbnails": [
            {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg", "width": 120},
            {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg", "width": 1280}
        ],
        "formats": [
            {"format_id": "sb0", "format_note": "storyboard", "ext": "mhtml", "acodec": "none", "vcodec": "none"},
            {"format_id": "140", "format_note": "medium", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 129.5},
            {"format_id": "251", "format_note": "medium", "ext": "webm", "acodec": "opus", "vcodec": "none", "abr": 135.2},
            {"format_id": "136", "format_note": "720p", "height": 720, "ext": "mp4", "acodec": "none", "vcodec": "avc1.4d401f", "tbr": 1200.0},
            {"format_id": "137", "height": 1080, "ext": "mp4", "acodec": "none", "vcodec": "avc1.640028", "tbr": 2400.0},
            {"format_id": "18", "format_note": "360p", "height": 360, "ext": "mp4", "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "tbr": 500.0}
        ]
    }"#;

    #[test]
    fn test_parse_probe() {
        let probe = parse_probe(SAMPLE.as_bytes()).unwrap();

        assert_eq!(probe.id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(probe.uploader.as_deref(), Some("Rick Astley"));
        assert_eq!(probe.thumbnails.len(), 2);
        assert!(probe.thumbnails[1].url.ends_with("maxresdefault.jpg"));

        // storyboard dropped
        assert_eq!(probe.renditions.len(), 5);

        let opus = probe.renditions.iter().find(|r| r.id == "251").unwrap();
        assert!(opus.is_audio_only());
        assert_eq!(opus.bitrate, Some(135_200));
        assert_eq!(opus.mime_type.as_deref(), Some("audio/webm"));
        assert!(opus.quality_label.is_none());

        let hd = probe.renditions.iter().find(|r| r.id == "137").unwrap();
        assert_eq!(hd.quality_label.as_deref(), Some("1080p"));
        assert!(hd.has_video && !hd.has_audio);

        let muxed = probe.renditions.iter().find(|r| r.id == "18").unwrap();
        assert!(muxed.has_audio && muxed.has_video);
        assert_eq!(muxed.quality_label.as_deref(), Some("360p"));
    }

    #[test]
    fn test_parse_probe_thumbnail_fallback() {
        let probe = parse_probe(br#"{"thumbnail": "https://img/x.jpg", "formats": []}"#).unwrap();
        assert_eq!(probe.thumbnails.len(), 1);
        assert!(probe.title.is_none());
        assert!(probe.renditions.is_empty());
    }

    #[test]
    fn test_last_error_line() {
        let stderr = b"[youtube] abc: Downloading webpage\nERROR: [youtube] abc: Video unavailable\n\n";
        assert_eq!(last_error_line(stderr), "ERROR: [youtube] abc: Video unavailable");
        assert_eq!(last_error_line(b""), "Unknown error");
    }
}

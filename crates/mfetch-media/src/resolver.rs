//! Rendition resolution.
//!
//! Turns a backend probe into the normalized [`RenditionInfo`] sent to
//! clients, and picks concrete renditions for a download.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use mfetch_models::{RenditionInfo, UNKNOWN_ARTIST, UNKNOWN_TITLE};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::extractor::{ByteStream, ExtractionBackend, Rendition};

/// Leading decimal number of a label, e.g. 1080 for "1080p60".
fn leading_number(label: &str) -> Option<u64> {
    let digits: String = label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// De-duplicate quality labels and sort them by descending resolution.
///
/// The first occurrence of a label wins. Labels without a leading number
/// sort after all numeric ones; ties keep discovery order.
pub fn sort_quality_labels<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut unique: Vec<String> = labels
        .into_iter()
        .map(Into::into)
        .filter(|label| seen.insert(label.clone()))
        .collect();

    // stable sort keeps discovery order among equal keys
    unique.sort_by_key(|label| match leading_number(label) {
        Some(n) => (0, Reverse(n)),
        None => (1, Reverse(0)),
    });
    unique
}

/// A resolved source: what the client sees plus the raw renditions.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub source: String,
    pub info: RenditionInfo,
    pub renditions: Vec<Rendition>,
}

impl ResolvedSource {
    /// Highest-bitrate audio-only rendition. Missing bitrates count as zero;
    /// the earliest rendition wins ties.
    pub fn best_audio(&self) -> Option<&Rendition> {
        self.renditions
            .iter()
            .filter(|r| r.is_audio_only())
            .fold(None, |best: Option<&Rendition>, r| match best {
                Some(b) if b.bitrate.unwrap_or(0) >= r.bitrate.unwrap_or(0) => Some(b),
                _ => Some(r),
            })
    }

    /// First rendition with a video track carrying the given quality label.
    pub fn find_video(&self, quality_label: &str) -> Option<&Rendition> {
        self.renditions
            .iter()
            .find(|r| r.has_video && r.quality_label.as_deref() == Some(quality_label))
    }
}

/// Resolves sources through a swappable extraction backend.
#[derive(Clone)]
pub struct RenditionResolver {
    backend: Arc<dyn ExtractionBackend>,
}

impl RenditionResolver {
    pub fn new(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self { backend }
    }

    /// Probe a source and normalize its renditions and metadata.
    ///
    /// Fails with [`MediaError::Resolution`] when the backend cannot probe the
    /// source or it offers no renditions. Missing title or artist fall back to
    /// placeholders.
    pub async fn resolve(&self, source: &str) -> MediaResult<ResolvedSource> {
        debug!(backend = self.backend.name(), source = %source, "Resolving source");

        let probe = self.backend.probe(source).await.map_err(|e| match e {
            MediaError::Resolution(_) => e,
            other => MediaError::resolution(other.to_string()),
        })?;

        if probe.renditions.is_empty() {
            return Err(MediaError::resolution("source offers no downloadable renditions"));
        }

        let qualities = sort_quality_labels(
            probe
                .renditions
                .iter()
                .filter(|r| r.has_video)
                .filter_map(|r| r.quality_label.clone()),
        );

        let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        let info = RenditionInfo {
            qualities,
            thumbnail_url: probe.thumbnails.last().map(|t| t.url.clone()),
            title: non_blank(probe.title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            artist: non_blank(probe.uploader).unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        };

        info!(
            source = %source,
            renditions = probe.renditions.len(),
            qualities = info.qualities.len(),
            "Resolved source"
        );

        Ok(ResolvedSource {
            source: source.to_string(),
            info,
            renditions: probe.renditions,
        })
    }

    /// Open a byte stream for one rendition of a resolved source.
    pub async fn open_rendition(
        &self,
        resolved: &ResolvedSource,
        rendition: &Rendition,
    ) -> MediaResult<ByteStream> {
        self.backend
            .open_stream(&resolved.source, &rendition.id)
            .await
            .map_err(|e| match e {
                MediaError::StageIo(_) => e,
                other => MediaError::stage_io(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{SourceProbe, Thumbnail};
    use async_trait::async_trait;

    struct FakeBackend {
        probe: SourceProbe,
    }

    #[async_trait]
    impl ExtractionBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        async fn probe(&self, _source: &str) -> MediaResult<SourceProbe> {
            Ok(self.probe.clone())
        }

        async fn open_stream(&self, _source: &str, rendition_id: &str) -> MediaResult<ByteStream> {
            Ok(ByteStream::from_bytes(rendition_id.as_bytes().to_vec()))
        }
    }

    fn audio(id: &str, bitrate: Option<u64>) -> Rendition {
        Rendition {
            id: id.into(),
            quality_label: None,
            mime_type: Some("audio/webm".into()),
            bitrate,
            has_audio: true,
            has_video: false,
        }
    }

    fn video(id: &str, label: &str) -> Rendition {
        Rendition {
            id: id.into(),
            quality_label: Some(label.into()),
            mime_type: Some("video/mp4".into()),
            bitrate: None,
            has_audio: false,
            has_video: true,
        }
    }

    #[test]
    fn test_sort_quality_labels() {
        let sorted = sort_quality_labels(vec![
            "720p", "1080p", "auto", "360p", "720p", "1080p60", "hd", "2160p",
        ]);
        assert_eq!(
            sorted,
            vec!["2160p", "1080p", "1080p60", "720p", "360p", "auto", "hd"]
        );
    }

    #[test]
    fn test_sort_quality_labels_empty() {
        assert!(sort_quality_labels(Vec::<String>::new()).is_empty());
    }

    #[tokio::test]
    async fn test_resolve_normalizes_probe() {
        let backend = FakeBackend {
            probe: SourceProbe {
                id: Some("abc".into()),
                title: Some("Song".into()),
                uploader: None,
                thumbnails: vec![
                    Thumbnail { url: "https://img/small.jpg".into(), width: Some(120) },
                    Thumbnail { url: "https://img/large.jpg".into(), width: Some(1280) },
                ],
                renditions: vec![
                    video("136", "720p"),
                    audio("140", Some(128_000)),
                    video("137", "1080p"),
                    video("22", "720p"),
                ],
            },
        };
        let resolver = RenditionResolver::new(Arc::new(backend));

        let resolved = resolver.resolve("https://example.com/v").await.unwrap();
        assert_eq!(resolved.info.qualities, vec!["1080p", "720p"]);
        assert_eq!(resolved.info.thumbnail_url.as_deref(), Some("https://img/large.jpg"));
        assert_eq!(resolved.info.title, "Song");
        assert_eq!(resolved.info.artist, UNKNOWN_ARTIST);
        assert_eq!(resolved.find_video("720p").unwrap().id, "136");
        assert!(resolved.find_video("9999p").is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_renditions_fails() {
        let resolver = RenditionResolver::new(Arc::new(FakeBackend {
            probe: SourceProbe::default(),
        }));

        let err = resolver.resolve("https://example.com/v").await.unwrap_err();
        assert!(matches!(err, MediaError::Resolution(_)));
    }

    #[test]
    fn test_best_audio_prefers_highest_bitrate() {
        let resolved = ResolvedSource {
            source: "s".into(),
            info: RenditionInfo {
                qualities: vec![],
                thumbnail_url: None,
                title: UNKNOWN_TITLE.into(),
                artist: UNKNOWN_ARTIST.into(),
            },
            renditions: vec![
                audio("a", None),
                audio("b", Some(160_000)),
                video("v", "720p"),
                audio("c", Some(160_000)),
                audio("d", Some(64_000)),
            ],
        };
        assert_eq!(resolved.best_audio().unwrap().id, "b");
    }
}

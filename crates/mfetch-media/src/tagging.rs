//! ID3 tagging of finished audio artifacts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Metadata embedded into an audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTags {
    pub title: String,
    pub artist: String,
    /// Front cover image, if one was fetched
    pub cover_image: Option<PathBuf>,
}

/// Writes metadata into an audio file in place.
#[async_trait]
pub trait AudioTagger: Send + Sync {
    async fn tag_audio(&self, path: &Path, tags: &AudioTags) -> MediaResult<()>;
}

/// ID3v2.3 tagger.
#[derive(Debug, Clone, Default)]
pub struct Id3Tagger;

impl Id3Tagger {
    pub fn new() -> Self {
        Self
    }
}

/// Guess the MIME type of an image from its magic bytes.
fn sniff_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

fn write_tags(path: &Path, title: &str, artist: &str, cover: Option<Vec<u8>>) -> MediaResult<()> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => Tag::new(),
        Err(e) => return Err(MediaError::tagging(format!("cannot read tags: {}", e))),
    };

    tag.set_title(title);
    tag.set_artist(artist);

    if let Some(data) = cover {
        tag.remove_picture_by_type(PictureType::CoverFront);
        tag.add_frame(Picture {
            mime_type: sniff_image_mime(&data).to_string(),
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data,
        });
    }

    tag.write_to_path(path, Version::Id3v23)
        .map_err(|e| MediaError::tagging(format!("cannot write tags: {}", e)))
}

#[async_trait]
impl AudioTagger for Id3Tagger {
    async fn tag_audio(&self, path: &Path, tags: &AudioTags) -> MediaResult<()> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| MediaError::tagging(format!("{}: {}", path.display(), e)))?;
        if metadata.len() == 0 {
            return Err(MediaError::tagging(format!("{} is empty", path.display())));
        }

        let cover = match &tags.cover_image {
            Some(cover_path) => {
                let data = tokio::fs::read(cover_path).await.map_err(|e| {
                    MediaError::tagging(format!("unreadable cover image {}: {}", cover_path.display(), e))
                })?;
                if data.is_empty() {
                    return Err(MediaError::tagging("cover image is empty"));
                }
                Some(data)
            }
            None => None,
        };

        debug!(
            path = %path.display(),
            has_cover = cover.is_some(),
            "Writing ID3 tags"
        );

        let path = path.to_path_buf();
        let title = tags.title.clone();
        let artist = tags.artist.clone();
        tokio::task::spawn_blocking(move || write_tags(&path, &title, &artist, cover))
            .await
            .map_err(|e| MediaError::internal(format!("tagging task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[tokio::test]
    async fn test_tag_audio_with_cover() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("Song.mp3");
        let cover = dir.path().join("thumb.tmp");
        tokio::fs::write(&audio, vec![0u8; 512]).await.unwrap();
        tokio::fs::write(&cover, JPEG).await.unwrap();

        let tags = AudioTags {
            title: "Song".into(),
            artist: "Artist".into(),
            cover_image: Some(cover),
        };
        Id3Tagger::new().tag_audio(&audio, &tags).await.unwrap();

        let tag = Tag::read_from_path(&audio).unwrap();
        assert_eq!(tag.title(), Some("Song"));
        assert_eq!(tag.artist(), Some("Artist"));
        let picture = tag.pictures().next().unwrap();
        assert_eq!(picture.mime_type, "image/jpeg");
        assert_eq!(picture.data, JPEG);
    }

    #[tokio::test]
    async fn test_tag_audio_missing_file() {
        let dir = TempDir::new().unwrap();
        let tags = AudioTags {
            title: "t".into(),
            artist: "a".into(),
            cover_image: None,
        };

        let err = Id3Tagger::new()
            .tag_audio(&dir.path().join("missing.mp3"), &tags)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Tagging(_)));
    }

    #[tokio::test]
    async fn test_tag_audio_unreadable_cover() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("Song.mp3");
        tokio::fs::write(&audio, vec![0u8; 512]).await.unwrap();

        let tags = AudioTags {
            title: "t".into(),
            artist: "a".into(),
            cover_image: Some(dir.path().join("nope.tmp")),
        };
        let err = Id3Tagger::new().tag_audio(&audio, &tags).await.unwrap_err();
        assert!(matches!(err, MediaError::Tagging(_)));
    }

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(JPEG), "image/jpeg");
        assert_eq!(sniff_image_mime(&[0x89, b'P', b'N', b'G', 0x0D]), "image/png");
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
    }
}

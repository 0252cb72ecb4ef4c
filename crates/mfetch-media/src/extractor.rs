//! Extraction backend abstraction.
//!
//! An extraction backend turns a source URL into a normalized [`SourceProbe`]
//! and opens byte streams for individual renditions. Backend-specific field
//! names never leave the adapter implementing [`ExtractionBackend`].

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter};

use crate::error::{MediaError, MediaResult};

type Completion = Pin<Box<dyn Future<Output = MediaResult<()>> + Send>>;

/// A readable remote byte stream.
///
/// Optionally carries a completion future that is awaited after the reader
/// hits EOF, so producers (e.g. a child process) can report late failures.
pub struct ByteStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    completion: Option<Completion>,
}

impl ByteStream {
    /// Wrap any async reader.
    pub fn from_reader(reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            reader: Box::pin(reader),
            completion: None,
        }
    }

    /// Wrap in-memory bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(std::io::Cursor::new(bytes.into()))
    }

    /// Attach a future that must succeed once the reader is exhausted.
    pub fn with_completion<F>(mut self, completion: F) -> Self
    where
        F: Future<Output = MediaResult<()>> + Send + 'static,
    {
        self.completion = Some(Box::pin(completion));
        self
    }

    /// Copy the whole stream into a new file at `path`.
    ///
    /// Returns the number of bytes written. Read and write failures are
    /// reported as stream transfer errors.
    pub async fn copy_to_file(mut self, path: &Path) -> MediaResult<u64> {
        let file = File::create(path).await.map_err(|e| {
            MediaError::stage_io(format!("cannot create {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);

        let written = tokio::io::copy(&mut self.reader, &mut writer)
            .await
            .map_err(|e| MediaError::stage_io(format!("stream interrupted: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| MediaError::stage_io(format!("cannot write {}: {}", path.display(), e)))?;

        if let Some(completion) = self.completion.take() {
            completion.await?;
        }

        Ok(written)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}

/// One encoded stream variant offered by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    /// Backend-scoped identifier used to open the stream
    pub id: String,
    /// Human quality label, e.g. "720p"
    pub quality_label: Option<String>,
    /// MIME type, e.g. "audio/webm"
    pub mime_type: Option<String>,
    /// Declared bitrate in bits per second
    pub bitrate: Option<u64>,
    pub has_audio: bool,
    pub has_video: bool,
}

impl Rendition {
    /// Audio without a video track.
    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }
}

/// Thumbnail reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
}

/// Normalized probe result of a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceProbe {
    /// Backend's id of the source
    pub id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    /// Thumbnails in backend preference order, best last
    pub thumbnails: Vec<Thumbnail>,
    /// Renditions in discovery order
    pub renditions: Vec<Rendition>,
}

/// External extraction capability.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Query the renditions and metadata of a source.
    async fn probe(&self, source: &str) -> MediaResult<SourceProbe>;

    /// Open a byte stream for one rendition of a source.
    async fn open_stream(&self, source: &str, rendition_id: &str) -> MediaResult<ByteStream>;
}

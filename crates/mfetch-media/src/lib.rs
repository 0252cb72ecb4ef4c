//! Media collaborators for the download pipeline.
//!
//! This crate provides:
//! - A swappable extraction backend (yt-dlp adapter) behind one trait
//! - Rendition resolution with normalized quality labels
//! - Byte streams for remote renditions and thumbnails
//! - Type-safe FFmpeg command building and a runner with liveness heartbeats
//! - ID3 tagging of finished audio artifacts
//! - Scoped temp-file staging with guaranteed release

pub mod command;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod fs_utils;
pub mod resolver;
pub mod staging;
pub mod tagging;
pub mod transcode;
pub mod ytdlp;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use extractor::{ByteStream, ExtractionBackend, Rendition, SourceProbe, Thumbnail};
pub use fetch::{HttpThumbnailFetcher, ThumbnailFetcher};
pub use fs_utils::{file_name_of, reserve_unique_path};
pub use resolver::{sort_quality_labels, RenditionResolver, ResolvedSource};
pub use staging::{release_all, ReleaseReport, StageKind, StagingArea, StagingScope};
pub use tagging::{AudioTagger, AudioTags, Id3Tagger};
pub use transcode::{FfmpegTranscoder, MuxInput, StreamSelector, TranscodeOptions, Transcoder};
pub use ytdlp::YtDlpBackend;

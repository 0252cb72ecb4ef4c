//! Job orchestrator.
//!
//! Runs one download job as a linear sequence of awaited stages. Audio jobs
//! go `info → downloading_audio → downloading_thumb → merging → done`, video
//! jobs go `info → downloading_video → downloading_audio → merging → done`.
//! Every stage announces itself with exactly one status event before it
//! starts. Any failure ends the job with a single `error` event.
//!
//! All intermediates live in a [`StagingScope`] that is released once the job
//! settles, whatever the outcome. The reserved output file is tracked by the
//! same scope and only kept once its record is in the artifact store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mfetch_media::{
    file_name_of, reserve_unique_path, AudioTagger, AudioTags, ExtractionBackend, FfmpegRunner,
    FfmpegTranscoder, HttpThumbnailFetcher, Id3Tagger, MuxInput, RenditionResolver,
    ResolvedSource, StageKind, StagingArea, StagingScope, StreamSelector, ThumbnailFetcher,
    TranscodeOptions, Transcoder, YtDlpBackend,
};
use mfetch_models::{
    sanitize_filename, validate_source_url, ArtifactRecord, ClientRequest, FormatType, JobId,
    JobStage, RenditionInfo, StatusEvent,
};
use mfetch_storage::ArtifactStore;
use tracing::{debug, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::sink::EventSink;

/// External capabilities a job drives.
#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn ExtractionBackend>,
    pub thumbnails: Arc<dyn ThumbnailFetcher>,
    pub transcoder: Arc<dyn Transcoder>,
    pub tagger: Arc<dyn AudioTagger>,
}

impl Collaborators {
    /// yt-dlp, HTTP, FFmpeg and ID3 implementations.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let runner = FfmpegRunner::new()
            .with_binary(&config.ffmpeg_bin)
            .with_heartbeat(config.heartbeat_interval);

        Ok(Self {
            backend: Arc::new(YtDlpBackend::new(&config.ytdlp_bin)),
            thumbnails: Arc::new(HttpThumbnailFetcher::new()?),
            transcoder: Arc::new(FfmpegTranscoder::new(runner)),
            tagger: Arc::new(Id3Tagger::new()),
        })
    }
}

/// Encoding settings applied to every job.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub audio_bitrate: String,
    pub video_audio_codec: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for PipelineSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            audio_bitrate: config.audio_bitrate.clone(),
            video_audio_codec: config.video_audio_codec.clone(),
        }
    }
}

/// A validated download request.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: JobId,
    pub url: String,
    pub format: FormatType,
    /// Requested quality label; video jobs fall back to the best one
    pub quality: Option<String>,
}

impl DownloadJob {
    /// Validate a client request into a job.
    pub fn from_request(request: &ClientRequest) -> WorkerResult<Self> {
        let url = request.validate_source()?;
        let format = request.format_type.ok_or(WorkerError::MissingFormat)?;

        Ok(Self {
            id: JobId::new(),
            url: url.to_string(),
            format,
            quality: request.quality_label().map(str::to_string),
        })
    }
}

/// Drives download jobs and format lookups.
#[derive(Clone)]
pub struct JobOrchestrator {
    resolver: RenditionResolver,
    thumbnails: Arc<dyn ThumbnailFetcher>,
    transcoder: Arc<dyn Transcoder>,
    tagger: Arc<dyn AudioTagger>,
    staging: StagingArea,
    store: Arc<ArtifactStore>,
    settings: PipelineSettings,
}

impl JobOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        staging: StagingArea,
        store: Arc<ArtifactStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            resolver: RenditionResolver::new(collaborators.backend),
            thumbnails: collaborators.thumbnails,
            transcoder: collaborators.transcoder,
            tagger: collaborators.tagger,
            staging,
            store,
            settings,
        }
    }

    /// Build the production pipeline, creating directories and the index.
    pub async fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let staging = StagingArea::create(&config.work_dir).await?;
        let store = ArtifactStore::open(&config.index_path, &config.downloads_dir).await?;

        Ok(Self::new(
            Collaborators::from_config(config)?,
            staging,
            Arc::new(store),
            PipelineSettings::from(config),
        ))
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Resolve the qualities and metadata of a source.
    ///
    /// Emits `loading_formats` followed by either `formats_loaded` or `error`.
    pub async fn get_formats(&self, url: &str, sink: &dyn EventSink) -> WorkerResult<RenditionInfo> {
        let url = match validate_source_url(url) {
            Ok(url) => url,
            Err(e) => {
                sink.send(StatusEvent::error(format!("Invalid URL: {}", e)));
                return Err(e.into());
            }
        };

        sink.send(StatusEvent::new(
            mfetch_models::EventStatus::LoadingFormats,
            "Loading video information...",
        ));

        match self.resolver.resolve(url.as_str()).await {
            Ok(resolved) => {
                metrics::record_format_lookup(true);
                sink.send(StatusEvent::formats_loaded(&resolved.info));
                Ok(resolved.info)
            }
            Err(e) => {
                metrics::record_format_lookup(false);
                debug!(url = %url, error = %e, "Format lookup failed");
                sink.send(StatusEvent::error(format!(
                    "Could not load video information: {}",
                    e
                )));
                Err(e.into())
            }
        }
    }

    /// Run a download request to completion.
    ///
    /// The job body runs in its own task, so a panic inside it still ends in
    /// an `error` event. Returns the registered record on success.
    pub async fn download(
        &self,
        request: &ClientRequest,
        sink: Arc<dyn EventSink>,
    ) -> WorkerResult<ArtifactRecord> {
        let job = match DownloadJob::from_request(request) {
            Ok(job) => job,
            Err(e) => {
                sink.send(StatusEvent::error(e.to_string()));
                return Err(e);
            }
        };

        let this = self.clone();
        let task_sink = sink.clone();
        let handle = tokio::spawn(async move { this.execute(job, task_sink.as_ref()).await });

        match handle.await {
            Ok(result) => result,
            Err(join_error) => {
                let e = WorkerError::internal(format!("job task aborted: {}", join_error));
                sink.send(StatusEvent::error(format!("An error occurred: {}", e)));
                Err(e)
            }
        }
    }

    /// Run one job, release its staging scope and emit the terminal event.
    pub async fn execute(&self, job: DownloadJob, sink: &dyn EventSink) -> WorkerResult<ArtifactRecord> {
        let logger = JobLogger::new(&job.id, job.format);
        let span = logger.create_span();

        async {
            let started = Instant::now();
            logger.log_start(&job.url);
            metrics::record_job_started(job.format);

            let mut scope = self.staging.scope();
            let result = self.run_download(&job, &mut scope, sink, &logger).await;

            let report = scope.release().await;
            if !report.is_clean() {
                logger.log_warning(&format!(
                    "{} staged files could not be removed",
                    report.failed.len()
                ));
            }

            match &result {
                Ok(record) => {
                    let elapsed = started.elapsed();
                    logger.log_completion(&record.filename, elapsed);
                    metrics::record_job_completed(job.format, elapsed.as_secs_f64());
                    sink.send(StatusEvent::done(
                        format!("{} download complete!", job.format.as_str().to_uppercase()),
                        record.id.as_str(),
                    ));
                }
                Err(e) => {
                    logger.log_failure(e);
                    metrics::record_job_failed(job.format, e.kind());
                    sink.send(StatusEvent::error(format!("An error occurred: {}", e)));
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    /// The job state machine. Every path it allocates is tracked by `scope`.
    pub async fn run_download(
        &self,
        job: &DownloadJob,
        scope: &mut StagingScope,
        sink: &dyn EventSink,
        logger: &JobLogger,
    ) -> WorkerResult<ArtifactRecord> {
        sink.send(StatusEvent::stage(JobStage::Info, "Loading video information..."));
        let resolved = self.resolver.resolve(&job.url).await?;

        match job.format {
            FormatType::Mp3 => self.run_audio_job(&resolved, scope, sink, logger).await,
            FormatType::Mp4 => {
                self.run_video_job(job, &resolved, scope, sink, logger)
                    .await
            }
        }
    }

    async fn run_audio_job(
        &self,
        resolved: &ResolvedSource,
        scope: &mut StagingScope,
        sink: &dyn EventSink,
        logger: &JobLogger,
    ) -> WorkerResult<ArtifactRecord> {
        let audio = resolved
            .best_audio()
            .ok_or_else(|| WorkerError::no_rendition("audio"))?;

        sink.send(StatusEvent::stage(
            JobStage::DownloadingAudio,
            "Downloading audio stream for MP3...",
        ));
        let audio_path = scope.allocate(StageKind::Audio);
        let bytes = self
            .resolver
            .open_rendition(resolved, audio)
            .await?
            .copy_to_file(&audio_path)
            .await?;
        logger.log_stream_fetched("audio", &audio.id, bytes);

        sink.send(StatusEvent::stage(
            JobStage::DownloadingThumbnail,
            "Downloading thumbnail...",
        ));
        let cover = match &resolved.info.thumbnail_url {
            Some(url) => {
                let path = scope.allocate(StageKind::Thumbnail);
                self.thumbnails.open(url).await?.copy_to_file(&path).await?;
                Some(path)
            }
            None => {
                logger.log_warning("source has no thumbnail, tagging without cover");
                None
            }
        };

        let stem = sanitize_filename(&resolved.info.title);
        let output = self.reserve_output(scope, &stem, FormatType::Mp3).await?;

        let merging = StatusEvent::stage(JobStage::Merging, "Converting to MP3...");
        sink.send(merging.clone());
        let heartbeat = || sink.send(merging.clone());
        self.transcoder
            .remux(
                &audio_path,
                &output,
                &TranscodeOptions::audio(&self.settings.audio_bitrate),
                &heartbeat,
            )
            .await?;

        self.tagger
            .tag_audio(
                &output,
                &AudioTags {
                    title: resolved.info.title.clone(),
                    artist: resolved.info.artist.clone(),
                    cover_image: cover,
                },
            )
            .await?;

        self.register(scope, &output).await
    }

    async fn run_video_job(
        &self,
        job: &DownloadJob,
        resolved: &ResolvedSource,
        scope: &mut StagingScope,
        sink: &dyn EventSink,
        logger: &JobLogger,
    ) -> WorkerResult<ArtifactRecord> {
        let label = match job.quality.as_deref() {
            Some(label) if resolved.info.offers_quality(label) => label,
            Some(label) => return Err(WorkerError::quality_unavailable(label)),
            None => resolved
                .info
                .best_quality()
                .ok_or_else(|| WorkerError::no_rendition("video"))?,
        };
        let video = resolved
            .find_video(label)
            .ok_or_else(|| WorkerError::quality_unavailable(label))?;
        let audio = resolved
            .best_audio()
            .ok_or_else(|| WorkerError::no_rendition("audio"))?;

        sink.send(StatusEvent::stage(
            JobStage::DownloadingVideo,
            format!("Downloading video stream in {}...", label),
        ));
        let video_path = scope.allocate(StageKind::Video);
        let bytes = self
            .resolver
            .open_rendition(resolved, video)
            .await?
            .copy_to_file(&video_path)
            .await?;
        logger.log_stream_fetched("video", &video.id, bytes);

        sink.send(StatusEvent::stage(
            JobStage::DownloadingAudio,
            "Downloading audio stream...",
        ));
        let audio_path = scope.allocate(StageKind::Audio);
        let bytes = self
            .resolver
            .open_rendition(resolved, audio)
            .await?
            .copy_to_file(&audio_path)
            .await?;
        logger.log_stream_fetched("audio", &audio.id, bytes);

        let stem = format!("{}_{}", sanitize_filename(&resolved.info.title), label);
        let output = self.reserve_output(scope, &stem, FormatType::Mp4).await?;

        let merging = StatusEvent::stage(JobStage::Merging, "Merging video and audio...");
        sink.send(merging.clone());
        let heartbeat = || sink.send(merging.clone());
        self.transcoder
            .mux(
                &[
                    MuxInput::new(&video_path, StreamSelector::Video),
                    MuxInput::new(&audio_path, StreamSelector::Audio),
                ],
                &output,
                &TranscodeOptions::copy_video(&self.settings.video_audio_codec),
                &heartbeat,
            )
            .await?;

        self.register(scope, &output).await
    }

    /// Reserve the final artifact path and hand it to the scope until registered.
    async fn reserve_output(
        &self,
        scope: &mut StagingScope,
        stem: &str,
        format: FormatType,
    ) -> WorkerResult<PathBuf> {
        let path =
            reserve_unique_path(self.store.artifacts_dir(), stem, format.extension()).await?;
        scope.track(&path);
        Ok(path)
    }

    /// Register a finished artifact and take it out of the scope.
    async fn register(&self, scope: &mut StagingScope, output: &Path) -> WorkerResult<ArtifactRecord> {
        let record = ArtifactRecord::new(file_name_of(output)?);
        self.store.put(&record).await?;
        scope.keep(output);
        Ok(record)
    }
}

//! Transcode invoker.
//!
//! Each operation runs exactly one external FFmpeg process and waits for it,
//! ticking a liveness heartbeat while it runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Codec and bitrate options for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    /// e.g. "192k"
    pub audio_bitrate: Option<String>,
    pub extra_args: Vec<String>,
}

impl TranscodeOptions {
    /// Re-encode to audio only at the given bitrate.
    pub fn audio(bitrate: impl Into<String>) -> Self {
        Self {
            audio_bitrate: Some(bitrate.into()),
            ..Default::default()
        }
    }

    /// Copy video, re-encode audio with the given codec.
    pub fn copy_video(audio_codec: impl Into<String>) -> Self {
        Self {
            video_codec: Some("copy".to_string()),
            audio_codec: Some(audio_codec.into()),
            ..Default::default()
        }
    }

    fn apply(&self, mut cmd: FfmpegCommand) -> FfmpegCommand {
        if let Some(codec) = &self.video_codec {
            cmd = cmd.video_codec(codec);
        }
        if let Some(codec) = &self.audio_codec {
            cmd = cmd.audio_codec(codec);
        }
        if let Some(bitrate) = &self.audio_bitrate {
            cmd = cmd.audio_bitrate(bitrate);
        }
        cmd.output_args(self.extra_args.iter().cloned())
    }
}

/// Which streams of an input end up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSelector {
    All,
    Video,
    Audio,
    /// Image input embedded as cover art
    AttachedPicture,
}

/// One input of a mux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxInput {
    pub path: PathBuf,
    pub selector: StreamSelector,
}

impl MuxInput {
    pub fn new(path: impl Into<PathBuf>, selector: StreamSelector) -> Self {
        Self {
            path: path.into(),
            selector,
        }
    }
}

/// Runs external transcoding processes.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert one input into `output`.
    async fn remux(
        &self,
        input: &Path,
        output: &Path,
        options: &TranscodeOptions,
        heartbeat: &(dyn Fn() + Send + Sync),
    ) -> MediaResult<()>;

    /// Combine several inputs, in order, into `output`.
    async fn mux(
        &self,
        inputs: &[MuxInput],
        output: &Path,
        options: &TranscodeOptions,
        heartbeat: &(dyn Fn() + Send + Sync),
    ) -> MediaResult<()>;
}

/// FFmpeg-backed transcoder.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
}

impl FfmpegTranscoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    fn remux_command(input: &Path, output: &Path, options: &TranscodeOptions) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(output).input(input);
        let cmd = if options.video_codec.is_none() && options.audio_bitrate.is_some() {
            cmd.no_video()
        } else {
            cmd
        };
        options.apply(cmd)
    }

    fn mux_command(inputs: &[MuxInput], output: &Path, options: &TranscodeOptions) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(output);
        for input in inputs {
            cmd = cmd.input(&input.path);
        }

        let mut has_picture = false;
        for (index, input) in inputs.iter().enumerate() {
            cmd = match input.selector {
                StreamSelector::All => cmd.map(index.to_string()),
                StreamSelector::Video => cmd.map(format!("{}:v:0", index)),
                StreamSelector::Audio => cmd.map(format!("{}:a:0", index)),
                StreamSelector::AttachedPicture => {
                    has_picture = true;
                    cmd.map(format!("{}:v:0", index))
                }
            };
        }

        let cmd = options.apply(cmd);
        if has_picture {
            cmd.output_args(["-disposition:v:0", "attached_pic"])
        } else {
            cmd
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn remux(
        &self,
        input: &Path,
        output: &Path,
        options: &TranscodeOptions,
        heartbeat: &(dyn Fn() + Send + Sync),
    ) -> MediaResult<()> {
        let cmd = Self::remux_command(input, output, options);
        self.runner.run_with_heartbeat(&cmd, heartbeat).await?;
        info!(output = %output.display(), "Transcode finished");
        Ok(())
    }

    async fn mux(
        &self,
        inputs: &[MuxInput],
        output: &Path,
        options: &TranscodeOptions,
        heartbeat: &(dyn Fn() + Send + Sync),
    ) -> MediaResult<()> {
        let cmd = Self::mux_command(inputs, output, options);
        self.runner.run_with_heartbeat(&cmd, heartbeat).await?;
        info!(output = %output.display(), inputs = inputs.len(), "Mux finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(args: &[String], flag: &str) -> Vec<String> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].clone())
            .collect()
    }

    #[test]
    fn test_remux_audio_args() {
        let cmd = FfmpegTranscoder::remux_command(
            Path::new("a.tmp"),
            Path::new("Song.mp3"),
            &TranscodeOptions::audio("192k"),
        );
        let args = cmd.build_args();

        assert_eq!(pairs(&args, "-i"), vec!["a.tmp"]);
        assert_eq!(pairs(&args, "-b:a"), vec!["192k"]);
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args.last().unwrap(), "Song.mp3");
    }

    #[test]
    fn test_mux_video_audio_args() {
        let inputs = vec![
            MuxInput::new("v.tmp", StreamSelector::Video),
            MuxInput::new("a.tmp", StreamSelector::Audio),
        ];
        let cmd = FfmpegTranscoder::mux_command(
            &inputs,
            Path::new("Clip_720p.mp4"),
            &TranscodeOptions::copy_video("aac"),
        );
        let args = cmd.build_args();

        assert_eq!(pairs(&args, "-i"), vec!["v.tmp", "a.tmp"]);
        assert_eq!(pairs(&args, "-map"), vec!["0:v:0", "1:a:0"]);
        assert_eq!(pairs(&args, "-c:v"), vec!["copy"]);
        assert_eq!(pairs(&args, "-c:a"), vec!["aac"]);
        assert!(!args.contains(&"attached_pic".to_string()));
    }

    #[test]
    fn test_mux_attached_picture() {
        let inputs = vec![
            MuxInput::new("a.tmp", StreamSelector::Audio),
            MuxInput::new("t.tmp", StreamSelector::AttachedPicture),
        ];
        let cmd = FfmpegTranscoder::mux_command(&inputs, Path::new("o.mp3"), &TranscodeOptions::default());
        let args = cmd.build_args();

        assert_eq!(pairs(&args, "-map"), vec!["0:a:0", "1:v:0"]);
        assert_eq!(pairs(&args, "-disposition:v:0"), vec!["attached_pic"]);
    }
}

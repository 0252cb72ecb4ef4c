//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{interval_at, Instant};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Number of trailing stderr lines kept for diagnostics.
const STDERR_TAIL_LINES: usize = 12;

/// Maximum length of the stderr excerpt attached to errors.
const STDERR_EXCERPT_CHARS: usize = 1000;

/// One FFmpeg input with its input-side arguments.
#[derive(Debug, Clone)]
struct FfmpegInput {
    path: PathBuf,
    args: Vec<String>,
}

/// Builder for FFmpeg commands with one or more inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input file.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            path: path.as_ref().to_path_buf(),
            args: Vec::new(),
        });
        self
    }

    /// Add an argument placed before the most recently added `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add output arguments (after all inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Select a stream for the output, e.g. `0:v:0`.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Drop all video streams.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Output path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with optional liveness heartbeats.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Binary name or path
    binary: String,
    /// Heartbeat period while the process runs
    heartbeat_interval: Option<Duration>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner using `ffmpeg` from PATH.
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            heartbeat_interval: None,
        }
    }

    /// Use a different FFmpeg binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Emit heartbeats at this period while the process runs.
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_heartbeat(cmd, || {}).await
    }

    /// Run an FFmpeg command, calling `on_heartbeat` every heartbeat period until it settles.
    pub async fn run_with_heartbeat<F>(&self, cmd: &FfmpegCommand, on_heartbeat: F) -> MediaResult<()>
    where
        F: Fn() + Send + Sync,
    {
        which::which(&self.binary).map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.binary, args.join(" "));

        run_process(&self.binary, &args, self.heartbeat_interval, &on_heartbeat).await
    }
}

/// Spawn a process, wait for it with heartbeats and map its exit status.
async fn run_process(
    binary: &str,
    args: &[String],
    heartbeat_interval: Option<Duration>,
    on_heartbeat: &(dyn Fn() + Send + Sync),
) -> MediaResult<()> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::internal("stderr not captured"))?;
    let stderr_task = tokio::spawn(collect_stderr_tail(stderr));

    let status = wait_with_heartbeat(&mut child, heartbeat_interval, on_heartbeat).await;
    let stderr_tail = stderr_task.await.unwrap_or_default();
    let status = status?;

    if status.success() {
        Ok(())
    } else {
        Err(MediaError::ffmpeg_failed(
            format!("{} exited with non-zero status", binary),
            Some(stderr_tail).filter(|s| !s.is_empty()),
            status.code(),
        ))
    }
}

/// Wait for the child, ticking the heartbeat until it exits.
///
/// The ticker lives only inside this function, so it stops as soon as the
/// process settles, whatever the outcome.
async fn wait_with_heartbeat(
    child: &mut Child,
    heartbeat_interval: Option<Duration>,
    on_heartbeat: &(dyn Fn() + Send + Sync),
) -> std::io::Result<ExitStatus> {
    let Some(period) = heartbeat_interval else {
        return child.wait().await;
    };

    let mut ticker = interval_at(Instant::now() + period, period);
    let wait = child.wait();
    tokio::pin!(wait);

    loop {
        tokio::select! {
            status = &mut wait => return status,
            _ = ticker.tick() => on_heartbeat(),
        }
    }
}

/// Drain a stderr pipe, keeping only its last lines.
async fn collect_stderr_tail<R>(stderr: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    let joined = tail.into_iter().collect::<Vec<_>>().join("\n");
    excerpt(&joined, STDERR_EXCERPT_CHARS)
}

/// Keep the last `max_chars` characters of `text`.
fn excerpt(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_command_builder_single_input() {
        let cmd = FfmpegCommand::new("out.mp3")
            .input("in.tmp")
            .audio_bitrate("192k");

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "in.tmp");
        assert!(args.contains(&"-b:a".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp3");
    }

    #[test]
    fn test_command_builder_multi_input_order() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input("video.tmp")
            .input("audio.tmp")
            .input_arg("-thread_queue_size")
            .input_arg("512")
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .audio_codec("aac");

        let args = cmd.build_args();
        let inputs: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| args[i + 1].clone())
            .collect();
        assert_eq!(inputs, vec!["video.tmp", "audio.tmp"]);

        // Input args belong to the input they were added after
        let tq = args.iter().position(|a| a == "-thread_queue_size").unwrap();
        assert_eq!(args[tq + 2], "-i");
        assert_eq!(args[tq + 3], "audio.tmp");

        let maps: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].clone())
            .collect();
        assert_eq!(maps, vec!["0:v:0", "1:a:0"]);
    }

    #[test]
    fn test_excerpt_keeps_tail() {
        assert_eq!(excerpt("abcdef", 3), "def");
        assert_eq!(excerpt("abc", 10), "abc");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_process_failure_reports_exit_code_and_stderr() {
        let args = vec![
            "-c".to_string(),
            "echo 'first line' >&2; echo 'Conversion failed!' >&2; exit 3".to_string(),
        ];
        let err = run_process("sh", &args, None, &|| {}).await.unwrap_err();

        match err {
            MediaError::FfmpegFailed { exit_code, stderr, .. } => {
                assert_eq!(exit_code, Some(3));
                let stderr = stderr.unwrap();
                assert!(stderr.contains("Conversion failed!"));
                assert!(stderr.contains("first line"));
            }
            other => panic!("Expected FfmpegFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_process_emits_heartbeats_until_exit() {
        let beats = AtomicUsize::new(0);
        let args = vec!["-c".to_string(), "sleep 0.5".to_string()];

        run_process(
            "sh",
            &args,
            Some(Duration::from_millis(100)),
            &|| {
                beats.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();

        let after_exit = beats.load(Ordering::SeqCst);
        assert!(after_exit >= 1);

        // No further beats once the process settled
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(beats.load(Ordering::SeqCst), after_exit);
    }
}

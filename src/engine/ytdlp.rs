//! yt-dlp engine driven as an external process

use super::parser::{
    EngineLine, POSTPROCESS_MARKER, PROGRESS_MARKER, RESULT_MARKER, failure_message, parse_line,
    parse_probe_output,
};
use super::traits::{EngineOutput, EngineRequest, MediaEngine, ProbeInfo, ProbeRequest};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::progress::ProgressEvent;
use crate::types::OutputFormat;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Output template relative to the download directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s-%(id)s.%(ext)s";

// Number of trailing stderr lines kept for failure messages
const STDERR_TAIL: usize = 20;

/// yt-dlp engine
///
/// Each call spawns one `yt-dlp` process. Progress and the final result are
/// read back from marker lines (see [`super::parser`]); the process is killed
/// if the attempt future is dropped.
///
/// # Examples
///
/// ```no_run
/// use rushia_dl::config::EngineConfig;
/// use rushia_dl::engine::{CliEngine, MediaEngine};
///
/// let engine = CliEngine::from_path(EngineConfig::default())
///     .expect("yt-dlp not found in PATH");
/// assert_eq!(engine.name(), "yt-dlp");
/// ```
pub struct CliEngine {
    binary_path: PathBuf,
    config: EngineConfig,
}

impl CliEngine {
    /// Create an engine with an explicit binary path
    pub fn new(binary_path: PathBuf, config: EngineConfig) -> Self {
        Self {
            binary_path,
            config,
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path(config: EngineConfig) -> Option<Self> {
        which::which("yt-dlp")
            .ok()
            .map(|path| Self::new(path, config))
    }

    /// Path of the executable this engine runs
    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }

    fn common_args(&self, credential: Option<&PathBuf>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--no-playlist".into(), "--no-color".into()];
        if let Some(path) = credential {
            args.push("--cookies".into());
            args.push(path.into());
        }
        for component in &self.config.remote_components {
            args.push("--remote-components".into());
            args.push(component.into());
        }
        args
    }

    /// Arguments of a metadata-only run
    pub(crate) fn probe_args(&self, request: &ProbeRequest) -> Vec<OsString> {
        let mut args = self.common_args(request.credential.as_ref());
        args.extend([
            "--dump-single-json".into(),
            "--skip-download".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--sleep-interval".into(),
            self.config.probe_sleep_interval.as_secs().to_string().into(),
            "--extractor-retries".into(),
            self.config.probe_extractor_retries.to_string().into(),
        ]);
        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    /// Arguments of a download run
    pub(crate) fn download_args(&self, request: &EngineRequest) -> Vec<OsString> {
        let mut args = self.common_args(request.credential.as_ref());

        args.extend([
            "--newline".into(),
            "--progress".into(),
            "--no-simulate".into(),
            "--retries".into(),
            self.config.retries.to_string().into(),
            "--fragment-retries".into(),
            self.config.fragment_retries.to_string().into(),
            "--extractor-retries".into(),
            self.config.extractor_retries.to_string().into(),
            "--paths".into(),
            request.output_dir.clone().into(),
            "--output".into(),
            OUTPUT_TEMPLATE.into(),
            "--progress-template".into(),
            format!("download:{} %(progress)j", PROGRESS_MARKER).into(),
            "--progress-template".into(),
            format!("postprocess:{} %(progress)j", POSTPROCESS_MARKER).into(),
            "--print".into(),
            format!("after_move:{} %(.{{id,title,filepath}})j", RESULT_MARKER).into(),
        ]);

        match request.format {
            OutputFormat::M4a => args.extend([
                "--format".into(),
                "bestaudio[ext=m4a]/bestaudio/best".into(),
                "--extract-audio".into(),
                "--audio-format".into(),
                "m4a".into(),
                "--audio-quality".into(),
                "0".into(),
                "--no-post-overwrites".into(),
            ]),
            OutputFormat::Mp4 => args.extend([
                "--format".into(),
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best".into(),
                "--merge-output-format".into(),
                "mp4".into(),
            ]),
        }

        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    fn command(&self, args: Vec<OsString>) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Where a captured line came from
#[derive(Clone, Copy, Debug)]
enum Stream {
    Stdout,
    Stderr,
}

/// Line reader over a child pipe that survives undecodable output
///
/// Invalid UTF-8 is replaced rather than ending the stream, so the pipe is
/// drained until the child closes it.
struct OutputLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, `None` once the pipe is closed
    ///
    /// Cancel safe: bytes read before a cancelled call stay buffered for the next one.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.reader.read_until(b'\n', &mut self.buf).await?;
        if self.buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}

#[async_trait]
impl MediaEngine for CliEngine {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeInfo, EngineError> {
        let output = self
            .command(self.probe_args(request))
            .output()
            .await
            .map_err(|e| EngineError::new(format!("failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_error = stderr
                .lines()
                .filter_map(parse_line)
                .filter_map(|line| match line {
                    EngineLine::Error(message) => Some(message),
                    _ => None,
                })
                .last();
            let tail: Vec<String> = stderr.lines().map(str::to_string).collect();
            return Err(EngineError::new(failure_message(
                last_error.as_deref(),
                &tail,
                output.status.code(),
            )));
        }

        parse_probe_output(&output.stdout)
    }

    async fn download(
        &self,
        request: &EngineRequest,
        events: mpsc::Sender<ProgressEvent>,
    ) -> Result<EngineOutput, EngineError> {
        let mut child = self
            .command(self.download_args(request))
            .spawn()
            .map_err(|e| EngineError::new(format!("failed to execute yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::new("yt-dlp stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::new("yt-dlp stderr was not captured"))?;
        let mut stdout = OutputLines::new(stdout);
        let mut stderr = OutputLines::new(stderr);

        let mut result: Option<EngineOutput> = None;
        let mut last_error: Option<String> = None;
        let mut stderr_tail: Vec<String> = Vec::new();
        let (mut stdout_open, mut stderr_open) = (true, true);

        while stdout_open || stderr_open {
            let (stream, line) = tokio::select! {
                line = stdout.next_line(), if stdout_open => (Stream::Stdout, line),
                line = stderr.next_line(), if stderr_open => (Stream::Stderr, line),
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    if let Err(e) = line {
                        warn!(?stream, error = %e, "failed to read yt-dlp output");
                    }
                    match stream {
                        Stream::Stdout => stdout_open = false,
                        Stream::Stderr => stderr_open = false,
                    }
                    continue;
                }
            };

            match parse_line(&line) {
                Some(EngineLine::Progress(event)) => {
                    // Receiver gone means nobody is tracking this task anymore
                    let _ = events.send(event).await;
                }
                Some(EngineLine::Result(output)) => result = Some(output),
                Some(EngineLine::Error(message)) => last_error = Some(message),
                None => {
                    trace!(line = %line, "yt-dlp output");
                    if matches!(stream, Stream::Stderr) {
                        if stderr_tail.len() == STDERR_TAIL {
                            stderr_tail.remove(0);
                        }
                        stderr_tail.push(line);
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::new(format!("failed to wait for yt-dlp: {}", e)))?;
        debug!(url = %request.url, code = ?status.code(), "yt-dlp exited");

        if !status.success() {
            return Err(EngineError::new(failure_message(
                last_error.as_deref(),
                &stderr_tail,
                status.code(),
            )));
        }

        result.ok_or_else(|| EngineError::new("could not obtain media information"))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

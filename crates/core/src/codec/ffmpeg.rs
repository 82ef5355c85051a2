//! FFmpeg-based codec backend.
//!
//! Each decoder runs one `ffmpeg` process that streams raw canonical PCM to
//! its stdout. Each output container runs one `ffmpeg` process that reads
//! canonical PCM on stdin and muxes AAC into an MPEG-4 file.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::probe::{run_ffprobe_blocking, ProbeError};

use super::config::FfmpegConfig;
use super::error::ConversionError;
use super::status::StatusCode;
use super::traits::{AudioCodec, OutputContainer, SourceDecoder};
use super::types::{NativeFormat, OutputFormat, PcmFormat};

/// Lines of ffmpeg stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 4;

const ENOENT: i32 = 2;

/// FFmpeg-based codec implementation.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    config: FfmpegConfig,
}

impl FfmpegCodec {
    /// Creates a new FFmpeg codec with the given configuration.
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Creates a codec with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FfmpegConfig::default())
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    /// Checks that ffmpeg and ffprobe can be executed.
    pub fn validate(&self) -> Result<(), ConversionError> {
        for (name, path) in [
            ("ffmpeg", &self.config.ffmpeg_path),
            ("ffprobe", &self.config.ffprobe_path),
        ] {
            let status = Command::new(path)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map_err(|e| spawn_error(name, path, &e))?;

            if !status.success() {
                return Err(ConversionError::FileOpen(format!(
                    "{} at {} exited with {}",
                    name,
                    path.display(),
                    status
                )));
            }
        }
        Ok(())
    }
}

/// Builds ffmpeg arguments that decode the first audio stream to raw PCM on stdout.
fn decoder_args(config: &FfmpegConfig, source: &Path, client: &PcmFormat) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        config.log_level.clone(),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:a:0".to_string(),
        "-vn".to_string(),
        "-f".to_string(),
        "s16be".to_string(),
        "-acodec".to_string(),
        "pcm_s16be".to_string(),
        "-ar".to_string(),
        client.sample_rate.to_string(),
        "-ac".to_string(),
        client.channels.to_string(),
        "pipe:1".to_string(),
    ]
}

/// Builds ffmpeg arguments that encode raw PCM from stdin into an AAC/MPEG-4 file.
fn encoder_args(
    config: &FfmpegConfig,
    output: &Path,
    client: &PcmFormat,
    bitrate: Option<u32>,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(), // Overwrite the placeholder created at open
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        config.log_level.clone(),
        "-f".to_string(),
        "s16be".to_string(),
        "-ar".to_string(),
        client.sample_rate.to_string(),
        "-ac".to_string(),
        client.channels.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
    ];

    if let Some(bps) = bitrate {
        args.extend(["-b:a".to_string(), bps.to_string()]);
    }

    args.extend(config.extra_args.iter().cloned());

    // Extension may be .m4b, so name the muxer explicitly
    args.extend([
        "-f".to_string(),
        "mp4".to_string(),
        output.to_string_lossy().to_string(),
    ]);

    args
}

fn spawn_error(name: &str, program: &Path, e: &io::Error) -> ConversionError {
    if e.kind() == io::ErrorKind::NotFound {
        ConversionError::FileOpen(format!("{} not found at path: {}", name, program.display()))
    } else {
        ConversionError::file_open(format!("spawning {}", name), e)
    }
}

fn probe_error(path: &Path, e: ProbeError) -> ConversionError {
    match e {
        ProbeError::NotFound { .. } => {
            let status = StatusCode(ENOENT).describe();
            ConversionError::FileOpen(format!("{}: {}", path.display(), status))
        }
        ProbeError::FfprobeNotFound { .. } => ConversionError::FileOpen(e.to_string()),
        ProbeError::Io(io_err) => ConversionError::file_open(path.display(), &io_err),
        ProbeError::Failed { .. } => {
            ConversionError::FileOpen(format!("{}: {}", path.display(), e))
        }
        ProbeError::Parse(_) => {
            ConversionError::unsupported_format(format!("{}: {}", path.display(), e))
        }
    }
}

/// A running ffmpeg child with its stderr drained on a helper thread.
struct FfmpegProcess {
    child: Child,
    stderr: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    fn spawn(
        program: &Path,
        args: &[String],
        stdin: Stdio,
        stdout: Stdio,
    ) -> Result<Self, ConversionError> {
        trace!("Spawning {} {:?}", program.display(), args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error("ffmpeg", program, &e))?;

        // An undrained stderr pipe can stall the child once it fills
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                tail_lines(&String::from_utf8_lossy(&buf), STDERR_TAIL_LINES)
            })
        });

        Ok(Self { child, stderr })
    }

    fn stderr_tail(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Waits for the child and maps a failed exit to an I/O error.
    fn finish(&mut self, action: &str) -> Result<(), ConversionError> {
        let status = self
            .child
            .wait()
            .map_err(|e| ConversionError::io(format!("waiting for ffmpeg while {}", action), &e))?;
        let stderr = self.stderr_tail();

        if status.success() {
            return Ok(());
        }

        let code = status
            .code()
            .map(|c| format!("exit code {}", c))
            .unwrap_or_else(|| "a signal".to_string());
        if stderr.is_empty() {
            Err(ConversionError::Io(format!(
                "ffmpeg terminated with {} while {}",
                code, action
            )))
        } else {
            Err(ConversionError::Io(format!(
                "ffmpeg terminated with {} while {}: {}",
                code, action, stderr
            )))
        }
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("; ")
}

/// Streaming decoder backed by an ffmpeg child process.
pub struct FfmpegDecoder {
    config: FfmpegConfig,
    source: PathBuf,
    native: NativeFormat,
    client: Option<PcmFormat>,
    stdout: Option<ChildStdout>,
    process: Option<FfmpegProcess>,
    finished: bool,
}

impl FfmpegDecoder {
    fn open(config: &FfmpegConfig, path: &Path) -> Result<Self, ConversionError> {
        let output =
            run_ffprobe_blocking(&config.ffprobe_path, path).map_err(|e| probe_error(path, e))?;

        let stream = output.audio_stream().ok_or_else(|| {
            ConversionError::unsupported_format(format!("{}: no audio stream", path.display()))
        })?;
        let sample_rate = stream.sample_rate().filter(|r| *r > 0).ok_or_else(|| {
            ConversionError::unsupported_format(format!("{}: unknown sample rate", path.display()))
        })?;
        let channels = stream.channels.filter(|c| *c > 0).ok_or_else(|| {
            ConversionError::unsupported_format(format!("{}: unknown channel layout", path.display()))
        })?;

        let native = NativeFormat {
            sample_rate,
            channels,
            total_frames: stream.total_frames(output.duration_secs()).unwrap_or(0),
            description: stream.description(),
        };

        debug!(
            "Opened {} ({}, {} Hz, {} ch, {} frames)",
            path.display(),
            native.description,
            native.sample_rate,
            native.channels,
            native.total_frames
        );

        Ok(Self {
            config: config.clone(),
            source: path.to_path_buf(),
            native,
            client: None,
            stdout: None,
            process: None,
            finished: false,
        })
    }

    fn start(&mut self, client: &PcmFormat) -> Result<(), ConversionError> {
        let args = decoder_args(&self.config, &self.source, client);
        let mut process =
            FfmpegProcess::spawn(&self.config.ffmpeg_path, &args, Stdio::null(), Stdio::piped())?;
        self.stdout = process.child.stdout.take();
        self.process = Some(process);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ConversionError> {
        self.finished = true;
        self.stdout = None;
        match self.process.as_mut() {
            Some(process) => process.finish(&format!("decoding {}", self.source.display())),
            None => Ok(()),
        }
    }
}

impl SourceDecoder for FfmpegDecoder {
    fn native_format(&self) -> &NativeFormat {
        &self.native
    }

    fn set_client_format(&mut self, format: &PcmFormat) -> Result<(), ConversionError> {
        if !format.is_canonical() {
            return Err(ConversionError::property_rejected(format!(
                "decoder client format must be signed 16-bit big-endian packed, got {:?}",
                format
            )));
        }
        if self.process.is_some() && self.client.as_ref() != Some(format) {
            return Err(ConversionError::property_rejected(
                "decoder client format cannot change after reading starts",
            ));
        }
        self.client = Some(*format);
        Ok(())
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize, ConversionError> {
        let client = self.client.ok_or_else(|| {
            ConversionError::property_rejected("decoder client format not set")
        })?;
        let frame_bytes = client.bytes_per_frame();
        let capacity = buf.len() / frame_bytes * frame_bytes;
        if capacity == 0 {
            return Err(ConversionError::property_rejected(
                "read buffer smaller than one frame",
            ));
        }
        if self.finished {
            return Ok(0);
        }
        if self.process.is_none() {
            self.start(&client)?;
        }

        let mut filled = 0;
        let mut eof = false;
        if let Some(stdout) = self.stdout.as_mut() {
            while filled < capacity {
                match stdout.read(&mut buf[filled..capacity]) {
                    Ok(0) => {
                        eof = true;
                        break;
                    }
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        return Err(ConversionError::io(
                            format!("reading decoded audio from {}", self.source.display()),
                            &e,
                        ))
                    }
                }
            }
        } else {
            eof = true;
        }

        if eof {
            self.finish()?;
        }

        // A trailing partial frame at end of stream is dropped
        Ok(filled / frame_bytes)
    }
}

/// AAC/MPEG-4 output container backed by an ffmpeg child process.
pub struct FfmpegContainer {
    config: FfmpegConfig,
    output: PathBuf,
    client: PcmFormat,
    bitrate: Option<u32>,
    frames_written: u64,
    stdin: Option<ChildStdin>,
    process: Option<FfmpegProcess>,
}

impl FfmpegContainer {
    fn create(
        config: &FfmpegConfig,
        path: &Path,
        format: &OutputFormat,
    ) -> Result<Self, ConversionError> {
        if format.sample_rate == 0 || !(1..=2).contains(&format.channels) {
            return Err(ConversionError::property_rejected(format!(
                "unsupported output layout: {} Hz, {} channels",
                format.sample_rate, format.channels
            )));
        }

        match fs::remove_file(path) {
            Ok(()) => debug!("Erased existing file at {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ConversionError::file_open(path.display(), &e)),
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ConversionError::file_open(parent.display(), &e))?;
        }

        // The encoder only starts on first write, so claim the path now
        fs::File::create(path).map_err(|e| ConversionError::file_open(path.display(), &e))?;

        Ok(Self {
            config: config.clone(),
            output: path.to_path_buf(),
            client: format.client_format(),
            bitrate: None,
            frames_written: 0,
            stdin: None,
            process: None,
        })
    }

    fn start(&mut self) -> Result<(), ConversionError> {
        let args = encoder_args(&self.config, &self.output, &self.client, self.bitrate);
        let mut process =
            FfmpegProcess::spawn(&self.config.ffmpeg_path, &args, Stdio::piped(), Stdio::null())?;
        self.stdin = process.child.stdin.take();
        self.process = Some(process);
        Ok(())
    }

    fn encoding_action(&self) -> String {
        format!("encoding {}", self.output.display())
    }

    /// Turns a failed pipe write into the encoder's own diagnostic when it has one.
    fn write_failure(&mut self, e: io::Error) -> ConversionError {
        self.stdin = None;
        let action = self.encoding_action();
        match self.process.as_mut().map(|p| p.finish(&action)) {
            Some(Err(encoder_err)) => encoder_err,
            _ => ConversionError::io(format!("writing audio to {}", self.output.display()), &e),
        }
    }
}

impl OutputContainer for FfmpegContainer {
    fn set_client_format(&mut self, format: &PcmFormat) -> Result<(), ConversionError> {
        if !format.is_canonical()
            || format.sample_rate != self.client.sample_rate
            || format.channels != self.client.channels
        {
            return Err(ConversionError::property_rejected(format!(
                "encoder input must be canonical PCM at {} Hz with {} channels, got {:?}",
                self.client.sample_rate, self.client.channels, format
            )));
        }
        Ok(())
    }

    fn set_bitrate(&mut self, bits_per_second: u32) -> Result<(), ConversionError> {
        if self.process.is_some() {
            return Err(ConversionError::property_rejected(
                "bitrate cannot change after encoding starts",
            ));
        }
        self.bitrate = (bits_per_second > 0).then_some(bits_per_second);
        Ok(())
    }

    fn write_frames(&mut self, buf: &[u8], frames: usize) -> Result<(), ConversionError> {
        let len = frames * self.client.bytes_per_frame();
        if len > buf.len() {
            return Err(ConversionError::Io(format!(
                "{} frames exceed the {} byte buffer",
                frames,
                buf.len()
            )));
        }
        if frames == 0 {
            return Ok(());
        }
        if self.process.is_none() {
            self.start()?;
        }

        let result = match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(&buf[..len]),
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        };
        if let Err(e) = result {
            return Err(self.write_failure(e));
        }

        self.frames_written += frames as u64;
        Ok(())
    }

    fn tell(&self) -> Result<u64, ConversionError> {
        Ok(self.frames_written)
    }

    fn close(mut self) -> Result<(), ConversionError> {
        if self.process.is_none() {
            self.start()?;
        }
        // Closing stdin signals end of input
        self.stdin = None;
        let action = self.encoding_action();
        match self.process.as_mut() {
            Some(process) => process.finish(&action),
            None => Ok(()),
        }
    }
}

impl AudioCodec for FfmpegCodec {
    type Decoder = FfmpegDecoder;
    type Container = FfmpegContainer;

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open_decoder(&self, path: &Path) -> Result<FfmpegDecoder, ConversionError> {
        FfmpegDecoder::open(&self.config, path)
    }

    fn create_container(
        &self,
        path: &Path,
        format: &OutputFormat,
    ) -> Result<FfmpegContainer, ConversionError> {
        FfmpegContainer::create(&self.config, path, format)
    }
}

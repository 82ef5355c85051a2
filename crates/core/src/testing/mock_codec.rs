//! Mock codec for testing.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::codec::{
    AudioCodec, ConversionError, NativeFormat, OutputContainer, OutputFormat, PcmFormat,
    SourceDecoder,
};

/// An in-memory source file: interleaved 16-bit samples at a native rate.
#[derive(Debug, Clone)]
pub struct MockSource {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
    pub description: String,
    /// Fail the read that would pass this many delivered frames.
    pub fail_after_frames: Option<(u64, ConversionError)>,
}

impl MockSource {
    pub fn new(path: impl Into<PathBuf>, sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        Self {
            path: path.into(),
            sample_rate,
            channels,
            samples,
            description: "Mock PCM".to_string(),
            fail_after_frames: None,
        }
    }

    /// A deterministic non-silent source of `frames` frames.
    ///
    /// Channels carry different values so layout mistakes show up in tests.
    pub fn tone(path: impl Into<PathBuf>, sample_rate: u32, channels: u16, frames: u64) -> Self {
        let channel_count = u64::from(channels);
        let samples = (0..frames * channel_count)
            .map(|i| {
                let frame = i / channel_count.max(1);
                let channel = i % channel_count.max(1);
                ((frame * 37 + channel * 1001) % 20_000) as i16 - 10_000
            })
            .collect();
        Self::new(path, sample_rate, channels, samples)
    }

    /// A tone lasting `duration_ms` at `sample_rate`.
    pub fn tone_ms(path: impl Into<PathBuf>, sample_rate: u32, channels: u16, duration_ms: u64) -> Self {
        let frames = duration_ms * u64::from(sample_rate) / 1000;
        Self::tone(path, sample_rate, channels, frames)
    }

    /// Makes reads fail once `frames` frames have been delivered.
    pub fn with_read_failure(mut self, frames: u64, error: ConversionError) -> Self {
        self.fail_after_frames = Some((frames, error));
        self
    }

    pub fn frames(&self) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        (self.samples.len() / usize::from(self.channels)) as u64
    }

    fn native_format(&self) -> NativeFormat {
        NativeFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            total_frames: self.frames(),
            description: self.description.clone(),
        }
    }
}

/// What happened to one container created through the mock.
#[derive(Debug, Clone, Default)]
pub struct ContainerRecord {
    pub path: PathBuf,
    pub format: Option<OutputFormat>,
    pub bitrate_calls: Vec<u32>,
    pub frames_written: u64,
    pub close_calls: usize,
    pub dropped: bool,
}

#[derive(Debug, Default)]
struct MockState {
    sources: HashMap<PathBuf, MockSource>,
    open_failures: HashMap<PathBuf, ConversionError>,
    create_failures: HashMap<PathBuf, ConversionError>,
    close_failures: HashMap<PathBuf, ConversionError>,
    decoders_opened: usize,
    decoders_released: usize,
    containers: Vec<ContainerRecord>,
}

/// Mock implementation of the AudioCodec trait.
///
/// Provides controllable behavior for testing:
/// - In-memory sources keyed by path
/// - Scripted open, read, create and close failures
/// - Containers that write raw canonical PCM to the real output path
/// - Accounting of decoder and container lifetimes
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
///
/// # Example
///
/// ```rust,ignore
/// use audiobinder_core::testing::{MockCodec, MockSource};
///
/// let codec = MockCodec::new();
/// codec.add_source(MockSource::tone_ms("/src/a.mp3", 44100, 2, 5000));
///
/// let binder = AudioBinder::new(codec.clone());
/// // bind...
///
/// assert_eq!(codec.containers_created(), 1);
/// assert!(codec.all_containers_closed_once());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockCodec {
    state: Arc<Mutex<MockState>>,
}

impl MockCodec {
    /// Create a new mock codec with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a source the decoder can open.
    pub fn add_source(&self, source: MockSource) {
        self.state().sources.insert(source.path.clone(), source);
    }

    /// Make opening `path` fail with `error`.
    pub fn fail_open(&self, path: impl Into<PathBuf>, error: ConversionError) {
        self.state().open_failures.insert(path.into(), error);
    }

    /// Make creating a container at `path` fail with `error`.
    pub fn fail_create(&self, path: impl Into<PathBuf>, error: ConversionError) {
        self.state().create_failures.insert(path.into(), error);
    }

    /// Make closing the container at `path` fail with `error`.
    pub fn fail_close(&self, path: impl Into<PathBuf>, error: ConversionError) {
        self.state().close_failures.insert(path.into(), error);
    }

    pub fn decoders_opened(&self) -> usize {
        self.state().decoders_opened
    }

    pub fn decoders_released(&self) -> usize {
        self.state().decoders_released
    }

    pub fn containers_created(&self) -> usize {
        self.state().containers.len()
    }

    /// Records for every container created, in creation order.
    pub fn containers(&self) -> Vec<ContainerRecord> {
        self.state().containers.clone()
    }

    /// Whether every container created was closed exactly once and released.
    pub fn all_containers_closed_once(&self) -> bool {
        self.state()
            .containers
            .iter()
            .all(|c| c.close_calls == 1 && c.dropped)
    }
}

impl AudioCodec for MockCodec {
    type Decoder = MockDecoder;
    type Container = MockContainer;

    fn name(&self) -> &str {
        "mock"
    }

    fn open_decoder(&self, path: &Path) -> Result<MockDecoder, ConversionError> {
        let mut state = self.state();
        if let Some(error) = state.open_failures.get(path) {
            return Err(error.clone());
        }
        let source = state.sources.get(path).cloned().ok_or_else(|| {
            ConversionError::FileOpen(format!("{}: err#2 (No such file or directory)", path.display()))
        })?;
        state.decoders_opened += 1;

        Ok(MockDecoder {
            native: source.native_format(),
            source,
            client: None,
            position: 0,
            state: Arc::clone(&self.state),
        })
    }

    fn create_container(
        &self,
        path: &Path,
        format: &OutputFormat,
    ) -> Result<MockContainer, ConversionError> {
        let mut state = self.state();
        if let Some(error) = state.create_failures.get(path) {
            return Err(error.clone());
        }

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ConversionError::file_open(path.display(), &e)),
        }
        let file = File::create(path).map_err(|e| ConversionError::file_open(path.display(), &e))?;

        state.containers.push(ContainerRecord {
            path: path.to_path_buf(),
            format: Some(*format),
            ..Default::default()
        });

        Ok(MockContainer {
            index: state.containers.len() - 1,
            file: Some(file),
            format: *format,
            client: None,
            frames_written: 0,
            state: Arc::clone(&self.state),
        })
    }
}

/// Decoder over a [`MockSource`].
///
/// Delivers the source's channels unchanged or downmixed to mono, resampled
/// by nearest frame when the client rate differs.
pub struct MockDecoder {
    source: MockSource,
    native: NativeFormat,
    client: Option<PcmFormat>,
    /// Frames delivered at the client rate.
    position: u64,
    state: Arc<Mutex<MockState>>,
}

impl MockDecoder {
    fn client_frames(&self, client: &PcmFormat) -> u64 {
        if client.sample_rate == self.source.sample_rate {
            self.source.frames()
        } else {
            self.native.frames_at_rate(client.sample_rate).unwrap_or(0)
        }
    }

    fn sample(&self, frame: u64, channel: u16, client: &PcmFormat) -> i16 {
        let source_frame = if client.sample_rate == self.source.sample_rate {
            frame
        } else {
            frame * u64::from(self.source.sample_rate) / u64::from(client.sample_rate)
        };
        let channels = usize::from(self.source.channels);
        let base = source_frame as usize * channels;

        if client.channels == self.source.channels {
            self.source.samples[base + usize::from(channel)]
        } else {
            let sum: i32 = self.source.samples[base..base + channels]
                .iter()
                .map(|&s| i32::from(s))
                .sum();
            (sum / channels as i32) as i16
        }
    }
}

impl SourceDecoder for MockDecoder {
    fn native_format(&self) -> &NativeFormat {
        &self.native
    }

    fn set_client_format(&mut self, format: &PcmFormat) -> Result<(), ConversionError> {
        if !format.is_canonical() {
            return Err(ConversionError::property_rejected(format!(
                "mock decoder only delivers canonical PCM, got {:?}",
                format
            )));
        }
        if format.channels != self.source.channels && format.channels != 1 {
            return Err(ConversionError::property_rejected(format!(
                "mock decoder cannot map {} channels to {}",
                self.source.channels, format.channels
            )));
        }
        self.client = Some(*format);
        Ok(())
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> Result<usize, ConversionError> {
        let client = self
            .client
            .ok_or_else(|| ConversionError::property_rejected("client format not set"))?;

        let mut limit = self.client_frames(&client);
        if let Some((fail_at, error)) = &self.source.fail_after_frames {
            if self.position >= *fail_at {
                return Err(error.clone());
            }
            limit = limit.min(*fail_at);
        }

        let capacity = (buf.len() / client.bytes_per_frame()) as u64;
        let frames = capacity.min(limit.saturating_sub(self.position));

        let mut offset = 0;
        for frame in self.position..self.position + frames {
            for channel in 0..client.channels {
                let bytes = self.sample(frame, channel, &client).to_be_bytes();
                buf[offset..offset + 2].copy_from_slice(&bytes);
                offset += 2;
            }
        }

        self.position += frames;
        Ok(frames as usize)
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.decoders_released += 1;
        }
    }
}

/// Container that appends raw canonical PCM to its output file.
pub struct MockContainer {
    index: usize,
    file: Option<File>,
    format: OutputFormat,
    client: Option<PcmFormat>,
    frames_written: u64,
    state: Arc<Mutex<MockState>>,
}

impl MockContainer {
    fn record<F: FnOnce(&mut ContainerRecord)>(&self, update: F) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(record) = state.containers.get_mut(self.index) {
            update(record);
        }
    }
}

impl OutputContainer for MockContainer {
    fn set_client_format(&mut self, format: &PcmFormat) -> Result<(), ConversionError> {
        if *format != self.format.client_format() {
            return Err(ConversionError::property_rejected(format!(
                "encoder input must be {:?}, got {:?}",
                self.format.client_format(),
                format
            )));
        }
        self.client = Some(*format);
        Ok(())
    }

    fn set_bitrate(&mut self, bits_per_second: u32) -> Result<(), ConversionError> {
        if self.frames_written > 0 {
            return Err(ConversionError::property_rejected(
                "bitrate cannot change after encoding starts",
            ));
        }
        self.record(|r| r.bitrate_calls.push(bits_per_second));
        Ok(())
    }

    fn write_frames(&mut self, buf: &[u8], frames: usize) -> Result<(), ConversionError> {
        let client = self
            .client
            .ok_or_else(|| ConversionError::property_rejected("client format not set"))?;
        let len = frames * client.bytes_per_frame();
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| ConversionError::Io("container already closed".to_string()))?;
        file.write_all(&buf[..len])
            .map_err(|e| ConversionError::io("writing mock container", &e))?;

        self.frames_written += frames as u64;
        let total = self.frames_written;
        self.record(|r| r.frames_written = total);
        Ok(())
    }

    fn tell(&self) -> Result<u64, ConversionError> {
        Ok(self.frames_written)
    }

    fn close(mut self) -> Result<(), ConversionError> {
        self.record(|r| r.close_calls += 1);

        let path = {
            let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.containers.get(self.index).map(|r| r.path.clone())
        };
        if let Some(file) = self.file.take() {
            file.sync_all()
                .map_err(|e| ConversionError::io("closing mock container", &e))?;
        }

        let failure = path.and_then(|p| {
            let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.close_failures.get(&p).cloned()
        });
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Drop for MockContainer {
    fn drop(&mut self) {
        self.record(|r| r.dropped = true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tone_layout() {
        let source = MockSource::tone("/a.wav", 8000, 2, 4);
        assert_eq!(source.frames(), 4);
        assert_ne!(source.samples[0], source.samples[1]);
        assert_eq!(MockSource::tone_ms("/b.wav", 8000, 1, 250).frames(), 2000);
    }

    #[test]
    fn test_decoder_resamples_and_downmixes() {
        let codec = MockCodec::new();
        codec.add_source(MockSource::new("/a.wav", 16000, 2, vec![100, 300, 5, 7, 1, 1, 9, 9]));

        let mut decoder = codec.open_decoder(Path::new("/a.wav")).unwrap();
        decoder.set_client_format(&PcmFormat::canonical(8000, 1)).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(decoder.read_frames(&mut buf).unwrap(), 2);
        assert_eq!(i16::from_be_bytes([buf[0], buf[1]]), 200);
        assert_eq!(i16::from_be_bytes([buf[2], buf[3]]), 1);
        assert_eq!(decoder.read_frames(&mut buf).unwrap(), 0);

        drop(decoder);
        assert_eq!(codec.decoders_opened(), 1);
        assert_eq!(codec.decoders_released(), 1);
    }

    #[test]
    fn test_read_failure_after_frames() {
        let codec = MockCodec::new();
        codec.add_source(
            MockSource::tone("/a.wav", 8000, 1, 100)
                .with_read_failure(10, ConversionError::Io("err#5 (I/O error)".to_string())),
        );
        let mut decoder = codec.open_decoder(Path::new("/a.wav")).unwrap();
        decoder.set_client_format(&PcmFormat::canonical(8000, 1)).unwrap();

        let mut buf = [0u8; 400];
        assert_eq!(decoder.read_frames(&mut buf).unwrap(), 10);
        assert!(matches!(decoder.read_frames(&mut buf), Err(ConversionError::Io(_))));
    }

    #[test]
    fn test_container_writes_pcm_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("v1.m4b");
        let codec = MockCodec::new();

        let mut container = codec.create_container(&path, &OutputFormat::new(8000, 2)).unwrap();
        container.set_client_format(&PcmFormat::canonical(8000, 2)).unwrap();
        container.set_bitrate(32000).unwrap();
        container.write_frames(&[0, 1, 0, 2, 0, 3, 0, 4], 2).unwrap();
        assert!(container.set_bitrate(64000).is_err());
        container.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![0, 1, 0, 2, 0, 3, 0, 4]);
        let records = codec.containers();
        assert_eq!(records[0].bitrate_calls, vec![32000]);
        assert_eq!(records[0].frames_written, 2);
        assert!(codec.all_containers_closed_once());
    }

    #[test]
    fn test_unknown_source_fails_open() {
        let codec = MockCodec::new();
        let result = codec.open_decoder(Path::new("/missing.mp3"));
        assert!(matches!(result, Err(ConversionError::FileOpen(_))));
        assert_eq!(codec.decoders_opened(), 0);
    }
}

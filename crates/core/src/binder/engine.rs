//! The conversion engine.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::codec::{
    frames_to_ms, AudioCodec, ChannelMap, ConversionError, OutputContainer, SourceDecoder,
};
use crate::metrics::{
    FILES_TOTAL, FILE_CONVERSION_DURATION, FRAMES_ENCODED, RUNS_TOTAL, VOLUMES_BOUND,
};
use crate::plan::{BindResult, FailureReason, RunConfig, Volume, VolumeOutcome, VolumePlan};
use crate::probe::SourceFile;

use super::observer::{ErrorPolicy, ProgressReporter};

/// Default size of the canonical PCM buffer moved per chunk.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Smallest accepted buffer size.
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;

const NO_INPUT_FILES: &str = "no input files";

/// Shared cancellation flag for a running [`AudioBinder`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation. Observed between chunks and between files.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Why a volume's file loop stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolumeStop {
    Rejected,
    Cancelled,
}

/// State owned by one `bind` call.
struct Session<'a> {
    config: &'a RunConfig,
    policy: &'a mut dyn ErrorPolicy,
    progress: &'a mut dyn ProgressReporter,
    /// Outputs this run created, in creation order.
    created: Vec<PathBuf>,
    total_frames: u64,
    files_converted: usize,
    files_failed: usize,
    volumes: Vec<VolumeOutcome>,
}

impl Session<'_> {
    fn structural(&mut self, volume: &str, reason: String) -> FailureReason {
        self.progress.volume_failed(volume, &reason);
        FailureReason::Structural {
            volume: volume.to_string(),
            reason,
        }
    }

    /// Deletes every output created by this run.
    fn delete_outputs(&self) {
        for path in &self.created {
            match fs::remove_file(path) {
                Ok(()) => info!("Deleted incomplete output {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
    }
}

/// Per-volume counters.
#[derive(Debug, Default)]
struct VolumeState {
    bitrate_applied: bool,
    files_converted: usize,
    files_failed: usize,
    /// Output frames of the files that converted.
    converted_frames: u64,
}

/// Binds the volumes of a plan into one encoded container each.
///
/// A single instance can run any number of plans, one at a time. Runs are
/// synchronous; call [`bind`](Self::bind) off latency-sensitive threads and
/// use a [`CancelHandle`] to stop it from elsewhere.
pub struct AudioBinder<C: AudioCodec> {
    codec: C,
    buffer_size: usize,
    cancel: CancelHandle,
}

impl<C: AudioCodec> AudioBinder<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            buffer_size: DEFAULT_BUFFER_SIZE,
            cancel: CancelHandle::default(),
        }
    }

    /// Sets the chunk buffer size in bytes, clamped to [`MIN_BUFFER_SIZE`].
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes.max(MIN_BUFFER_SIZE);
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// A handle that can cancel runs on this engine from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Runs the plan to completion, failure, or cancellation.
    ///
    /// On any outcome but success every output file created by this call is
    /// deleted before returning. The cancellation flag is cleared on return.
    pub fn bind(
        &self,
        plan: &VolumePlan,
        config: &RunConfig,
        policy: &mut dyn ErrorPolicy,
        progress: &mut dyn ProgressReporter,
    ) -> BindResult {
        let start = Instant::now();
        info!(
            "Binding {} volumes ({} files) with {} at {} Hz {}, bitrate {}",
            plan.len(),
            plan.file_count(),
            self.codec.name(),
            config.sample_rate,
            config.channels,
            config.bitrate
        );

        let mut session = Session {
            config,
            policy,
            progress,
            created: Vec::new(),
            total_frames: 0,
            files_converted: 0,
            files_failed: 0,
            volumes: Vec::with_capacity(plan.len()),
        };
        let result = self.run(plan, &mut session);

        self.cancel.reset();
        RUNS_TOTAL.with_label_values(&[result.label()]).inc();

        match &result {
            BindResult::Success {
                total_duration_ms, ..
            } => info!(
                "Bind succeeded: {} files converted, {} failed, {} ms of audio in {:?}",
                session.files_converted,
                session.files_failed,
                total_duration_ms,
                start.elapsed()
            ),
            BindResult::Failure { reason } => warn!(
                "Bind failed after {:?}: {} ({} files converted, {} failed)",
                start.elapsed(),
                reason,
                session.files_converted,
                session.files_failed
            ),
        }

        result
    }

    fn run(&self, plan: &VolumePlan, session: &mut Session<'_>) -> BindResult {
        if let Err(e) = session.config.validate() {
            let name = plan.volumes().first().map(Volume::name).unwrap_or_default();
            return BindResult::failure(session.structural(&name, e.to_string()));
        }

        for volume in plan.volumes() {
            match self.bind_volume(volume, session) {
                Ok(outcome) => session.volumes.push(outcome),
                Err(reason) => {
                    session.delete_outputs();
                    return BindResult::failure(reason);
                }
            }
        }

        if session.files_converted == 0 {
            session.delete_outputs();
            return BindResult::failure(FailureReason::NothingConverted);
        }

        let total_duration_ms = frames_to_ms(session.total_frames, session.config.sample_rate);
        session.progress.book_done(total_duration_ms);

        BindResult::Success {
            total_duration_ms,
            volumes: std::mem::take(&mut session.volumes),
        }
    }

    fn bind_volume(
        &self,
        volume: &Volume,
        session: &mut Session<'_>,
    ) -> Result<VolumeOutcome, FailureReason> {
        let name = volume.name();

        if self.cancel.is_cancelled() {
            return Err(FailureReason::Cancelled);
        }

        if volume.is_empty() {
            return Err(session.structural(&name, NO_INPUT_FILES.to_string()));
        }

        let format = session.config.output_format();
        let mut container = match self.codec.create_container(&volume.output_path, &format) {
            Ok(container) => container,
            Err(e) => {
                return Err(session.structural(&name, format!("can't create output file: {}", e)));
            }
        };
        session.created.push(volume.output_path.clone());
        debug!(
            "Opened volume {} (~{} ms expected)",
            volume.output_path.display(),
            volume.estimated_duration_ms()
        );

        let mut state = VolumeState::default();
        let stop = self.convert_files(volume, &mut container, &mut state, session);

        let encoded = container.tell().unwrap_or(state.converted_frames);
        let closed = container.close();
        debug!(
            "Closed volume {} ({} frames encoded, {} from converted files)",
            volume.output_path.display(),
            encoded,
            state.converted_frames
        );

        match stop {
            Some(VolumeStop::Cancelled) => {
                if let Err(e) = closed {
                    debug!("Closing cancelled volume {} failed: {}", name, e);
                }
                return Err(FailureReason::Cancelled);
            }
            Some(VolumeStop::Rejected) => {
                if let Err(e) = closed {
                    debug!("Closing rejected volume {} failed: {}", name, e);
                }
                return Err(FailureReason::Rejected { volume: name });
            }
            None => {}
        }

        if let Err(e) = closed {
            return Err(session.structural(&name, format!("can't finalise output file: {}", e)));
        }

        session.total_frames += state.converted_frames;
        let duration_ms = frames_to_ms(state.converted_frames, session.config.sample_rate);
        VOLUMES_BOUND.inc();
        session.progress.volume_done(&name, duration_ms);

        Ok(VolumeOutcome {
            output_path: volume.output_path.clone(),
            duration_ms,
            files_converted: state.files_converted,
            files_failed: state.files_failed,
        })
    }

    fn convert_files(
        &self,
        volume: &Volume,
        container: &mut C::Container,
        state: &mut VolumeState,
        session: &mut Session<'_>,
    ) -> Option<VolumeStop> {
        for file in &volume.files {
            if self.cancel.is_cancelled() {
                return Some(VolumeStop::Cancelled);
            }

            let started = Instant::now();
            let result = self.convert_file(file, container, state, session);
            let elapsed = started.elapsed().as_secs_f64();

            match result {
                Ok(frames) => {
                    FILES_TOTAL.with_label_values(&["converted"]).inc();
                    FILE_CONVERSION_DURATION
                        .with_label_values(&["converted"])
                        .observe(elapsed);
                    state.files_converted += 1;
                    state.converted_frames += frames;
                    session.files_converted += 1;
                    let duration_ms = frames_to_ms(frames, session.config.sample_rate);
                    session.progress.file_done(file, duration_ms);
                }
                Err(e) if e.is_cancelled() => {
                    FILES_TOTAL.with_label_values(&["cancelled"]).inc();
                    info!("Cancelled while converting {}", file.file_name());
                    return Some(VolumeStop::Cancelled);
                }
                Err(e) => {
                    FILES_TOTAL.with_label_values(&["failed"]).inc();
                    FILE_CONVERSION_DURATION
                        .with_label_values(&["failed"])
                        .observe(elapsed);
                    warn!("Failed to convert {}: {}", file.path.display(), e);
                    state.files_failed += 1;
                    session.files_failed += 1;

                    if !session.policy.continue_after(file, &e.to_string()) {
                        info!("Stopping volume {} after {}", volume.name(), file.file_name());
                        return Some(VolumeStop::Rejected);
                    }
                }
            }
        }
        None
    }

    /// Streams one source file into the volume's container.
    ///
    /// Returns the frames converted at the output sample rate.
    fn convert_file(
        &self,
        file: &SourceFile,
        container: &mut C::Container,
        state: &mut VolumeState,
        session: &mut Session<'_>,
    ) -> Result<u64, ConversionError> {
        let config = session.config;
        let mut decoder = self.codec.open_decoder(&file.path)?;

        let native = decoder.native_format().clone();
        let frames_total = native.frames_at_rate(config.sample_rate).ok_or_else(|| {
            ConversionError::unsupported_format(format!(
                "{}: unknown native sample rate",
                file.file_name()
            ))
        })?;
        session.progress.conversion_start(file, &native, frames_total);

        let target = config.output_format().client_format();
        let channel_map = ChannelMap::for_formats(native.channels, target.channels);
        let decoded = match &channel_map {
            Some(map) => target.with_channels(map.source_channels()),
            None => target,
        };
        decoder.set_client_format(&decoded)?;
        container.set_client_format(&target)?;

        if config.bitrate > 0 && !state.bitrate_applied {
            container.set_bitrate(config.bitrate)?;
            state.bitrate_applied = true;
        }

        let frames_per_chunk = self.buffer_size / target.bytes_per_frame();
        let mut buffer = vec![0u8; frames_per_chunk * decoded.bytes_per_frame()];
        let mut reshaped = match &channel_map {
            Some(map) => {
                let mapped = decoded.with_channels(map.output_channels());
                vec![0u8; frames_per_chunk * mapped.bytes_per_frame()]
            }
            None => Vec::new(),
        };

        let mut frames_done = 0u64;
        loop {
            let frames = decoder.read_frames(&mut buffer)?;
            if frames == 0 {
                break;
            }

            let chunk: &[u8] = match &channel_map {
                Some(map) => {
                    let mapped = map.remap(&buffer, frames, &mut reshaped);
                    &reshaped[..mapped * target.bytes_per_frame()]
                }
                None => &buffer[..frames * decoded.bytes_per_frame()],
            };
            container.write_frames(chunk, frames)?;

            frames_done += frames as u64;
            FRAMES_ENCODED.inc_by(frames as u64);
            session.progress.update_status(file, frames_done, frames_total);

            if self.cancel.is_cancelled() {
                return Err(ConversionError::Cancelled);
            }
        }

        Ok(frames_done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::SkipFailed;
    use crate::plan::Channels;
    use crate::testing::{MockCodec, MockSource, RecordingReporter};
    use tempfile::TempDir;

    fn stereo_config() -> RunConfig {
        RunConfig::new(Channels::Stereo, 8000, 0)
    }

    #[test]
    fn test_buffer_size_clamped() {
        let binder = AudioBinder::new(MockCodec::new()).with_buffer_size(16);
        assert_eq!(binder.buffer_size(), MIN_BUFFER_SIZE);
        assert_eq!(
            AudioBinder::new(MockCodec::new()).buffer_size(),
            DEFAULT_BUFFER_SIZE
        );
    }

    #[test]
    fn test_cancel_handle_shares_flag() {
        let binder = AudioBinder::new(MockCodec::new());
        let handle = binder.cancel_handle();
        handle.cancel();
        assert!(binder.cancel_handle().is_cancelled());
        binder.cancel.reset();
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_invalid_config_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let codec = MockCodec::new();
        codec.add_source(MockSource::tone("/src/a.wav", 8000, 2, 800));
        let output = temp_dir.path().join("v1.m4b");

        let mut plan = VolumePlan::default();
        plan.add_volume(&output, vec![SourceFile::with_duration("/src/a.wav", 100)])
            .unwrap();

        let binder = AudioBinder::new(codec);
        let mut reporter = RecordingReporter::new();
        let config = RunConfig::new(Channels::Stereo, 0, 0);
        let result = binder.bind(&plan, &config, &mut SkipFailed, &mut reporter);

        assert!(matches!(
            result.failure_reason(),
            Some(FailureReason::Structural { volume, .. }) if volume == "v1.m4b"
        ));
        assert_eq!(reporter.volume_failures().len(), 1);
        assert!(!output.exists());
        assert_eq!(binder.codec().containers_created(), 0);
    }

    #[test]
    fn test_frames_total_uses_target_rate() {
        let temp_dir = TempDir::new().unwrap();
        let codec = MockCodec::new();
        codec.add_source(MockSource::tone("/src/a.wav", 16000, 2, 1600));

        let mut plan = VolumePlan::default();
        plan.add_volume(
            temp_dir.path().join("v1.m4b"),
            vec![SourceFile::with_duration("/src/a.wav", 100)],
        )
        .unwrap();

        let binder = AudioBinder::new(codec);
        let mut reporter = RecordingReporter::new();
        let result = binder.bind(&plan, &stereo_config(), &mut SkipFailed, &mut reporter);

        assert_eq!(result.total_duration_ms(), Some(100));
        assert_eq!(reporter.conversion_totals(), vec![800]);
    }

    #[test]
    fn test_unknown_native_rate_goes_to_policy() {
        let temp_dir = TempDir::new().unwrap();
        let codec = MockCodec::new();
        codec.add_source(MockSource::tone("/src/zero.wav", 0, 2, 10));
        codec.add_source(MockSource::tone("/src/ok.wav", 8000, 2, 80));

        let mut plan = VolumePlan::default();
        plan.add_volume(
            temp_dir.path().join("v1.m4b"),
            vec![
                SourceFile::with_duration("/src/zero.wav", 0),
                SourceFile::with_duration("/src/ok.wav", 10),
            ],
        )
        .unwrap();

        let mut reasons = Vec::new();
        let mut policy = |_: &SourceFile, reason: &str| {
            reasons.push(reason.to_string());
            true
        };
        let binder = AudioBinder::new(codec);
        let result = binder.bind(&plan, &stereo_config(), &mut policy, &mut RecordingReporter::new());

        assert!(result.is_success());
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("unsupported format"));
    }

    #[test]
    fn test_decoder_error_reaches_policy_with_diagnostic() {
        let temp_dir = TempDir::new().unwrap();
        let codec = MockCodec::new();
        codec.fail_open(
            "/src/broken.mp3",
            ConversionError::FileOpen("/src/broken.mp3: err#13 (Permission denied)".to_string()),
        );

        let mut plan = VolumePlan::default();
        plan.add_volume(
            temp_dir.path().join("v1.m4b"),
            vec![SourceFile::with_duration("/src/broken.mp3", 1000)],
        )
        .unwrap();

        let mut reasons = Vec::new();
        let mut policy = |_: &SourceFile, reason: &str| {
            reasons.push(reason.to_string());
            false
        };
        let binder = AudioBinder::new(codec);
        let result = binder.bind(&plan, &stereo_config(), &mut policy, &mut RecordingReporter::new());

        assert_eq!(
            result.failure_reason(),
            Some(&FailureReason::Rejected {
                volume: "v1.m4b".to_string()
            })
        );
        assert_eq!(
            reasons,
            vec!["can't open file: /src/broken.mp3: err#13 (Permission denied)".to_string()]
        );
    }
}

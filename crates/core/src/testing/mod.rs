//! Testing utilities and mock implementations.
//!
//! This module provides a mock codec and recording observers, allowing the
//! engine to be driven end to end without ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use audiobinder_core::testing::{MockCodec, MockSource, RecordingReporter, ScriptedPolicy};
//!
//! let codec = MockCodec::new();
//! codec.add_source(MockSource::tone_ms("/src/a.mp3", 44100, 2, 5000));
//!
//! let binder = AudioBinder::new(codec.clone());
//! let mut reporter = RecordingReporter::new();
//! let result = binder.bind(&plan, &config, &mut ScriptedPolicy::always(true), &mut reporter);
//! ```

mod mock_codec;
mod recording;

pub use mock_codec::{ContainerRecord, MockCodec, MockContainer, MockDecoder, MockSource};
pub use recording::{ProgressEvent, RecordingReporter, ScriptedPolicy};

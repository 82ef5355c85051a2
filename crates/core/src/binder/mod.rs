//! Binder module: the conversion engine and the capabilities it reports to.
//!
//! [`AudioBinder::bind`] walks a [`VolumePlan`](crate::plan::VolumePlan) in
//! order, streaming every source file of a volume through one output
//! container. Per-file failures go to an [`ErrorPolicy`]; progress goes to a
//! [`ProgressReporter`]. A failed or cancelled run removes every output it
//! created.
//!
//! # Example
//!
//! ```ignore
//! use audiobinder_core::binder::{AudioBinder, SkipFailed, TracingReporter};
//! use audiobinder_core::codec::FfmpegCodec;
//!
//! let binder = AudioBinder::new(FfmpegCodec::with_defaults());
//! let cancel = binder.cancel_handle();
//!
//! let result = binder.bind(&plan, &config, &mut SkipFailed, &mut TracingReporter::new());
//! ```

mod engine;
mod observer;

pub use engine::{AudioBinder, CancelHandle, DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use observer::{
    AbortOnFailure, ErrorPolicy, NullReporter, ProgressReporter, SkipFailed, TracingReporter,
};

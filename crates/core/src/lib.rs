pub mod binder;
pub mod codec;
pub mod config;
pub mod metrics;
pub mod plan;
pub mod probe;
pub mod testing;

pub use binder::{
    AbortOnFailure, AudioBinder, CancelHandle, ErrorPolicy, NullReporter, ProgressReporter,
    SkipFailed, TracingReporter,
};
pub use codec::{AudioCodec, ConversionError, FfmpegCodec, FfmpegConfig, StatusCode};
pub use config::{
    load_settings, load_settings_from_env, load_settings_from_str, validate_settings,
    ConfigError, EngineConfig, LoggingConfig, Settings,
};
pub use plan::{
    BindResult, Channels, FailureReason, PlanError, RunConfig, Volume, VolumeOutcome, VolumePlan,
};
pub use probe::{probe_all, FfprobeProber, Prober, SourceFile};

//! Prometheus metrics for binding runs.
//!
//! This module provides metrics for:
//! - Runs (outcome by result)
//! - Files (converted, failed, cancelled, conversion time)
//! - Volumes and encoded audio

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// Run Metrics
// =============================================================================

/// Runs total by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("audiobinder_runs_total", "Total bind runs"),
        &["result"], // "success", "failure", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// File Metrics
// =============================================================================

/// Source files processed by result.
pub static FILES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("audiobinder_files_total", "Total source files processed"),
        &["result"], // "converted", "failed", "cancelled"
    )
    .unwrap()
});

/// Wall-clock time spent converting one source file.
pub static FILE_CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "audiobinder_file_conversion_duration_seconds",
            "Duration of single-file conversions",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Output Metrics
// =============================================================================

/// Volumes written and closed successfully.
pub static VOLUMES_BOUND: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("audiobinder_volumes_bound_total", "Total volumes bound").unwrap()
});

/// PCM frames handed to output encoders.
pub static FRAMES_ENCODED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "audiobinder_frames_encoded_total",
        "Total PCM frames written to output containers",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Register all metrics with the given registry.
pub fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RUNS_TOTAL.clone()),
        Box::new(FILES_TOTAL.clone()),
        Box::new(FILE_CONVERSION_DURATION.clone()),
        Box::new(VOLUMES_BOUND.clone()),
        Box::new(FRAMES_ENCODED.clone()),
    ];

    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_includes_touched_metrics() {
        RUNS_TOTAL.with_label_values(&["success"]).inc();
        FILES_TOTAL.with_label_values(&["converted"]).inc();
        FILE_CONVERSION_DURATION
            .with_label_values(&["converted"])
            .observe(0.2);
        VOLUMES_BOUND.inc();
        FRAMES_ENCODED.inc_by(1024);

        let output = gather_metrics().unwrap();

        assert!(output.contains("audiobinder_runs_total"));
        assert!(output.contains("audiobinder_files_total"));
        assert!(output.contains("audiobinder_file_conversion_duration_seconds"));
        assert!(output.contains("audiobinder_volumes_bound_total"));
        assert!(output.contains("audiobinder_frames_encoded_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_register_twice_does_not_panic() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);

        VOLUMES_BOUND.inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"audiobinder_volumes_bound_total".to_string()));
    }
}

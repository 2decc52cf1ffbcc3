//! Prometheus metrics for the conversion engine.
//!
//! The statics are created lazily and are not registered anywhere by default;
//! a host that exposes metrics calls [`register_metrics`] on its registry.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// =============================================================================
// Files
// =============================================================================

/// Files processed total by result and target format.
pub static FILES_CONVERTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("lofizer_files_converted_total", "Total files processed"),
        &["result", "format"], // result: "success" or an error kind
    )
    .unwrap()
});

/// Per-file conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "lofizer_conversion_duration_seconds",
            "Duration of single file conversions",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["format"],
    )
    .unwrap()
});

/// Bytes written to output files.
pub static BYTES_WRITTEN: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("lofizer_bytes_written_total", "Total bytes written to outputs").unwrap()
});

/// Conversions currently running.
pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("lofizer_active_jobs", "Conversions currently in progress").unwrap()
});

// =============================================================================
// Batches
// =============================================================================

/// Batches total by result.
pub static BATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("lofizer_batches_total", "Total batches run"),
        &["result"], // "completed", "partial", "aborted", "cancelled"
    )
    .unwrap()
});

/// Output name collisions detected.
pub static COLLISIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "lofizer_output_collisions_total",
        "Output paths targeted by more than one input",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(FILES_CONVERTED.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(BYTES_WRITTEN.clone()),
        Box::new(ACTIVE_JOBS.clone()),
        Box::new(BATCHES.clone()),
        Box::new(COLLISIONS.clone()),
    ]
}

/// Registers every metric with `registry`.
pub fn register_metrics(registry: &Registry) -> prometheus::Result<()> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();

        FILES_CONVERTED.with_label_values(&["success", "wav"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "lofizer_files_converted_total"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();
        assert!(register_metrics(&registry).is_err());
    }
}

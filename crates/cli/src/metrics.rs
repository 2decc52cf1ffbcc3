//! Metrics export for one-shot runs.
//!
//! A CLI run is too short-lived to be scraped, so the registry is written
//! once at exit in the Prometheus text format, suitable for node_exporter's
//! textfile collector.

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::warn;

use lofizer_core::metrics::register_metrics;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    if let Err(e) = register_metrics(&registry) {
        warn!("Failed to register metrics: {}", e);
    }
    registry
});

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics are not valid UTF-8")
}

/// Write the encoded metrics to `path`.
pub async fn write_metrics(path: &Path) -> Result<()> {
    let text = encode_metrics()?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write metrics to {:?}", path))
}

//! Configuration for the engine module.

use serde::{Deserialize, Serialize};

/// Configuration for the batch conversion engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum files converted at the same time. `1` processes strictly in order.
    #[serde(default = "default_max_parallel")]
    pub max_parallel_jobs: usize,

    /// Suffix of the temporary files outputs are written through.
    #[serde(default = "default_temp_suffix")]
    pub temp_suffix: String,

    /// Capacity of the event channel created by shells.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_parallel() -> usize {
    1
}

fn default_temp_suffix() -> String {
    ".part".to_string()
}

fn default_event_buffer() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_jobs: default_max_parallel(),
            temp_suffix: default_temp_suffix(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl EngineConfig {
    /// Sets the maximum parallel jobs.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel_jobs = max;
        self
    }

    /// Sets the temporary file suffix.
    pub fn with_temp_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.temp_suffix = suffix.into();
        self
    }
}

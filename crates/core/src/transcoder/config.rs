//! Configuration for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based transcoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Timeout for probing and encoding a single file, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional ffmpeg output arguments, inserted before the output target.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_timeout() -> u64 {
    600
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_timeout(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the ffmpeg log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.ffmpeg_log_level = level.into();
        self
    }
}

//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::params::AudioFormat;

/// Information about an audio file, as reported by the prober.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Container format (e.g., "wav", "mp3").
    pub format: String,
    /// Audio codec of the first audio stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    /// Audio bitrate in kbps (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate_kbps: Option<u32>,
    /// Audio sample rate (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
    /// Audio channels (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u8>,
}

impl MediaInfo {
    /// Whether the file carries at least one audio stream.
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

/// A fully encoded file held in memory, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    /// Encoded bytes, including container headers.
    pub data: Vec<u8>,
    /// Target format of `data`.
    pub format: AudioFormat,
    /// Sample rate of `data` in Hz.
    pub sample_rate_hz: u32,
}

impl EncodedAudio {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

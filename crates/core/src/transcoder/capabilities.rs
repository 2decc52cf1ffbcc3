//! Encoder capability detection and MP3 encoding tables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::error::TranscodeError;
use crate::params::{BitDepth, Bitrate, ConversionParameters, TargetEncoding};

/// MPEG audio version implied by an MP3 sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegVersion {
    /// Version whose sample rate table contains `hz`.
    pub fn for_sample_rate(hz: u32) -> Option<Self> {
        match hz {
            32_000 | 44_100 | 48_000 => Some(Self::Mpeg1),
            16_000 | 22_050 | 24_000 => Some(Self::Mpeg2),
            8_000 | 11_025 | 12_000 => Some(Self::Mpeg25),
            _ => None,
        }
    }

    /// Layer III bitrates in kbps allowed for this version.
    pub fn bitrates(self) -> &'static [u32] {
        match self {
            Self::Mpeg1 => &[32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
            Self::Mpeg2 | Self::Mpeg25 => {
                &[8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160]
            }
        }
    }
}

/// Sample rates an MP3 stream can carry.
pub const MP3_SAMPLE_RATES: [u32; 9] = [
    8_000, 11_025, 12_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000,
];

/// Checks an MP3 sample rate/bitrate pair against the MPEG tables.
pub fn check_mp3(sample_rate_hz: u32, bitrate: Bitrate) -> Result<MpegVersion, TranscodeError> {
    let version = MpegVersion::for_sample_rate(sample_rate_hz).ok_or_else(|| {
        TranscodeError::unsupported_encoding(format!(
            "MP3 cannot be encoded at {} Hz (supported: {:?})",
            sample_rate_hz, MP3_SAMPLE_RATES
        ))
    })?;

    if !version.bitrates().contains(&bitrate.kbps()) {
        return Err(TranscodeError::unsupported_encoding(format!(
            "MP3 at {} Hz does not support {} (supported kbps: {:?})",
            sample_rate_hz,
            bitrate,
            version.bitrates()
        )));
    }

    Ok(version)
}

/// Checks that `params` can be encoded at all, before any process is spawned.
pub fn check_encoding(params: &ConversionParameters) -> Result<(), TranscodeError> {
    match params.encoding() {
        TargetEncoding::Mp3 { bitrate } => check_mp3(params.sample_rate_hz(), bitrate).map(|_| ()),
        TargetEncoding::Wav { .. } => Ok(()),
    }
}

/// Name of the ffmpeg encoder that produces `params`.
pub fn encoder_name(params: &ConversionParameters) -> &'static str {
    match params.encoding() {
        TargetEncoding::Mp3 { .. } => "libmp3lame",
        TargetEncoding::Wav { bit_depth } => bit_depth.ffmpeg_codec(),
    }
}

/// Audio encoders found in the local ffmpeg build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    /// LAME MP3 encoder available
    pub libmp3lame: bool,
    pub pcm_u8: bool,
    pub pcm_s16le: bool,
    pub pcm_s24le: bool,
    pub pcm_s32le: bool,
}

impl EncoderCapabilities {
    /// Detects available encoders from `ffmpeg -encoders`.
    ///
    /// Returns `None` when ffmpeg could not be run at all.
    pub async fn detect(ffmpeg_path: &Path) -> Option<Self> {
        let output = Command::new(ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => {
                Some(Self::from_listing(&String::from_utf8_lossy(&o.stdout)))
            }
            _ => None,
        }
    }

    /// Parses the output of `ffmpeg -encoders`.
    pub fn from_listing(listing: &str) -> Self {
        let has = |name: &str| {
            listing
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(name))
        };

        Self {
            libmp3lame: has("libmp3lame"),
            pcm_u8: has("pcm_u8"),
            pcm_s16le: has("pcm_s16le"),
            pcm_s24le: has("pcm_s24le"),
            pcm_s32le: has("pcm_s32le"),
        }
    }

    /// Whether the encoder for `params` is available.
    pub fn supports(&self, params: &ConversionParameters) -> bool {
        match params.encoding() {
            TargetEncoding::Mp3 { .. } => self.libmp3lame,
            TargetEncoding::Wav { bit_depth } => match bit_depth {
                BitDepth::Eight => self.pcm_u8,
                BitDepth::Sixteen => self.pcm_s16le,
                BitDepth::TwentyFour => self.pcm_s24le,
                BitDepth::ThirtyTwo => self.pcm_s32le,
            },
        }
    }

    /// Names of expected encoders that are missing.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("libmp3lame", self.libmp3lame),
            ("pcm_u8", self.pcm_u8),
            ("pcm_s16le", self.pcm_s16le),
            ("pcm_s24le", self.pcm_s24le),
            ("pcm_s32le", self.pcm_s32le),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect()
    }
}

//! Types for the params module.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

use super::error::ValidationError;

/// Sample rates offered by the reference shell, in Hz.
pub const COMMON_SAMPLE_RATES: [u32; 8] = [4000, 8000, 11025, 16000, 22050, 32000, 44100, 48000];

/// Bitrate tokens offered by the reference shell.
pub const COMMON_BITRATES: [&str; 10] = [
    "8k", "16k", "32k", "48k", "64k", "96k", "128k", "192k", "256k", "320k",
];

static BITRATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,6})[kK]$").expect("bitrate pattern is valid"));

/// Target container/codec pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// WAVE container with linear PCM samples.
    Wav,
    /// MPEG Audio Layer III
    Mp3,
}

impl AudioFormat {
    /// Every supported target format.
    pub const ALL: [AudioFormat; 2] = [AudioFormat::Wav, AudioFormat::Mp3];

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    /// Returns the ffmpeg muxer name for this format.
    pub fn ffmpeg_muxer(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    /// Looks up a format by its user-facing token (case-insensitive).
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Width of a PCM sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    Eight,
    Sixteen,
    TwentyFour,
    ThirtyTwo,
}

impl BitDepth {
    /// Bits per sample.
    pub fn bits(self) -> u16 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::TwentyFour => 24,
            Self::ThirtyTwo => 32,
        }
    }

    /// Bytes per sample.
    pub fn bytes_per_sample(self) -> u16 {
        self.bits() / 8
    }

    /// Looks up a bit depth by its width in bits.
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(Self::Eight),
            16 => Some(Self::Sixteen),
            24 => Some(Self::TwentyFour),
            32 => Some(Self::ThirtyTwo),
            _ => None,
        }
    }

    /// Returns the ffmpeg PCM codec producing samples of this width.
    ///
    /// 8-bit WAV is unsigned by convention, the wider widths are signed
    /// little-endian.
    pub fn ffmpeg_codec(self) -> &'static str {
        match self {
            Self::Eight => "pcm_u8",
            Self::Sixteen => "pcm_s16le",
            Self::TwentyFour => "pcm_s24le",
            Self::ThirtyTwo => "pcm_s32le",
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = String;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        Self::from_bits(bits).ok_or_else(|| format!("unsupported bit depth: {}", bits))
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Average bitrate of a lossy stream, in kilobits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bitrate {
    kbps: NonZeroU32,
}

impl Bitrate {
    /// Creates a bitrate from a kbps value, rejecting zero.
    pub fn from_kbps(kbps: u32) -> Option<Self> {
        NonZeroU32::new(kbps).map(|kbps| Self { kbps })
    }

    /// Parses a `<digits>k` token such as `32k`.
    pub fn parse(token: &str) -> Option<Self> {
        let caps = BITRATE_TOKEN.captures(token.trim())?;
        let kbps = caps.get(1)?.as_str().parse::<u32>().ok()?;
        Self::from_kbps(kbps)
    }

    /// Kilobits per second.
    pub fn kbps(&self) -> u32 {
        self.kbps.get()
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.kbps)
    }
}

impl TryFrom<String> for Bitrate {
    type Error = String;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        Self::parse(&token).ok_or_else(|| format!("invalid bitrate: {}", token))
    }
}

impl From<Bitrate> for String {
    fn from(bitrate: Bitrate) -> Self {
        bitrate.to_string()
    }
}

/// Format-specific encoding settings.
///
/// Only the setting that applies to the chosen format exists, so a bitrate
/// left over from a previous MP3 selection can never leak into a WAV run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum TargetEncoding {
    /// PCM in a WAVE container.
    Wav { bit_depth: BitDepth },
    /// MP3 at a constant bitrate.
    Mp3 { bitrate: Bitrate },
}

impl TargetEncoding {
    /// Returns the target format.
    pub fn format(&self) -> AudioFormat {
        match self {
            Self::Wav { .. } => AudioFormat::Wav,
            Self::Mp3 { .. } => AudioFormat::Mp3,
        }
    }
}

/// Validated, immutable description of one batch's target encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionParameters {
    sample_rate_hz: NonZeroU32,
    encoding: TargetEncoding,
}

impl ConversionParameters {
    /// Creates parameters, rejecting a zero sample rate.
    pub fn new(sample_rate_hz: u32, encoding: TargetEncoding) -> Result<Self, ValidationError> {
        let sample_rate_hz = NonZeroU32::new(sample_rate_hz)
            .ok_or_else(|| ValidationError::unsupported("sample_rate_hz", sample_rate_hz))?;
        Ok(Self {
            sample_rate_hz,
            encoding,
        })
    }

    /// WAV output at the given rate and bit depth.
    pub fn wav(sample_rate_hz: u32, bit_depth: BitDepth) -> Result<Self, ValidationError> {
        Self::new(sample_rate_hz, TargetEncoding::Wav { bit_depth })
    }

    /// MP3 output at the given rate and bitrate.
    pub fn mp3(sample_rate_hz: u32, bitrate: Bitrate) -> Result<Self, ValidationError> {
        Self::new(sample_rate_hz, TargetEncoding::Mp3 { bitrate })
    }

    pub fn target_format(&self) -> AudioFormat {
        self.encoding.format()
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz.get()
    }

    pub fn encoding(&self) -> TargetEncoding {
        self.encoding
    }

    /// Bit depth, when the target is PCM.
    pub fn bit_depth(&self) -> Option<BitDepth> {
        match self.encoding {
            TargetEncoding::Wav { bit_depth } => Some(bit_depth),
            TargetEncoding::Mp3 { .. } => None,
        }
    }

    /// Bitrate, when the target is lossy.
    pub fn bitrate(&self) -> Option<Bitrate> {
        match self.encoding {
            TargetEncoding::Mp3 { bitrate } => Some(bitrate),
            TargetEncoding::Wav { .. } => None,
        }
    }

    /// The `{rate}-{depth|bitrate}` part of output file names.
    pub fn suffix(&self) -> String {
        match self.encoding {
            TargetEncoding::Wav { bit_depth } => format!("{}-{}", self.sample_rate_hz, bit_depth),
            TargetEncoding::Mp3 { bitrate } => format!("{}-{}", self.sample_rate_hz, bitrate),
        }
    }
}

impl fmt::Display for ConversionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encoding {
            TargetEncoding::Wav { bit_depth } => {
                write!(f, "wav {} Hz {}-bit", self.sample_rate_hz, bit_depth)
            }
            TargetEncoding::Mp3 { bitrate } => {
                write!(f, "mp3 {} Hz {}", self.sample_rate_hz, bitrate)
            }
        }
    }
}

/// Unvalidated parameters as collected by a shell or read from config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawParameters {
    /// Target format token (`wav`, `mp3`).
    #[serde(alias = "format", skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    /// Target sample rate in Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
    /// Bitrate token (`32k`), read for lossy formats only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    /// Bit depth, read for PCM formats only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u16>,
}

impl RawParameters {
    /// The defaults of the reference shell: 8 kHz, 16-bit WAV, `32k` for MP3.
    pub fn reference_defaults() -> Self {
        Self {
            target_format: Some(AudioFormat::Wav.extension().to_string()),
            sample_rate_hz: Some(8000),
            bitrate: Some("32k".to_string()),
            bit_depth: Some(16),
        }
    }

    /// Sets the target format token.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.target_format = Some(format.into());
        self
    }

    /// Sets the sample rate.
    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate_hz = Some(hz);
        self
    }

    /// Sets the bitrate token.
    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = Some(bitrate.into());
        self
    }

    /// Sets the bit depth.
    pub fn with_bit_depth(mut self, bits: u16) -> Self {
        self.bit_depth = Some(bits);
        self
    }

    /// Fills every unset field from `fallback`.
    pub fn or(self, fallback: &RawParameters) -> Self {
        Self {
            target_format: self.target_format.or_else(|| fallback.target_format.clone()),
            sample_rate_hz: self.sample_rate_hz.or(fallback.sample_rate_hz),
            bitrate: self.bitrate.or_else(|| fallback.bitrate.clone()),
            bit_depth: self.bit_depth.or(fallback.bit_depth),
        }
    }
}

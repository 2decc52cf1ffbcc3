//! Transcoder module for decoding, resampling and re-encoding audio files.
//!
//! This module provides the `Transcoder` trait and an FFmpeg-backed
//! implementation. A transcoder returns the encoded bytes of one input; it
//! never places files itself.
//!
//! # Features
//!
//! - Input probing via ffprobe (`MediaInfo`)
//! - Resampling to any positive sample rate
//! - WAV output at 8, 16, 24 or 32 bits per sample
//! - MP3 output via LAME, with sample rate/bitrate checked up front
//!
//! # Example
//!
//! ```ignore
//! use lofizer_core::params::{BitDepth, ConversionParameters};
//! use lofizer_core::transcoder::{FfmpegTranscoder, Transcoder};
//!
//! let transcoder = FfmpegTranscoder::with_defaults();
//! transcoder.validate().await?;
//!
//! let params = ConversionParameters::wav(8000, BitDepth::Sixteen)?;
//! let encoded = transcoder.transcode(Path::new("song.mp3"), &params).await?;
//! println!("{} bytes of {}", encoded.len(), encoded.format);
//! ```

mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;
pub mod wav;

pub use capabilities::{
    check_encoding, check_mp3, EncoderCapabilities, MpegVersion, MP3_SAMPLE_RATES,
};
pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
pub use types::{EncodedAudio, MediaInfo};

//! WAV helpers built on `hound`.
//!
//! ffmpeg cannot seek back on `pipe:1`, so the WAV it streams carries
//! placeholder RIFF and `data` sizes. [`patch_sizes`] rewrites them from the
//! captured length, after which [`inspect`] reads the header back so the
//! transcoder can verify what was actually produced. [`decode`], [`encode`]
//! and [`PcmAudio::resample`] work on samples in-process; the mock transcoder
//! and the test fixtures are built on them.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

use crate::params::BitDepth;

/// Errors raised while reading or writing WAV data.
#[derive(Debug, Error)]
pub enum WavError {
    /// Data does not start with a RIFF/WAVE signature.
    #[error("Not a RIFF/WAVE stream")]
    NotRiff,

    /// No `data` chunk was found.
    #[error("Missing data chunk")]
    MissingDataChunk,

    /// Sample encoding this module cannot interpret.
    #[error("Unsupported WAV encoding: {bits_per_sample}-bit {format:?}")]
    UnsupportedEncoding {
        format: SampleFormat,
        bits_per_sample: u16,
    },

    #[error(transparent)]
    Hound(#[from] hound::Error),
}

/// What a WAV header says about the stream that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub spec: WavSpec,
    /// Number of frames (one sample per channel).
    pub frames: u32,
    /// Length of the `data` chunk in bytes.
    pub data_len: usize,
}

impl WavInfo {
    /// Bytes used by one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.spec.bits_per_sample).div_ceil(8)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.spec.sample_rate == 0 {
            return 0.0;
        }
        f64::from(self.frames) / f64::from(self.spec.sample_rate)
    }
}

/// Position of the `data` chunk inside a RIFF/WAVE buffer.
struct DataChunk {
    /// Offset of the chunk's size field.
    size_at: usize,
    /// Sample bytes actually present.
    len: usize,
}

fn locate_data(bytes: &[u8]) -> Result<DataChunk, WavError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::NotRiff);
    }

    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let size = read_u32(bytes, pos + 4) as usize;
        let body = pos + 8;

        if &bytes[pos..pos + 4] == b"data" {
            // Streaming placeholders (0 or 0xFFFFFFFF) and overruns fall back
            // to what was captured.
            let available = bytes.len() - body;
            let len = if size == 0 || size == u32::MAX as usize || size > available {
                available
            } else {
                size
            };
            return Ok(DataChunk {
                size_at: pos + 4,
                len,
            });
        }

        // Chunks are word aligned.
        pos = body.saturating_add(size).saturating_add(size & 1);
    }

    Err(WavError::MissingDataChunk)
}

/// Reads the header of a complete WAV byte stream.
pub fn inspect(bytes: &[u8]) -> Result<WavInfo, WavError> {
    let chunk = locate_data(bytes)?;
    let reader = WavReader::new(Cursor::new(bytes))?;
    Ok(WavInfo {
        spec: reader.spec(),
        frames: reader.duration(),
        data_len: chunk.len,
    })
}

/// Rewrites the RIFF and `data` chunk sizes to match the buffer length.
pub fn patch_sizes(bytes: &mut [u8]) -> Result<WavInfo, WavError> {
    let chunk = locate_data(bytes)?;
    let riff_len = u32::try_from(bytes.len() - 8).unwrap_or(u32::MAX);
    let data_len = u32::try_from(chunk.len).unwrap_or(u32::MAX);

    bytes[4..8].copy_from_slice(&riff_len.to_le_bytes());
    bytes[chunk.size_at..chunk.size_at + 4].copy_from_slice(&data_len.to_le_bytes());

    inspect(bytes)
}

/// Interleaved samples normalised to `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl PcmAudio {
    /// Number of frames.
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            channels => self.samples.len() / usize::from(channels),
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Linear-interpolation resampling to `target_rate`.
    ///
    /// The output frame count is the input frame count scaled by the rate
    /// ratio, rounded to the nearest frame.
    pub fn resample(&self, target_rate: u32) -> PcmAudio {
        if target_rate == self.sample_rate || self.sample_rate == 0 || self.channels == 0 {
            return PcmAudio {
                sample_rate: target_rate,
                ..self.clone()
            };
        }

        let channels = usize::from(self.channels);
        let in_frames = self.frames();
        let out_frames = ((in_frames as u64 * u64::from(target_rate)
            + u64::from(self.sample_rate) / 2)
            / u64::from(self.sample_rate)) as usize;
        let step = f64::from(self.sample_rate) / f64::from(target_rate);

        let mut samples = Vec::with_capacity(out_frames * channels);
        for frame in 0..out_frames {
            let position = frame as f64 * step;
            let index = (position.floor() as usize).min(in_frames.saturating_sub(1));
            let next = (index + 1).min(in_frames.saturating_sub(1));
            let frac = (position - index as f64).clamp(0.0, 1.0) as f32;
            for ch in 0..channels {
                let a = self.samples[index * channels + ch];
                let b = self.samples[next * channels + ch];
                samples.push(a + (b - a) * frac);
            }
        }

        PcmAudio {
            sample_rate: target_rate,
            channels: self.channels,
            samples,
        }
    }
}

/// Full-scale value of a signed sample `bits` wide.
fn full_scale(bits: u16) -> f64 {
    2f64.powi(i32::from(bits) - 1)
}

/// Decodes a WAV byte stream into normalised samples.
///
/// Supports integer PCM up to 32 bits and 32-bit IEEE float.
pub fn decode(bytes: &[u8]) -> Result<PcmAudio, WavError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = full_scale(bits);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (f64::from(v) / scale) as f32))
                .collect::<Result<Vec<_>, _>>()?
        }
        (format, bits_per_sample) => {
            return Err(WavError::UnsupportedEncoding {
                format,
                bits_per_sample,
            })
        }
    };

    Ok(PcmAudio {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

/// Encodes samples as integer PCM WAV at `bit_depth`.
///
/// Samples are scaled to the full range of the target width, so changing the
/// bit depth keeps the relative amplitude.
pub fn encode(audio: &PcmAudio, bit_depth: BitDepth) -> Result<Vec<u8>, WavError> {
    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: bit_depth.bits(),
        sample_format: SampleFormat::Int,
    };
    let scale = full_scale(bit_depth.bits());

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in &audio.samples {
            let value = (f64::from(sample.clamp(-1.0, 1.0)) * scale)
                .round()
                .clamp(-scale, scale - 1.0);
            writer.write_sample(value as i32)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(sample_rate: u32, frames: usize, channels: u16) -> PcmAudio {
        let mut samples = Vec::with_capacity(frames * usize::from(channels));
        for n in 0..frames {
            let theta = n as f32 / sample_rate as f32 * std::f32::consts::TAU * 440.0;
            for _ in 0..channels {
                samples.push(theta.sin() * 0.5);
            }
        }
        PcmAudio {
            sample_rate,
            channels,
            samples,
        }
    }

    #[test]
    fn test_encode_then_inspect() {
        let bytes = encode(&tone(8000, 800, 2), BitDepth::Sixteen).unwrap();
        let info = inspect(&bytes).unwrap();

        assert_eq!(info.spec.channels, 2);
        assert_eq!(info.spec.sample_rate, 8000);
        assert_eq!(info.spec.bits_per_sample, 16);
        assert_eq!(info.spec.sample_format, SampleFormat::Int);
        assert_eq!(info.bytes_per_sample(), 2);
        assert_eq!(info.frames, 800);
        assert_eq!(info.data_len, 800 * 2 * 2);
        assert!((info.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_sample_width_follows_bit_depth() {
        let audio = tone(8000, 100, 1);
        for (depth, width) in [
            (BitDepth::Eight, 1),
            (BitDepth::Sixteen, 2),
            (BitDepth::TwentyFour, 3),
            (BitDepth::ThirtyTwo, 4),
        ] {
            let info = inspect(&encode(&audio, depth).unwrap()).unwrap();
            assert_eq!(info.bytes_per_sample(), width, "depth {depth}");
            assert_eq!(info.data_len, 100 * width);
        }
    }

    #[test]
    fn test_bit_depth_scaling_preserves_amplitude() {
        let audio = PcmAudio {
            sample_rate: 8000,
            channels: 1,
            samples: vec![0.0, 0.5, -0.5, 0.999],
        };
        let depths = [
            BitDepth::Eight,
            BitDepth::Sixteen,
            BitDepth::TwentyFour,
            BitDepth::ThirtyTwo,
        ];
        for depth in depths {
            let decoded = decode(&encode(&audio, depth).unwrap()).unwrap();
            let tolerance = 1.0 / f32::from(1u16 << (depth.bits().min(15) - 1));
            for (a, b) in audio.samples.iter().zip(&decoded.samples) {
                assert!((a - b).abs() <= tolerance, "depth {depth}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_decode_float_wav() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for sample in [0.25f32, -0.75, 1.0] {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }

        let audio = decode(&cursor.into_inner()).unwrap();
        assert_eq!(audio.sample_rate, 22_050);
        assert_eq!(audio.samples, vec![0.25, -0.75, 1.0]);
    }

    #[test]
    fn test_resample_scales_frame_count() {
        let audio = tone(44_100, 44_100, 2);
        let down = audio.resample(8000);
        assert_eq!(down.sample_rate, 8000);
        assert_eq!(down.channels, 2);
        assert_eq!(down.frames(), 8000);
        assert!((down.duration_secs() - audio.duration_secs()).abs() < 1e-3);

        let up = tone(8000, 4000, 1).resample(16_000);
        assert_eq!(up.frames(), 8000);
    }

    #[test]
    fn test_resample_is_deterministic() {
        let audio = tone(22_050, 2205, 1);
        assert_eq!(audio.resample(11_025), audio.resample(11_025));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(inspect(b"not a wav file"), Err(WavError::NotRiff)));
        assert!(matches!(inspect(b""), Err(WavError::NotRiff)));
        assert!(matches!(decode(b"not a wav file"), Err(WavError::Hound(_))));
    }

    #[test]
    fn test_missing_data_chunk() {
        let mut bytes = encode(&tone(8000, 10, 1), BitDepth::Sixteen).unwrap();
        let chunk = locate_data(&bytes).unwrap();
        bytes.truncate(chunk.size_at - 4);
        assert!(matches!(inspect(&bytes), Err(WavError::MissingDataChunk)));
    }

    #[test]
    fn test_patch_streaming_placeholders() {
        let mut bytes = encode(&tone(8000, 50, 1), BitDepth::Sixteen).unwrap();
        let size_at = locate_data(&bytes).unwrap().size_at;
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[size_at..size_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let info = patch_sizes(&mut bytes).unwrap();
        assert_eq!(info.data_len, 100);
        assert_eq!(info.frames, 50);
        assert_eq!(read_u32(&bytes, 4) as usize, bytes.len() - 8);
        assert_eq!(read_u32(&bytes, size_at), 100);
    }

    #[test]
    fn test_patch_skips_chunks_before_data() {
        // 24-bit output uses WAVE_FORMAT_EXTENSIBLE; ffmpeg also puts a LIST
        // chunk in front of the samples.
        let encoded = encode(&tone(16_000, 4, 1), BitDepth::TwentyFour).unwrap();
        let size_at = locate_data(&encoded).unwrap().size_at;
        let (head, tail) = encoded.split_at(size_at - 4);

        let mut bytes = head.to_vec();
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"INFO");
        bytes.extend_from_slice(tail);
        bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
        let data_size_at = size_at + 12;
        bytes[data_size_at..data_size_at + 4].copy_from_slice(&0u32.to_le_bytes());

        let info = patch_sizes(&mut bytes).unwrap();
        assert_eq!(info.spec.sample_rate, 16_000);
        assert_eq!(info.spec.bits_per_sample, 24);
        assert_eq!(info.data_len, 12);
        assert_eq!(info.frames, 4);
    }
}

//! Testing utilities and a mock transcoder.
//!
//! The mock lets the engine be exercised end to end without ffmpeg on the
//! host; the fixtures write small WAV inputs to a scratch directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use lofizer_core::testing::{write_test_tone, MockTranscoder};
//!
//! let dir = tempfile::TempDir::new()?;
//! let input = write_test_tone(dir.path(), "tone.wav", 44_100, 1.0)?;
//!
//! let engine = BatchConversionEngine::new(EngineConfig::default(), MockTranscoder::new());
//! ```

mod mock_transcoder;

pub use fixtures::{tone, write_corrupt_file, write_test_tone};
pub use mock_transcoder::{MockTranscoder, RecordedTranscode};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io;
    use std::path::{Path, PathBuf};

    use crate::params::BitDepth;
    use crate::transcoder::wav::{self, PcmAudio};

    /// Frequency of the generated test tone in Hz.
    pub const TONE_HZ: f64 = 440.0;

    /// A mono 440 Hz sine at half amplitude.
    pub fn tone(sample_rate: u32, secs: f64) -> PcmAudio {
        let frames = (f64::from(sample_rate) * secs).round() as usize;
        let samples = (0..frames)
            .map(|i| {
                let t = i as f64 / f64::from(sample_rate);
                (0.5 * (2.0 * std::f64::consts::PI * TONE_HZ * t).sin()) as f32
            })
            .collect();

        PcmAudio {
            sample_rate,
            channels: 1,
            samples,
        }
    }

    /// Write a 16-bit WAV test tone to `dir/name`.
    pub fn write_test_tone(
        dir: &Path,
        name: &str,
        sample_rate: u32,
        secs: f64,
    ) -> io::Result<PathBuf> {
        let path = dir.join(name);
        let bytes =
            wav::encode(&tone(sample_rate, secs), BitDepth::Sixteen).map_err(io::Error::other)?;
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Write a file that no decoder accepts to `dir/name`.
    pub fn write_corrupt_file(dir: &Path, name: &str) -> io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, b"this is not audio data")?;
        Ok(path)
    }
}

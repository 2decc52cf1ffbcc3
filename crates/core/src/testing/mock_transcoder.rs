//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::params::{ConversionParameters, TargetEncoding};
use crate::transcoder::{
    check_mp3, wav, EncodedAudio, MediaInfo, TranscodeError, Transcoder,
};

type ErrorFactory = Box<dyn Fn() -> TranscodeError + Send + Sync>;

/// A recorded transcode call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTranscode {
    /// The input that was submitted.
    pub input: PathBuf,
    /// The parameters it was submitted with.
    pub params: ConversionParameters,
    /// Whether the transcode succeeded.
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Understands WAV input only, which is enough to exercise the engine
/// without ffmpeg:
/// - WAV targets are really resampled and re-encoded
/// - MP3 targets yield an ID3-prefixed payload sized from duration and bitrate
/// - anything that is not a WAV fails as a decode error
///
/// Failures can be injected per path or for the next call, and the peak
/// number of concurrent calls is tracked.
///
/// # Example
///
/// ```rust,ignore
/// use lofizer_core::testing::MockTranscoder;
///
/// let transcoder = MockTranscoder::new();
/// transcoder.fail_path("/in/b.wav", || TranscodeError::Timeout { timeout_secs: 1 }).await;
/// transcoder.set_delay(Duration::from_millis(20)).await;
///
/// let engine = BatchConversionEngine::new(EngineConfig::default(), transcoder.clone());
/// let report = engine.run(request).await;
///
/// assert_eq!(transcoder.transcode_count().await, 2);
/// ```
#[derive(Clone)]
pub struct MockTranscoder {
    /// Recorded transcode calls.
    transcodes: Arc<RwLock<Vec<RecordedTranscode>>>,
    /// Errors to return for specific inputs, on every call.
    path_failures: Arc<RwLock<HashMap<PathBuf, ErrorFactory>>>,
    /// If set, the next transcode will fail with this error.
    next_error: Arc<RwLock<Option<TranscodeError>>>,
    /// Simulated work per call in milliseconds.
    delay_ms: Arc<RwLock<u64>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockTranscoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTranscoder")
            .field("active", &self.active.load(Ordering::Relaxed))
            .field("peak", &self.peak.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder with no delay and no failures.
    pub fn new() -> Self {
        Self {
            transcodes: Arc::new(RwLock::new(Vec::new())),
            path_failures: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay_ms: Arc::new(RwLock::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded transcode calls, in call order.
    pub async fn recorded_transcodes(&self) -> Vec<RecordedTranscode> {
        self.transcodes.read().await.clone()
    }

    /// Get the number of transcode calls made.
    pub async fn transcode_count(&self) -> usize {
        self.transcodes.read().await.len()
    }

    /// Make every transcode of `path` fail with the error `make` builds.
    pub async fn fail_path(
        &self,
        path: impl AsRef<Path>,
        make: impl Fn() -> TranscodeError + Send + Sync + 'static,
    ) {
        self.path_failures
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), Box::new(make));
    }

    /// Configure the next transcode to fail with the given error.
    pub async fn set_next_error(&self, error: TranscodeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated duration of every transcode.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Highest number of transcodes that were in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn injected_error(&self, input: &Path) -> Option<TranscodeError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Some(err);
        }
        self.path_failures.read().await.get(input).map(|make| make())
    }

    async fn load(&self, input: &Path) -> Result<wav::PcmAudio, TranscodeError> {
        let bytes = match tokio::fs::read(input).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscodeError::InputNotFound {
                    path: input.to_path_buf(),
                });
            }
            Err(e) => return Err(TranscodeError::Io(e)),
        };
        wav::decode(&bytes).map_err(|e| TranscodeError::decode_failed(input, e.to_string()))
    }

    async fn encode(
        &self,
        input: &Path,
        params: &ConversionParameters,
    ) -> Result<EncodedAudio, TranscodeError> {
        if let Some(err) = self.injected_error(input).await {
            return Err(err);
        }

        let delay_ms = *self.delay_ms.read().await;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let audio = self.load(input).await?.resample(params.sample_rate_hz());

        let data = match params.encoding() {
            TargetEncoding::Wav { bit_depth } => wav::encode(&audio, bit_depth)
                .map_err(|e| TranscodeError::encode_failed(e.to_string(), None))?,
            TargetEncoding::Mp3 { bitrate } => {
                check_mp3(params.sample_rate_hz(), bitrate)?;
                let payload = (audio.duration_secs() * f64::from(bitrate.kbps()) * 125.0) as usize;
                let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
                data.resize(data.len() + payload, 0);
                data
            }
        };

        Ok(EncodedAudio {
            data,
            format: params.target_format(),
            sample_rate_hz: params.sample_rate_hz(),
        })
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscodeError> {
        let audio = self.load(path).await?;
        let size_bytes = tokio::fs::metadata(path).await?.len();

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs: audio.duration_secs(),
            format: "wav".to_string(),
            audio_codec: Some("pcm".to_string()),
            audio_bitrate_kbps: None,
            audio_sample_rate: Some(audio.sample_rate),
            audio_channels: Some(audio.channels.min(u16::from(u8::MAX)) as u8),
        })
    }

    async fn transcode(
        &self,
        input: &Path,
        params: &ConversionParameters,
    ) -> Result<EncodedAudio, TranscodeError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = self.encode(input, params).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.transcodes.write().await.push(RecordedTranscode {
            input: input.to_path_buf(),
            params: *params,
            success: result.is_ok(),
        });

        result
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BitDepth, Bitrate};
    use crate::testing::{write_corrupt_file, write_test_tone};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_wav_target_is_resampled() {
        let temp = TempDir::new().unwrap();
        let input = write_test_tone(temp.path(), "tone.wav", 16_000, 0.5).unwrap();
        let transcoder = MockTranscoder::new();
        let params = ConversionParameters::wav(8000, BitDepth::Sixteen).unwrap();

        let encoded = transcoder.transcode(&input, &params).await.unwrap();
        let info = wav::inspect(&encoded.data).unwrap();

        assert_eq!(info.spec.sample_rate, 8000);
        assert_eq!(info.spec.bits_per_sample, 16);
        assert_eq!(info.frames, 4000);
        assert_eq!(transcoder.transcode_count().await, 1);
        assert!(transcoder.recorded_transcodes().await[0].success);
    }

    #[tokio::test]
    async fn test_mp3_target_checks_tables() {
        let temp = TempDir::new().unwrap();
        let input = write_test_tone(temp.path(), "tone.wav", 16_000, 1.0).unwrap();
        let transcoder = MockTranscoder::new();

        let params = ConversionParameters::mp3(8000, Bitrate::from_kbps(32).unwrap()).unwrap();
        let encoded = transcoder.transcode(&input, &params).await.unwrap();
        assert!(encoded.data.starts_with(b"ID3"));
        assert!(encoded.len() >= 4000);

        let params = ConversionParameters::mp3(7000, Bitrate::from_kbps(32).unwrap()).unwrap();
        let err = transcoder.transcode(&input, &params).await.unwrap_err();
        assert!(matches!(err, TranscodeError::UnsupportedEncoding { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_and_missing_inputs() {
        let temp = TempDir::new().unwrap();
        let corrupt = write_corrupt_file(temp.path(), "bad.wav").unwrap();
        let transcoder = MockTranscoder::new();
        let params = ConversionParameters::wav(8000, BitDepth::Eight).unwrap();

        assert!(matches!(
            transcoder.transcode(&corrupt, &params).await,
            Err(TranscodeError::DecodeFailed { .. })
        ));
        assert!(matches!(
            transcoder.transcode(&temp.path().join("gone.wav"), &params).await,
            Err(TranscodeError::InputNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_injected_errors() {
        let temp = TempDir::new().unwrap();
        let input = write_test_tone(temp.path(), "tone.wav", 8000, 0.1).unwrap();
        let transcoder = MockTranscoder::new();
        let params = ConversionParameters::wav(8000, BitDepth::Sixteen).unwrap();

        transcoder
            .set_next_error(TranscodeError::invalid_output("truncated"))
            .await;
        assert!(transcoder.transcode(&input, &params).await.is_err());
        assert!(transcoder.transcode(&input, &params).await.is_ok());

        transcoder
            .fail_path(&input, || TranscodeError::Timeout { timeout_secs: 3 })
            .await;
        assert!(transcoder.transcode(&input, &params).await.is_err());
        assert!(transcoder.transcode(&input, &params).await.is_err());
        assert_eq!(transcoder.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_media_info_from_wav() {
        let temp = TempDir::new().unwrap();
        let input = write_test_tone(temp.path(), "tone.wav", 22_050, 0.2).unwrap();
        let info = MockTranscoder::new().probe(&input).await.unwrap();
        assert_eq!(info.audio_sample_rate, Some(22_050));
        assert_eq!(info.audio_channels, Some(1));
        assert!(info.has_audio());
    }
}

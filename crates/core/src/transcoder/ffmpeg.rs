//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use hound::SampleFormat;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::capabilities::{check_encoding, encoder_name, EncoderCapabilities};
use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::traits::Transcoder;
use super::types::{EncodedAudio, MediaInfo};
use super::wav::{self, WavInfo};
use crate::params::{ConversionParameters, TargetEncoding};

/// Lines of ffmpeg stderr kept in an [`TranscodeError::EncodeFailed`].
const STDERR_TAIL_LINES: usize = 20;

/// Lowercased stderr fragments ffmpeg prints when it cannot read its input.
const DECODE_FAILURE_MARKERS: [&str; 6] = [
    "invalid data found when processing input",
    "error while decoding",
    "decoder not found",
    "decoder (codec",
    "could not find codec parameters",
    "error opening input",
];

/// FFmpeg-based transcoder implementation.
///
/// Input is probed with ffprobe first so that unreadable files are reported
/// as decode failures. ffmpeg then writes the encoded stream to `pipe:1`.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
    /// Encoder listing, read once. `None` when ffmpeg could not be run.
    encoders: OnceCell<Option<EncoderCapabilities>>,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self {
            config,
            encoders: OnceCell::new(),
        }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    async fn detected_encoders(&self) -> Option<&EncoderCapabilities> {
        self.encoders
            .get_or_init(|| EncoderCapabilities::detect(&self.config.ffmpeg_path))
            .await
            .as_ref()
    }

    /// Detects which of the needed encoders the configured ffmpeg provides.
    pub async fn capabilities(&self) -> EncoderCapabilities {
        self.detected_encoders().await.cloned().unwrap_or_default()
    }

    /// Fails before spawning ffmpeg when it lacks the encoder for `params`.
    ///
    /// An ffmpeg that cannot be run is let through so that the spawn reports
    /// it as missing.
    async fn ensure_encoder(&self, params: &ConversionParameters) -> Result<(), TranscodeError> {
        match self.detected_encoders().await {
            Some(caps) if !caps.supports(params) => {
                Err(TranscodeError::unsupported_encoding(format!(
                    "{} has no {} encoder",
                    self.config.ffmpeg_path.display(),
                    encoder_name(params)
                )))
            }
            _ => Ok(()),
        }
    }

    /// Builds ffmpeg arguments that encode `input` to stdout.
    fn build_args(&self, input: &Path, params: &ConversionParameters) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-nostdin".into(),
            "-i".into(),
            input.into(),
            "-vn".into(),
            "-map_metadata".into(),
            "-1".into(),
            "-ar".into(),
            params.sample_rate_hz().to_string().into(),
            "-c:a".into(),
            encoder_name(params).into(),
        ];

        if let TargetEncoding::Mp3 { bitrate } = params.encoding() {
            args.push("-b:a".into());
            args.push(bitrate.to_string().into());
        }

        args.push("-loglevel".into());
        args.push(self.config.ffmpeg_log_level.clone().into());

        args.extend(self.config.extra_ffmpeg_args.iter().map(OsString::from));

        args.extend(
            ["-f", params.target_format().ffmpeg_muxer(), "pipe:1"].map(OsString::from),
        );

        args
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_ffprobe_json(path: &Path, output: &str) -> Result<MediaInfo, TranscodeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: Option<ProbeFormat>,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            bit_rate: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| TranscodeError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let format = probe
            .format
            .ok_or_else(|| TranscodeError::decode_failed(path, "no container detected"))?;

        let duration_secs = format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        let format_name = format.format_name.split(',').next().unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            audio_bitrate_kbps: audio_stream
                .and_then(|s| s.bit_rate.as_ref())
                .and_then(|b| b.parse::<u32>().ok())
                .map(|b| b / 1000),
            audio_sample_rate: audio_stream
                .and_then(|s| s.sample_rate.as_ref())
                .and_then(|r| r.parse::<u32>().ok()),
            audio_channels: audio_stream.and_then(|s| s.channels),
        })
    }

    /// Checks the encoded stream against the request, patching WAV sizes.
    fn finish_output(
        data: &mut [u8],
        params: &ConversionParameters,
    ) -> Result<(), TranscodeError> {
        if data.is_empty() {
            return Err(TranscodeError::invalid_output("encoder produced no data"));
        }

        match params.encoding() {
            TargetEncoding::Wav { bit_depth } => {
                let info = wav::patch_sizes(data)
                    .map_err(|e| TranscodeError::invalid_output(e.to_string()))?;
                verify_wav_header(&info, params.sample_rate_hz(), bit_depth.bits())
            }
            TargetEncoding::Mp3 { .. } => {
                let id3 = data.starts_with(b"ID3");
                let frame_sync = data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0;
                if id3 || frame_sync {
                    Ok(())
                } else {
                    Err(TranscodeError::invalid_output("output is not an MP3 stream"))
                }
            }
        }
    }

    async fn run_ffprobe(&self, path: &Path) -> Result<std::process::Output, TranscodeError> {
        let probe = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match timeout(Duration::from_secs(self.config.timeout_secs), probe).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TranscodeError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                })
            }
            Ok(Err(e)) => Err(TranscodeError::Io(e)),
            // ffprobe only reads the input, so a stall means the input is unreadable.
            Err(_) => Err(TranscodeError::decode_failed(
                path,
                format!(
                    "ffprobe did not finish within {} seconds",
                    self.config.timeout_secs
                ),
            )),
        }
    }
}

fn verify_wav_header(info: &WavInfo, rate: u32, bits: u16) -> Result<(), TranscodeError> {
    if info.spec.sample_format != SampleFormat::Int {
        return Err(TranscodeError::invalid_output(
            "expected integer PCM samples, got IEEE float",
        ));
    }
    if info.spec.sample_rate != rate {
        return Err(TranscodeError::invalid_output(format!(
            "expected {} Hz, got {} Hz",
            rate, info.spec.sample_rate
        )));
    }
    if info.spec.bits_per_sample != bits {
        return Err(TranscodeError::invalid_output(format!(
            "expected {}-bit samples, got {}-bit",
            bits, info.spec.bits_per_sample
        )));
    }
    Ok(())
}

/// Classifies a failed ffmpeg run by what it printed.
///
/// ffprobe accepts some inputs ffmpeg then fails to decode; those are input
/// problems, not encoder problems.
fn exit_error(input: &Path, code: Option<i32>, stderr: &[u8]) -> TranscodeError {
    match stderr_tail(stderr) {
        Some(tail) if is_decode_failure(&tail) => TranscodeError::decode_failed(input, tail),
        tail => TranscodeError::encode_failed(format!("FFmpeg exited with code: {:?}", code), tail),
    }
}

fn is_decode_failure(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    DECODE_FAILURE_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}

fn stderr_tail(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    Some(lines[start..].join("\n"))
}

async fn check_binary(
    path: &Path,
    not_found: impl FnOnce() -> TranscodeError,
) -> Result<(), TranscodeError> {
    match Command::new(path)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(TranscodeError::encode_failed(
            format!("{} -version exited with code: {:?}", path.display(), output.status.code()),
            stderr_tail(&output.stderr),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
        Err(e) => Err(TranscodeError::Io(e)),
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscodeError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(TranscodeError::decode_failed(path, "not a regular file"));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscodeError::InputNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(TranscodeError::Io(e)),
        }

        let output = self.run_ffprobe(path).await?;

        if !output.status.success() {
            let reason = stderr_tail(&output.stderr)
                .unwrap_or_else(|| format!("ffprobe exited with code: {:?}", output.status.code()));
            return Err(TranscodeError::decode_failed(path, reason));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_ffprobe_json(path, &stdout)
    }

    async fn transcode(
        &self,
        input: &Path,
        params: &ConversionParameters,
    ) -> Result<EncodedAudio, TranscodeError> {
        let start = Instant::now();

        let info = self.probe(input).await?;
        if !info.has_audio() {
            return Err(TranscodeError::decode_failed(input, "no audio stream"));
        }

        check_encoding(params)?;
        self.ensure_encoder(params).await?;

        let args = self.build_args(input, params);
        debug!(
            ffmpeg = %self.config.ffmpeg_path.display(),
            args = ?args,
            "Running ffmpeg"
        );

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let output = match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TranscodeError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        };

        if !output.status.success() {
            return Err(exit_error(input, output.status.code(), &output.stderr));
        }

        let mut data = output.stdout;
        Self::finish_output(&mut data, params)?;

        debug!(
            input = %input.display(),
            bytes = data.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Encoded {}",
            params
        );

        Ok(EncodedAudio {
            data,
            format: params.target_format(),
            sample_rate_hz: params.sample_rate_hz(),
        })
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        check_binary(&self.config.ffmpeg_path, || TranscodeError::FfmpegNotFound {
            path: self.config.ffmpeg_path.clone(),
        })
        .await?;

        check_binary(&self.config.ffprobe_path, || TranscodeError::FfprobeNotFound {
            path: self.config.ffprobe_path.clone(),
        })
        .await?;

        Ok(())
    }
}

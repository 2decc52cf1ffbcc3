//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TranscodeError;
use super::types::{EncodedAudio, MediaInfo};
use crate::params::{AudioFormat, ConversionParameters};

/// Something that can turn one audio file into another representation.
///
/// Implementations return the encoded bytes and never write the output file
/// themselves; placing the result is the engine's job.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Probes an audio file to get its information.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscodeError>;

    /// Decodes `input`, resamples it and encodes it to `params`.
    async fn transcode(
        &self,
        input: &Path,
        params: &ConversionParameters,
    ) -> Result<EncodedAudio, TranscodeError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscodeError>;

    /// Returns the supported output formats.
    fn supported_output_formats(&self) -> &[AudioFormat] {
        &AudioFormat::ALL
    }
}

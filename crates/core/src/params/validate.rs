use super::error::ValidationError;
use super::types::{
    AudioFormat, BitDepth, Bitrate, ConversionParameters, RawParameters, TargetEncoding,
};

/// Validate raw parameters into [`ConversionParameters`].
///
/// Checks, in order:
/// - `target_format` is present and names a supported format
/// - `sample_rate_hz` is present and positive
/// - the format's active field (`bit_depth` for WAV, `bitrate` for MP3) is
///   present and supported
///
/// The inactive field is never read. Blank strings count as absent.
pub fn validate(raw: &RawParameters) -> Result<ConversionParameters, ValidationError> {
    let format_token = non_blank(raw.target_format.as_deref())
        .ok_or_else(|| ValidationError::missing("target_format"))?;
    let format = AudioFormat::from_token(format_token)
        .ok_or_else(|| ValidationError::unsupported("target_format", format_token))?;

    let sample_rate_hz = raw
        .sample_rate_hz
        .ok_or_else(|| ValidationError::missing("sample_rate_hz"))?;

    let encoding = match format {
        AudioFormat::Wav => {
            let bits = raw
                .bit_depth
                .ok_or_else(|| ValidationError::missing("bit_depth"))?;
            let bit_depth = BitDepth::from_bits(bits)
                .ok_or_else(|| ValidationError::unsupported("bit_depth", bits))?;
            TargetEncoding::Wav { bit_depth }
        }
        AudioFormat::Mp3 => {
            let token = non_blank(raw.bitrate.as_deref())
                .ok_or_else(|| ValidationError::missing("bitrate"))?;
            let bitrate = Bitrate::parse(token)
                .ok_or_else(|| ValidationError::unsupported("bitrate", token))?;
            TargetEncoding::Mp3 { bitrate }
        }
    };

    ConversionParameters::new(sample_rate_hz, encoding)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_raw() -> RawParameters {
        RawParameters::default()
            .with_format("wav")
            .with_sample_rate(8000)
            .with_bit_depth(16)
    }

    #[test]
    fn test_validate_wav() {
        let params = validate(&wav_raw()).unwrap();
        assert_eq!(params.target_format(), AudioFormat::Wav);
        assert_eq!(params.sample_rate_hz(), 8000);
        assert_eq!(params.bit_depth(), Some(BitDepth::Sixteen));
    }

    #[test]
    fn test_validate_mp3() {
        let raw = RawParameters::default()
            .with_format("mp3")
            .with_sample_rate(22050)
            .with_bitrate("32k");
        let params = validate(&raw).unwrap();
        assert_eq!(params.target_format(), AudioFormat::Mp3);
        assert_eq!(params.bitrate().map(|b| b.kbps()), Some(32));
    }

    #[test]
    fn test_validate_is_deterministic() {
        let raw = wav_raw();
        assert_eq!(validate(&raw), validate(&raw));
    }

    #[test]
    fn test_missing_format() {
        let mut raw = wav_raw();
        raw.target_format = None;
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::missing("target_format")
        );

        raw.target_format = Some("   ".to_string());
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::missing("target_format")
        );
    }

    #[test]
    fn test_unsupported_format() {
        let raw = wav_raw().with_format("flac");
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::unsupported("target_format", "flac")
        );
    }

    #[test]
    fn test_missing_sample_rate() {
        let mut raw = wav_raw();
        raw.sample_rate_hz = None;
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::missing("sample_rate_hz")
        );
    }

    #[test]
    fn test_zero_sample_rate() {
        let raw = wav_raw().with_sample_rate(0);
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::unsupported("sample_rate_hz", 0)
        );
    }

    #[test]
    fn test_any_positive_rate_is_accepted() {
        let raw = wav_raw().with_sample_rate(12345);
        assert_eq!(validate(&raw).unwrap().sample_rate_hz(), 12345);
    }

    #[test]
    fn test_mp3_requires_bitrate() {
        let raw = RawParameters::default()
            .with_format("mp3")
            .with_sample_rate(8000)
            .with_bit_depth(16);
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::missing("bitrate")
        );
    }

    #[test]
    fn test_wav_requires_bit_depth() {
        let raw = RawParameters::default()
            .with_format("wav")
            .with_sample_rate(8000)
            .with_bitrate("32k");
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::missing("bit_depth")
        );
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let raw = wav_raw().with_bit_depth(12);
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::unsupported("bit_depth", 12)
        );
    }

    #[test]
    fn test_malformed_bitrate() {
        let raw = RawParameters::default()
            .with_format("mp3")
            .with_sample_rate(8000)
            .with_bitrate("fast");
        assert_eq!(
            validate(&raw).unwrap_err(),
            ValidationError::unsupported("bitrate", "fast")
        );
    }

    #[test]
    fn test_inactive_field_is_ignored() {
        // A stale bitrate from an earlier MP3 selection has no effect on WAV.
        let params = validate(&wav_raw().with_bitrate("not-a-bitrate")).unwrap();
        assert_eq!(params.bitrate(), None);

        let mp3 = RawParameters::default()
            .with_format("mp3")
            .with_sample_rate(8000)
            .with_bitrate("32k")
            .with_bit_depth(99);
        assert_eq!(validate(&mp3).unwrap().bit_depth(), None);
    }
}

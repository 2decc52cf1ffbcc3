use super::{types::Config, ConfigError};
use crate::params::{AudioFormat, BitDepth, Bitrate};

const FFMPEG_LOG_LEVELS: [&str; 9] = [
    "quiet", "panic", "fatal", "error", "warning", "info", "verbose", "debug", "trace",
];

/// Validate configuration
/// Currently validates:
/// - transcoder timeout and ffmpeg log level
/// - engine parallelism and temp file suffix
/// - every default that is set has a supported value (blank strings count
///   as unset)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Transcoder validation
    if config.transcoder.timeout_secs == 0 {
        return Err(invalid("transcoder.timeout_secs cannot be 0"));
    }
    if !FFMPEG_LOG_LEVELS.contains(&config.transcoder.ffmpeg_log_level.as_str()) {
        return Err(invalid(format!(
            "transcoder.ffmpeg_log_level must be one of {:?}, got {:?}",
            FFMPEG_LOG_LEVELS, config.transcoder.ffmpeg_log_level
        )));
    }

    // Engine validation
    if config.engine.max_parallel_jobs == 0 {
        return Err(invalid("engine.max_parallel_jobs cannot be 0"));
    }
    if config.engine.event_buffer == 0 {
        return Err(invalid("engine.event_buffer cannot be 0"));
    }
    let suffix = &config.engine.temp_suffix;
    if suffix.is_empty() || suffix.contains(['/', '\\']) {
        return Err(invalid(
            "engine.temp_suffix must be non-empty and contain no path separators",
        ));
    }

    // Defaults validation
    let defaults = &config.defaults;
    if let Some(format) = non_blank(defaults.format.as_deref()) {
        if AudioFormat::from_token(format).is_none() {
            return Err(invalid(format!("defaults.format {:?} is not supported", format)));
        }
    }
    if defaults.sample_rate_hz == Some(0) {
        return Err(invalid("defaults.sample_rate_hz cannot be 0"));
    }
    if let Some(bitrate) = non_blank(defaults.bitrate.as_deref()) {
        if Bitrate::parse(bitrate).is_none() {
            return Err(invalid(format!("defaults.bitrate {:?} is not a valid bitrate", bitrate)));
        }
    }
    if let Some(bits) = defaults.bit_depth {
        if BitDepth::from_bits(bits).is_none() {
            return Err(invalid(format!("defaults.bit_depth {} is not supported", bits)));
        }
    }
    if defaults.output_dir.as_os_str().is_empty() {
        return Err(invalid("defaults.output_dir cannot be empty"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

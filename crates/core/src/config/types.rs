use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::params::RawParameters;
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Values used when a request leaves a parameter unset
///
/// A key missing from the file keeps its reference value, so a loaded config
/// always has every field set. TOML has no null: a blank `format` or
/// `bitrate` string is the way to leave one for the request to supply, and
/// validation treats it as absent. `None` only appears in configs built in
/// code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_format")]
    pub format: Option<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: Option<u32>,
    #[serde(default = "default_bitrate")]
    pub bitrate: Option<String>,
    #[serde(default = "default_bit_depth")]
    pub bit_depth: Option<u16>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            sample_rate_hz: default_sample_rate(),
            bitrate: default_bitrate(),
            bit_depth: default_bit_depth(),
            output_dir: default_output_dir(),
        }
    }
}

impl DefaultsConfig {
    /// The defaults as raw parameters, ready to back-fill a request.
    pub fn raw_parameters(&self) -> RawParameters {
        RawParameters {
            target_format: self.format.clone(),
            sample_rate_hz: self.sample_rate_hz,
            bitrate: self.bitrate.clone(),
            bit_depth: self.bit_depth,
        }
    }
}

fn default_format() -> Option<String> {
    RawParameters::reference_defaults().target_format
}

fn default_sample_rate() -> Option<u32> {
    RawParameters::reference_defaults().sample_rate_hz
}

fn default_bitrate() -> Option<String> {
    RawParameters::reference_defaults().bitrate
}

fn default_bit_depth() -> Option<u16> {
    RawParameters::reference_defaults().bit_depth
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("~/Documents/lofizer")
}

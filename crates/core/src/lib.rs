pub mod config;
pub mod engine;
pub mod metrics;
pub mod output;
pub mod params;
pub mod testing;
pub mod transcoder;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, DefaultsConfig,
};
pub use engine::{
    BatchConversionEngine, BatchError, BatchEvent, BatchPlan, BatchReport, BatchRequest,
    ConversionOutcome, EngineConfig, EngineState, EngineStatus, ErrorKind,
};
pub use output::{AtomicWriter, DirectoryProvisioner};
pub use params::{
    validate, AudioFormat, BitDepth, Bitrate, ConversionParameters, RawParameters,
    ValidationError,
};
pub use transcoder::{
    EncoderCapabilities, FfmpegTranscoder, MediaInfo, TranscodeError, Transcoder,
    TranscoderConfig,
};

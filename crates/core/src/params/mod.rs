//! Conversion parameters and their validation.
//!
//! Shells hand over loosely typed [`RawParameters`] (the values of their
//! dropdowns and text fields). [`validate`] turns them into an immutable
//! [`ConversionParameters`] exactly once; everything downstream works with the
//! typed value and never parses strings again.
//!
//! # Example
//!
//! ```ignore
//! use lofizer_core::params::{validate, RawParameters};
//!
//! let raw = RawParameters::default()
//!     .with_format("mp3")
//!     .with_sample_rate(22050)
//!     .with_bitrate("64k");
//!
//! let params = validate(&raw)?;
//! assert_eq!(params.suffix(), "22050-64k");
//! ```

mod error;
mod types;
mod validate;

pub use error::ValidationError;
pub use types::{
    AudioFormat, BitDepth, Bitrate, ConversionParameters, RawParameters, TargetEncoding,
    COMMON_BITRATES, COMMON_SAMPLE_RATES,
};
pub use validate::validate;

//! Engine module: runs a batch of conversions end to end.
//!
//! A shell builds a [`BatchRequest`] and hands it to
//! [`BatchConversionEngine`]. The engine walks
//! `Idle → Validating → Provisioning → Processing → Done`, and returns a
//! [`BatchReport`] with one outcome per input. Shells that want per-file
//! progress pass an mpsc sender and receive [`BatchEvent`]s.
//!
//! # Example
//!
//! ```ignore
//! use lofizer_core::engine::{BatchConversionEngine, BatchRequest, EngineConfig};
//! use lofizer_core::params::RawParameters;
//! use lofizer_core::transcoder::FfmpegTranscoder;
//!
//! let engine = BatchConversionEngine::new(
//!     EngineConfig::default(),
//!     FfmpegTranscoder::with_defaults(),
//! );
//!
//! let request = BatchRequest::new(
//!     ["song.mp3", "voice.wav"],
//!     RawParameters::reference_defaults(),
//!     "~/Documents/lofizer",
//! );
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         println!("{:?}", event);
//!     }
//! });
//!
//! let report = engine.run_with_events(request, tx).await;
//! println!("{} converted, {} failed", report.succeeded(), report.failed());
//! ```

mod config;
mod runner;
mod types;

pub use config::EngineConfig;
pub use runner::BatchConversionEngine;
pub use types::{
    BatchError, BatchEvent, BatchPlan, BatchReport, BatchRequest, ConversionOutcome, EngineState,
    EngineStatus, ErrorKind, PlannedOutput,
};

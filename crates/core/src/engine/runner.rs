//! Batch conversion engine implementation.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::EngineConfig;
use super::types::{
    BatchError, BatchEvent, BatchPlan, BatchReport, BatchRequest, ConversionOutcome, EngineState,
    EngineStatus, ErrorKind, PlannedOutput,
};
use crate::metrics::{
    ACTIVE_JOBS, BATCHES, BYTES_WRITTEN, COLLISIONS, CONVERSION_DURATION, FILES_CONVERTED,
};
use crate::output::{
    find_collisions, resolve_output_path, AtomicWriter, DirectoryProvisioner, ResolveError,
};
use crate::params::{validate, ConversionParameters};
use crate::transcoder::Transcoder;

/// Lifetime counters.
#[derive(Default)]
struct EngineStats {
    active: AtomicU64,
    total_batches: AtomicU64,
    total_converted: AtomicU64,
    total_failed: AtomicU64,
}

/// Runs batches: validate, provision, then convert every input.
///
/// Every input yields exactly one [`ConversionOutcome`], reported in input
/// order. Per-file failures never stop the batch; only invalid parameters or
/// an unusable output directory abort it, and then nothing is processed.
pub struct BatchConversionEngine<T: Transcoder> {
    config: EngineConfig,
    transcoder: Arc<T>,
    provisioner: DirectoryProvisioner,
    writer: AtomicWriter,
    state: Arc<RwLock<EngineState>>,
    stats: Arc<EngineStats>,
}

impl<T: Transcoder> BatchConversionEngine<T> {
    /// Creates a new engine.
    pub fn new(config: EngineConfig, transcoder: T) -> Self {
        Self::with_shared(config, Arc::new(transcoder))
    }

    /// Creates an engine around a transcoder that is shared with the caller.
    pub fn with_shared(config: EngineConfig, transcoder: Arc<T>) -> Self {
        let writer = AtomicWriter::new(config.temp_suffix.clone());
        Self {
            config,
            transcoder,
            provisioner: DirectoryProvisioner::new(),
            writer,
            state: Arc::new(RwLock::new(EngineState::Idle)),
            stats: Arc::new(EngineStats::default()),
        }
    }

    /// Replaces the directory provisioner (e.g. to pin `~` in tests).
    pub fn with_provisioner(mut self, provisioner: DirectoryProvisioner) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Returns the current engine status.
    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            state: *self.state.read().await,
            active_jobs: self.stats.active.load(Ordering::Relaxed) as usize,
            max_parallel_jobs: self.config.max_parallel_jobs.max(1),
            total_batches: self.stats.total_batches.load(Ordering::Relaxed),
            total_converted: self.stats.total_converted.load(Ordering::Relaxed),
            total_failed: self.stats.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Runs a batch to completion.
    pub async fn run(&self, request: BatchRequest) -> BatchReport {
        self.execute(request, None, CancellationToken::new()).await
    }

    /// Runs a batch, streaming a [`BatchEvent`] as each input completes.
    ///
    /// A dropped receiver does not stop the batch.
    pub async fn run_with_events(
        &self,
        request: BatchRequest,
        events: mpsc::Sender<BatchEvent>,
    ) -> BatchReport {
        self.execute(request, Some(events), CancellationToken::new())
            .await
    }

    /// Runs a batch that stops launching new files once `cancel` fires.
    ///
    /// Files already being converted finish; the rest are reported as
    /// cancelled.
    pub async fn run_cancellable(
        &self,
        request: BatchRequest,
        events: Option<mpsc::Sender<BatchEvent>>,
        cancel: CancellationToken,
    ) -> BatchReport {
        self.execute(request, events, cancel).await
    }

    /// Validates the request and derives every output path without any I/O.
    pub fn plan(&self, request: &BatchRequest) -> Result<BatchPlan, BatchError> {
        let parameters = validate(&request.params)?;
        let output_dir = self
            .provisioner
            .expand(&request.output_dir)
            .map_err(|e| BatchError::Io {
                path: request.output_dir.clone(),
                message: e.to_string(),
            })?;

        let outputs: Vec<PlannedOutput> = request
            .inputs
            .iter()
            .map(
                |input| match resolve_output_path(input, &parameters, &output_dir) {
                    Ok(path) => PlannedOutput {
                        input_path: input.clone(),
                        output_path: Some(path),
                        error: None,
                    },
                    Err(e) => PlannedOutput {
                        input_path: input.clone(),
                        output_path: None,
                        error: Some(e.to_string()),
                    },
                },
            )
            .collect();

        let collisions = find_collisions(outputs.iter().filter_map(|o| o.output_path.as_deref()));

        Ok(BatchPlan {
            output_dir,
            parameters,
            outputs,
            collisions,
        })
    }

    async fn set_state(&self, state: EngineState) {
        *self.state.write().await = state;
    }

    async fn execute(
        &self,
        request: BatchRequest,
        events: Option<mpsc::Sender<BatchEvent>>,
        cancel: CancellationToken,
    ) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = request.inputs.len();
        self.stats.total_batches.fetch_add(1, Ordering::Relaxed);

        info!(
            batch_id = %batch_id,
            inputs = total,
            output_dir = %request.output_dir.display(),
            "Starting batch"
        );

        let mut report = BatchReport {
            batch_id,
            output_dir: request.output_dir.clone(),
            parameters: None,
            outcomes: Vec::with_capacity(total),
            error: None,
            collisions: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        // Validating
        self.set_state(EngineState::Validating).await;
        let params = match validate(&request.params) {
            Ok(params) => params,
            Err(e) => {
                warn!(batch_id = %batch_id, error = %e, "Batch aborted: invalid parameters");
                report.error = Some(e.into());
                return self.finish(report, events.as_ref()).await;
            }
        };
        report.parameters = Some(params);

        // Provisioning
        self.set_state(EngineState::Provisioning).await;
        let output_dir = match self.provisioner.ensure_exists(&request.output_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(
                    batch_id = %batch_id,
                    error = %e,
                    "Batch aborted: output directory unusable"
                );
                report.error = Some(BatchError::Io {
                    path: e
                        .path()
                        .cloned()
                        .unwrap_or_else(|| request.output_dir.clone()),
                    message: e.to_string(),
                });
                return self.finish(report, events.as_ref()).await;
            }
        };
        report.output_dir = output_dir.clone();

        let resolved: Vec<Result<PathBuf, ResolveError>> = request
            .inputs
            .iter()
            .map(|input| resolve_output_path(input, &params, &output_dir))
            .collect();

        report.collisions =
            find_collisions(resolved.iter().filter_map(|r| r.as_ref().ok()).map(PathBuf::as_path));

        // Colliding inputs must run in input order so the last one wins.
        let parallel = if report.collisions.is_empty() {
            self.config.max_parallel_jobs.max(1)
        } else {
            for path in &report.collisions {
                warn!(
                    batch_id = %batch_id,
                    output = %path.display(),
                    "Several inputs map to the same output; the last one wins"
                );
            }
            COLLISIONS.inc_by(report.collisions.len() as u64);
            1
        };

        // Processing
        if let Some(tx) = &events {
            let _ = tx
                .send(BatchEvent::Started {
                    batch_id,
                    total,
                    output_dir: output_dir.clone(),
                })
                .await;
        }
        self.set_state(EngineState::Processing { completed: 0, total })
            .await;

        let params = &params;
        let cancel = &cancel;
        let mut results = stream::iter(request.inputs.iter().zip(resolved).enumerate())
            .map(|(index, (input, output))| async move {
                let outcome = if cancel.is_cancelled() {
                    ConversionOutcome::cancelled(input, output.ok())
                } else {
                    self.convert_one(input, output, params).await
                };
                (index, outcome)
            })
            .buffered(parallel);

        while let Some((index, outcome)) = results.next().await {
            if outcome.is_success() {
                self.stats.total_converted.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            }
            self.set_state(EngineState::Processing {
                completed: index + 1,
                total,
            })
            .await;

            if let Some(tx) = &events {
                let _ = tx
                    .send(BatchEvent::Outcome {
                        index,
                        total,
                        outcome: outcome.clone(),
                    })
                    .await;
            }
            report.outcomes.push(outcome);
        }
        drop(results);

        if cancel.is_cancelled() {
            info!(batch_id = %batch_id, "Batch cancelled");
        }

        self.finish(report, events.as_ref()).await
    }

    /// Converts one input; every failure becomes a classified outcome.
    async fn convert_one(
        &self,
        input: &Path,
        output: Result<PathBuf, ResolveError>,
        params: &ConversionParameters,
    ) -> ConversionOutcome {
        let format = params.target_format().extension();

        let output_path = match output {
            Ok(path) => path,
            Err(e) => {
                warn!(input = %input.display(), error = %e, "Cannot name output");
                FILES_CONVERTED
                    .with_label_values(&[e.kind().as_str(), format])
                    .inc();
                return ConversionOutcome::failure(input, None, e.kind(), e.to_string());
            }
        };

        let start = Instant::now();
        self.stats.active.fetch_add(1, Ordering::Relaxed);
        ACTIVE_JOBS.inc();

        let result = async {
            let encoded = self
                .transcoder
                .transcode(input, params)
                .await
                .map_err(|e| (e.kind(), e.to_string()))?;
            self.writer
                .write(&output_path, &encoded.data)
                .await
                .map_err(|e| (e.kind(), e.to_string()))
        }
        .await;

        self.stats.active.fetch_sub(1, Ordering::Relaxed);
        ACTIVE_JOBS.dec();

        let elapsed = start.elapsed();
        CONVERSION_DURATION
            .with_label_values(&[format])
            .observe(elapsed.as_secs_f64());

        match result {
            Ok(bytes_written) => {
                debug!(
                    input = %input.display(),
                    output = %output_path.display(),
                    bytes = bytes_written,
                    "Converted"
                );
                FILES_CONVERTED.with_label_values(&["success", format]).inc();
                BYTES_WRITTEN.inc_by(bytes_written);
                ConversionOutcome::Success {
                    input_path: input.to_path_buf(),
                    output_path,
                    bytes_written,
                    duration_ms: elapsed.as_millis() as u64,
                }
            }
            Err((kind, message)) => {
                warn!(
                    input = %input.display(),
                    kind = %kind,
                    error = %message,
                    "Conversion failed"
                );
                FILES_CONVERTED
                    .with_label_values(&[kind.as_str(), format])
                    .inc();
                ConversionOutcome::failure(input, Some(output_path), kind, message)
            }
        }
    }

    async fn finish(
        &self,
        mut report: BatchReport,
        events: Option<&mpsc::Sender<BatchEvent>>,
    ) -> BatchReport {
        report.finished_at = Utc::now();
        self.set_state(EngineState::Done).await;

        let result = if report.is_aborted() {
            "aborted"
        } else if report
            .outcomes
            .iter()
            .any(|o| o.error_kind() == Some(ErrorKind::Cancelled))
        {
            "cancelled"
        } else if report.failed() > 0 {
            "partial"
        } else {
            "completed"
        };
        BATCHES.with_label_values(&[result]).inc();

        info!(
            batch_id = %report.batch_id,
            result,
            succeeded = report.succeeded(),
            failed = report.failed(),
            duration_ms = report.duration_ms(),
            "Batch finished"
        );

        if let Some(tx) = events {
            let _ = tx
                .send(BatchEvent::Finished {
                    batch_id: report.batch_id,
                    succeeded: report.succeeded(),
                    failed: report.failed(),
                    error: report.error.clone(),
                })
                .await;
        }

        report
    }
}

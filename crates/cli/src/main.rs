mod metrics;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lofizer_core::{
    load_config_or_default, validate_config, BatchConversionEngine, BatchEvent, BatchPlan,
    BatchReport, BatchRequest, Config, ConversionOutcome, FfmpegTranscoder, RawParameters,
    Transcoder,
};

/// Downsample and transcode audio files in bulk.
#[derive(Debug, Parser)]
#[command(name = "lofizer", version)]
struct Cli {
    /// Configuration file (TOML). Built-in defaults are used without one.
    #[arg(long, env = "LOFIZER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert one or more audio files.
    Convert(ConvertArgs),
    /// Check that ffmpeg, ffprobe and the needed encoders are available.
    Check,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Input audio files, converted and reported in this order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Target format: wav or mp3.
    #[arg(short, long)]
    format: Option<String>,

    /// Target sample rate in Hz.
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,

    /// Bitrate of lossy targets, e.g. 32k.
    #[arg(short, long)]
    bitrate: Option<String>,

    /// Bits per sample of WAV targets: 8, 16, 24 or 32.
    #[arg(short = 'd', long)]
    bit_depth: Option<u16>,

    /// Output directory; a leading ~ is expanded.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Files converted at the same time.
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Print the planned output names without converting anything.
    #[arg(long)]
    dry_run: bool,

    /// Print the report (or plan) as JSON instead of progress lines.
    #[arg(long)]
    json: bool,

    /// Write Prometheus metrics to this file when done.
    #[arg(long, value_name = "FILE")]
    metrics_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config_or_default(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {:?}", path),
        None => "Failed to load config from the environment".to_string(),
    })?;
    validate_config(&config).context("Configuration validation failed")?;

    if let Some(path) = &cli.config {
        info!("Configuration loaded from {:?}", path);
    }

    match cli.command {
        Command::Convert(args) => convert(&config, args).await,
        Command::Check => check(&config).await,
    }
}

fn build_request(config: &Config, args: &ConvertArgs) -> BatchRequest {
    let params = RawParameters {
        target_format: args.format.clone(),
        sample_rate_hz: args.sample_rate,
        bitrate: args.bitrate.clone(),
        bit_depth: args.bit_depth,
    }
    .or(&config.defaults.raw_parameters());

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.defaults.output_dir.clone());

    BatchRequest::new(args.inputs.iter(), params, output_dir)
}

async fn convert(config: &Config, args: ConvertArgs) -> Result<ExitCode> {
    let mut engine_config = config.engine.clone();
    if let Some(jobs) = args.jobs {
        engine_config = engine_config.with_max_parallel(jobs.max(1));
    }
    let event_buffer = engine_config.event_buffer;

    let engine =
        BatchConversionEngine::new(engine_config, FfmpegTranscoder::new(config.transcoder.clone()));
    let request = build_request(config, &args);

    if args.dry_run {
        let plan = engine.plan(&request).context("Cannot plan batch")?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&plan);
        }
        let unnamed = plan.outputs.iter().any(|o| o.output_path.is_none());
        return Ok(if unnamed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
    }

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing files already in progress");
            token.cancel();
        }
    });

    let (events, printer) = if args.json {
        (None, None)
    } else {
        let (tx, mut rx) = mpsc::channel(event_buffer);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_event(&event);
            }
        });
        (Some(tx), Some(printer))
    };

    let report = engine.run_cancellable(request, events, cancel).await;

    if let Some(printer) = printer {
        printer.await.context("Progress printer failed")?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if let Some(path) = &args.metrics_file {
        metrics::write_metrics(path).await?;
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn check(config: &Config) -> Result<ExitCode> {
    let transcoder = FfmpegTranscoder::new(config.transcoder.clone());
    transcoder
        .validate()
        .await
        .context("Transcoder is not ready")?;

    println!(
        "{}: ffmpeg at {}, ffprobe at {}",
        transcoder.name(),
        config.transcoder.ffmpeg_path.display(),
        config.transcoder.ffprobe_path.display()
    );

    let missing = transcoder.capabilities().await.missing();
    if missing.is_empty() {
        let formats: Vec<&str> = transcoder
            .supported_output_formats()
            .iter()
            .map(|f| f.extension())
            .collect();
        println!("All encoders available ({})", formats.join(", "));
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Missing encoders: {}", missing.join(", "));
        Ok(ExitCode::FAILURE)
    }
}

fn print_plan(plan: &BatchPlan) {
    println!("Parameters: {}", plan.parameters);
    println!("Output directory: {}", plan.output_dir.display());
    for planned in &plan.outputs {
        match (&planned.output_path, &planned.error) {
            (Some(output), _) => println!(
                "  {} -> {}",
                planned.input_path.display(),
                output.display()
            ),
            (None, error) => println!(
                "  {} -> (no output: {})",
                planned.input_path.display(),
                error.as_deref().unwrap_or("unknown")
            ),
        }
    }
    for path in &plan.collisions {
        println!("warning: several inputs map to {}", path.display());
    }
}

fn print_event(event: &BatchEvent) {
    match event {
        BatchEvent::Started {
            total, output_dir, ..
        } => println!("Converting {} file(s) into {}", total, output_dir.display()),
        BatchEvent::Outcome {
            index,
            total,
            outcome,
        } => match outcome {
            ConversionOutcome::Success {
                input_path,
                output_path,
                bytes_written,
                ..
            } => println!(
                "[{}/{}] ok     {} -> {} ({} bytes)",
                index + 1,
                total,
                input_path.display(),
                output_path.display(),
                bytes_written
            ),
            ConversionOutcome::Failure {
                input_path,
                error_kind,
                message,
                ..
            } => println!(
                "[{}/{}] failed {} [{}] {}",
                index + 1,
                total,
                input_path.display(),
                error_kind,
                message
            ),
        },
        BatchEvent::Finished { .. } => {}
    }
}

fn print_summary(report: &BatchReport) {
    if let Some(error) = &report.error {
        println!("Batch aborted: {}", error);
        return;
    }

    println!(
        "{} of {} file(s) converted in {} ms",
        report.succeeded(),
        report.outcomes.len(),
        report.duration_ms()
    );
    for path in &report.collisions {
        println!(
            "warning: several inputs wrote {}; the last one was kept",
            path.display()
        );
    }

    let failed = report.failed_inputs();
    if !failed.is_empty() {
        println!("Failed inputs:");
        for input in failed {
            println!("  {}", input.display());
        }
    }
}

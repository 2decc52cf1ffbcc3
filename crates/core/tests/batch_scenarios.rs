//! Batch conversion integration tests.
//!
//! These tests drive the engine through whole batches with the mock
//! transcoder:
//! - Output naming and directory provisioning
//! - Per-file failure isolation and classification
//! - Batch-aborting validation and provisioning errors
//! - Ordering, bounded parallelism and collision handling
//!
//! One test uses the real ffmpeg and skips itself when it is not installed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lofizer_core::{
    engine::{BatchConversionEngine, BatchError, BatchEvent, BatchRequest, EngineConfig, ErrorKind},
    output::DirectoryProvisioner,
    params::{RawParameters, ValidationError},
    testing::{write_corrupt_file, write_test_tone, MockTranscoder},
    transcoder::{wav, FfmpegTranscoder, Transcoder},
};

fn wav_params(rate: u32, bits: u16) -> RawParameters {
    RawParameters::default()
        .with_format("wav")
        .with_sample_rate(rate)
        .with_bit_depth(bits)
}

fn engine(max_parallel_jobs: usize) -> (BatchConversionEngine<MockTranscoder>, MockTranscoder) {
    let transcoder = MockTranscoder::new();
    let engine = BatchConversionEngine::new(
        EngineConfig::default().with_max_parallel(max_parallel_jobs),
        transcoder.clone(),
    );
    (engine, transcoder)
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_single_file_into_absent_directory() {
    let temp = TempDir::new().unwrap();
    // Content is what counts, not the extension.
    let input = write_test_tone(temp.path(), "song.mp3", 44_100, 0.25).unwrap();
    let out = temp.path().join("out");
    assert!(!out.exists());

    let (engine, _) = engine(1);
    let report = engine
        .run(BatchRequest::new([&input], wav_params(8000, 16), &out))
        .await;

    assert!(report.is_success());
    assert!(out.is_dir());
    let expected = out.join("song-8000-16.wav");
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].output_path(), Some(expected.as_path()));
    assert!(expected.is_file());
}

#[tokio::test]
async fn test_empty_batch_succeeds_with_no_outcomes() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");

    let (engine, transcoder) = engine(2);
    let (tx, mut rx) = mpsc::channel(8);
    let report = engine
        .run_with_events(
            BatchRequest::new(Vec::<PathBuf>::new(), wav_params(8000, 16), &out),
            tx,
        )
        .await;

    assert!(report.is_success());
    assert!(report.outcomes.is_empty());
    assert_eq!(transcoder.transcode_count().await, 0);
    assert!(out.is_dir());

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], BatchEvent::Started { total: 0, .. }));
    assert!(matches!(
        events[1],
        BatchEvent::Finished {
            succeeded: 0,
            failed: 0,
            error: None,
            ..
        }
    ));
}

#[tokio::test]
async fn test_corrupt_input_does_not_stop_batch() {
    let temp = TempDir::new().unwrap();
    let a = write_corrupt_file(temp.path(), "a.wav").unwrap();
    let b = write_test_tone(temp.path(), "b.wav", 16_000, 0.1).unwrap();
    let out = temp.path().join("out");

    let (engine, _) = engine(1);
    let report = engine
        .run(BatchRequest::new([&a, &b], wav_params(8000, 16), &out))
        .await;

    assert!(!report.is_aborted());
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].error_kind(), Some(ErrorKind::DecodeError));
    assert!(report.outcomes[1].is_success());
    assert_eq!(report.failed_inputs(), vec![a.as_path()]);
    assert_eq!(dir_entries(&out), vec!["b-8000-16.wav"]);
}

#[tokio::test]
async fn test_mp3_without_bitrate_aborts() {
    let temp = TempDir::new().unwrap();
    let input = write_test_tone(temp.path(), "song.wav", 8000, 0.1).unwrap();
    let out = temp.path().join("out");
    let params = RawParameters::default()
        .with_format("mp3")
        .with_sample_rate(22_050);

    let (engine, transcoder) = engine(1);
    let report = engine.run(BatchRequest::new([&input], params, &out)).await;

    assert!(report.is_aborted());
    assert!(report.outcomes.is_empty());
    assert_eq!(
        report.error,
        Some(BatchError::Validation {
            error: ValidationError::missing("bitrate"),
        })
    );
    assert!(!out.exists());
    assert_eq!(transcoder.transcode_count().await, 0);
}

#[tokio::test]
async fn test_output_dir_is_a_file_aborts() {
    let temp = TempDir::new().unwrap();
    let input = write_test_tone(temp.path(), "song.wav", 8000, 0.1).unwrap();
    let out = temp.path().join("taken");
    std::fs::write(&out, b"not a directory").unwrap();

    let (engine, transcoder) = engine(1);
    let report = engine
        .run(BatchRequest::new([&input], wav_params(8000, 16), &out))
        .await;

    assert!(report.is_aborted());
    assert!(report.outcomes.is_empty());
    assert!(matches!(report.error, Some(BatchError::Io { ref path, .. }) if *path == out));
    assert_eq!(transcoder.transcode_count().await, 0);
}

#[tokio::test]
async fn test_outcomes_follow_input_order_under_parallelism() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    let inputs: Vec<PathBuf> = (0..6)
        .map(|i| {
            // Later inputs are shorter, so they tend to finish first.
            let secs = 0.6 - f64::from(i) * 0.1;
            write_test_tone(temp.path(), &format!("t{}.wav", i), 8000, secs).unwrap()
        })
        .collect();

    let (engine, transcoder) = engine(3);
    transcoder.set_delay(Duration::from_millis(20)).await;
    let report = engine
        .run(BatchRequest::new(&inputs, wav_params(8000, 8), &out))
        .await;

    assert_eq!(report.outcomes.len(), inputs.len());
    for (outcome, input) in report.outcomes.iter().zip(&inputs) {
        assert_eq!(outcome.input_path(), input.as_path());
        assert!(outcome.is_success());
    }
    assert!(transcoder.peak_concurrency() <= 3);
    assert!(transcoder.peak_concurrency() > 1);
}

#[tokio::test]
async fn test_rerun_overwrites_with_same_names() {
    let temp = TempDir::new().unwrap();
    let a = write_test_tone(temp.path(), "a.wav", 16_000, 0.2).unwrap();
    let b = write_test_tone(temp.path(), "b.wav", 16_000, 0.3).unwrap();
    let out = temp.path().join("out");
    let request = BatchRequest::new([&a, &b], wav_params(11_025, 24), &out);

    let (engine, _) = engine(2);
    let first = engine.run(request.clone()).await;
    let second = engine.run(request).await;

    let names = |r: &lofizer_core::BatchReport| -> Vec<PathBuf> {
        r.outcomes
            .iter()
            .map(|o| o.output_path().unwrap().to_path_buf())
            .collect()
    };
    assert!(first.is_success() && second.is_success());
    assert_eq!(names(&first), names(&second));
    // No temporary files are left behind.
    assert_eq!(dir_entries(&out), vec!["a-11025-24.wav", "b-11025-24.wav"]);
}

#[tokio::test]
async fn test_sixteen_bit_output_has_two_bytes_per_sample() {
    let temp = TempDir::new().unwrap();
    let input = write_test_tone(temp.path(), "voice.wav", 44_100, 0.5).unwrap();
    let out = temp.path().join("out");

    let (engine, _) = engine(1);
    let report = engine
        .run(BatchRequest::new([&input], wav_params(8000, 16), &out))
        .await;
    assert!(report.is_success());

    let bytes = std::fs::read(out.join("voice-8000-16.wav")).unwrap();
    let info = wav::inspect(&bytes).unwrap();
    assert_eq!(info.spec.sample_rate, 8000);
    assert_eq!(info.spec.bits_per_sample, 16);
    assert_eq!(info.bytes_per_sample(), 2);
    assert_eq!(info.frames, 4000);
    assert_eq!(info.data_len, info.frames as usize * 2);
}

#[tokio::test]
async fn test_mp3_batch_names_outputs_by_bitrate() {
    let temp = TempDir::new().unwrap();
    let input = write_test_tone(temp.path(), "song.wav", 44_100, 0.5).unwrap();
    let out = temp.path().join("out");
    let params = RawParameters::default()
        .with_format("MP3")
        .with_sample_rate(8000)
        .with_bitrate("32k");

    let (engine, _) = engine(1);
    let report = engine.run(BatchRequest::new([&input], params, &out)).await;

    assert!(report.is_success());
    assert_eq!(dir_entries(&out), vec!["song-8000-32k.mp3"]);
}

#[tokio::test]
async fn test_unencodable_mp3_rate_is_per_file_encode_error() {
    let temp = TempDir::new().unwrap();
    let input = write_test_tone(temp.path(), "song.wav", 8000, 0.1).unwrap();
    let out = temp.path().join("out");
    let params = RawParameters::default()
        .with_format("mp3")
        .with_sample_rate(4000)
        .with_bitrate("32k");

    let (engine, _) = engine(1);
    let report = engine.run(BatchRequest::new([&input], params, &out)).await;

    assert!(!report.is_aborted());
    assert_eq!(report.outcomes[0].error_kind(), Some(ErrorKind::EncodeError));
    assert!(dir_entries(&out).is_empty());
}

#[tokio::test]
async fn test_missing_input_is_io_error() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");

    let (engine, _) = engine(1);
    let report = engine
        .run(BatchRequest::new(
            [temp.path().join("gone.wav")],
            wav_params(8000, 16),
            &out,
        ))
        .await;

    assert_eq!(report.outcomes[0].error_kind(), Some(ErrorKind::IoError));
}

#[tokio::test]
async fn test_collisions_run_sequentially_and_last_wins() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("one")).unwrap();
    std::fs::create_dir_all(temp.path().join("two")).unwrap();
    let first = write_test_tone(&temp.path().join("one"), "song.wav", 8000, 0.1).unwrap();
    let second = write_test_tone(&temp.path().join("two"), "song.wav", 8000, 0.2).unwrap();
    let out = temp.path().join("out");

    let (engine, transcoder) = engine(4);
    transcoder.set_delay(Duration::from_millis(10)).await;
    let report = engine
        .run(BatchRequest::new([&first, &second], wav_params(8000, 16), &out))
        .await;

    let target = out.join("song-8000-16.wav");
    assert!(report.is_success());
    assert_eq!(report.collisions, vec![target.clone()]);
    assert_eq!(transcoder.peak_concurrency(), 1);

    let info = wav::inspect(&std::fs::read(&target).unwrap()).unwrap();
    assert_eq!(info.frames, 1600);
}

#[tokio::test]
async fn test_rerun_failed_subset() {
    let temp = TempDir::new().unwrap();
    let a = write_test_tone(temp.path(), "a.wav", 8000, 0.1).unwrap();
    let b = write_test_tone(temp.path(), "b.wav", 8000, 0.1).unwrap();
    let out = temp.path().join("out");
    let request = BatchRequest::new([&a, &b], wav_params(8000, 16), &out);

    let (engine, transcoder) = engine(1);
    transcoder
        .set_next_error(lofizer_core::TranscodeError::encode_failed("lame crashed", None))
        .await;
    let report = engine.run(request.clone()).await;
    assert_eq!(report.failed_inputs(), vec![a.as_path()]);

    let retry = request.with_inputs(report.failed_inputs());
    let report = engine.run(retry).await;
    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(dir_entries(&out), vec!["a-8000-16.wav", "b-8000-16.wav"]);
}

#[tokio::test]
async fn test_cancellation_mid_batch() {
    let temp = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (0..4)
        .map(|i| write_test_tone(temp.path(), &format!("t{}.wav", i), 8000, 0.1).unwrap())
        .collect();
    let out = temp.path().join("out");

    let (engine, transcoder) = engine(1);
    transcoder.set_delay(Duration::from_millis(100)).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = engine
        .run_cancellable(
            BatchRequest::new(&inputs, wav_params(8000, 16), &out),
            None,
            cancel,
        )
        .await;

    assert_eq!(report.outcomes.len(), 4);
    // The file in flight when the token fired still completes.
    assert!(report.outcomes[0].is_success());
    assert!(report.outcomes[1..]
        .iter()
        .all(|o| o.error_kind() == Some(ErrorKind::Cancelled)));
    assert_eq!(dir_entries(&out), vec!["t0-8000-16.wav"]);
}

#[tokio::test]
async fn test_tilde_output_dir_is_expanded() {
    let temp = TempDir::new().unwrap();
    let input = write_test_tone(temp.path(), "song.wav", 8000, 0.1).unwrap();
    let home = temp.path().join("home");

    let (engine, _) = engine(1);
    let engine = engine.with_provisioner(DirectoryProvisioner::with_home(&home));
    let report = engine
        .run(BatchRequest::new(
            [&input],
            wav_params(8000, 16),
            "~/Documents/lofizer",
        ))
        .await;

    let dir = home.join("Documents").join("lofizer");
    assert!(report.is_success());
    assert_eq!(report.output_dir, dir);
    assert!(dir.join("song-8000-16.wav").is_file());
}

fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
        && std::process::Command::new("ffprobe")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
}

#[tokio::test]
async fn test_ffmpeg_end_to_end() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }

    let temp = TempDir::new().unwrap();
    let input = write_test_tone(temp.path(), "tone.wav", 44_100, 1.0).unwrap();
    let corrupt = write_corrupt_file(temp.path(), "broken.wav").unwrap();
    let out = temp.path().join("out");

    let transcoder = FfmpegTranscoder::with_defaults();
    transcoder.validate().await.unwrap();
    let info = transcoder.probe(&input).await.unwrap();
    assert_eq!(info.audio_sample_rate, Some(44_100));

    let engine = BatchConversionEngine::new(EngineConfig::default(), transcoder);

    let report = engine
        .run(BatchRequest::new([&input, &corrupt], wav_params(8000, 16), &out))
        .await;
    assert!(report.outcomes[0].is_success());
    assert_eq!(report.outcomes[1].error_kind(), Some(ErrorKind::DecodeError));

    let info = wav::inspect(&std::fs::read(out.join("tone-8000-16.wav")).unwrap()).unwrap();
    assert_eq!(info.spec.sample_rate, 8000);
    assert_eq!(info.spec.bits_per_sample, 16);

    let mp3 = RawParameters::default()
        .with_format("mp3")
        .with_sample_rate(22_050)
        .with_bitrate("64k");
    let report = engine.run(BatchRequest::new([&input], mp3, &out)).await;
    assert!(report.is_success());
    assert!(out.join("tone-22050-64k.mp3").is_file());
}

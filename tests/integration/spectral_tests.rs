use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use tempfile::tempdir;
use trackdupe::fingerprint::{Algorithm, Capabilities, FingerprintOptions, Fingerprinter};
use trackdupe::scan::{Orchestrator, ScanOptions};

use super::common::{engine, write_file};

const RATE: u32 = 22_050;

/// Write `secs` of a mono sine at `freq` Hz as 16-bit PCM.
fn write_sine(path: &Path, freq: f32, secs: f32) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total = (RATE as f32 * secs) as usize;
    for n in 0..total {
        let t = n as f32 / RATE as f32;
        let sample = (2.0 * PI * freq * t).sin() * 0.5;
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path.to_path_buf()
}

fn fingerprinter() -> Fingerprinter {
    Fingerprinter::new(
        FingerprintOptions {
            window_secs: 5.0,
            ..Default::default()
        },
        Capabilities::none(),
    )
}

#[test]
fn test_spectral_fingerprint_is_deterministic() {
    let dir = tempdir().unwrap();
    let wav = write_sine(&dir.path().join("tone.wav"), 440.0, 3.0);

    let fp = fingerprinter();
    let first = fp.fingerprint_path(Algorithm::Spectral, &wav);
    let second = fp.fingerprint_path(Algorithm::Spectral, &wav);

    assert!(first.is_success(), "{:?}", first.error());
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!((first.duration_secs() - 3.0).abs() < 0.1);
}

#[test]
fn test_same_audio_at_two_paths_is_grouped() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_sine(&music.path().join("a/tone.wav"), 440.0, 3.0);
    write_sine(&music.path().join("b/tone copy.wav"), 440.0, 3.0);
    write_sine(&music.path().join("c/other.wav"), 2_000.0, 3.0);

    let options = ScanOptions {
        algorithms: vec![Algorithm::Spectral, Algorithm::ByteHash],
        checkpoint_path: state.path().join("checkpoint.json"),
        ..Default::default()
    };
    let outcome = Orchestrator::new(options, engine()).run(music.path()).unwrap();
    let groups = outcome.duplicate_groups();

    let spectral = &groups[&Algorithm::Spectral];
    assert_eq!(spectral.len(), 1);
    assert_eq!(spectral[0].len(), 2);
    assert!(spectral[0].files.iter().all(|f| !f.path.ends_with("c/other.wav")));
}

#[test]
fn test_corrupt_file_fails_alone() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    for (i, freq) in [220.0, 330.0, 440.0, 550.0].iter().enumerate() {
        write_sine(&music.path().join(format!("{i}.wav")), *freq, 2.0);
    }
    write_file(music.path(), "broken.flac", b"fLaC but not really a flac stream at all");

    let options = ScanOptions {
        algorithms: vec![Algorithm::Spectral],
        batch_size: 5,
        checkpoint_path: state.path().join("checkpoint.json"),
        ..Default::default()
    };
    let outcome = Orchestrator::new(options, engine()).run(music.path()).unwrap();

    let results: Vec<_> = outcome.results.for_algorithm(Algorithm::Spectral).collect();
    assert_eq!(results.len(), 5);
    let failures: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].file().path.ends_with("broken.flac"));
    assert!(failures[0].failure_kind().is_some());
    assert!(results.iter().filter(|r| r.is_success()).all(|r| !r.fingerprint().is_empty()));
    assert_eq!(outcome.counters.batches_failed, 0);
}

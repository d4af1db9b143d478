use std::fs;

use tempfile::tempdir;
use trackdupe::checkpoint::{CheckpointError, ScanCheckpoint};
use trackdupe::error::ExitCode;
use trackdupe::fingerprint::Algorithm;
use trackdupe::output::JsonOutput;
use trackdupe::report::ScanReport;
use trackdupe::scan::{Orchestrator, OrchestratorError, ScanOptions};

use super::common::{byte_options, engine, write_file};

fn kept_options(state: &std::path::Path) -> ScanOptions {
    ScanOptions {
        keep_checkpoint: true,
        ..byte_options(state)
    }
}

#[test]
fn test_corrupt_checkpoint_is_fatal_when_resuming() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "a.mp3", b"a");
    let options = byte_options(state.path());
    fs::write(&options.checkpoint_path, "{ not json").unwrap();

    let result = Orchestrator::new(options.clone(), engine()).run(music.path());
    match result {
        Err(OrchestratorError::Checkpoint { path, source }) => {
            assert_eq!(path, options.checkpoint_path);
            assert!(matches!(source, CheckpointError::Parse(_)));
        }
        other => panic!("expected checkpoint error, got {other:?}"),
    }
    // Nothing partial is written over the damaged file.
    assert_eq!(fs::read_to_string(&options.checkpoint_path).unwrap(), "{ not json");
}

#[test]
fn test_tampered_checkpoint_fails_checksum() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "a.mp3", b"a");
    write_file(music.path(), "b.mp3", b"b");
    let options = kept_options(state.path());
    Orchestrator::new(options.clone(), engine()).run(music.path()).unwrap();

    let text = fs::read_to_string(&options.checkpoint_path).unwrap();
    let tampered = text.replacen("\"processed_count\": 2", "\"processed_count\": 3", 1);
    assert_ne!(text, tampered);
    fs::write(&options.checkpoint_path, tampered).unwrap();

    let result = Orchestrator::new(options, engine()).run(music.path());
    assert!(matches!(
        result,
        Err(OrchestratorError::Checkpoint {
            source: CheckpointError::ChecksumMismatch,
            ..
        })
    ));
}

#[test]
fn test_checkpoint_for_other_algorithms_is_rejected() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "a.mp3", b"a");
    let options = kept_options(state.path());
    Orchestrator::new(options.clone(), engine()).run(music.path()).unwrap();

    let spectral = ScanOptions {
        algorithms: vec![Algorithm::Spectral],
        ..options
    };
    let result = Orchestrator::new(spectral, engine()).run(music.path());
    assert!(matches!(
        result,
        Err(OrchestratorError::Checkpoint {
            source: CheckpointError::AlgorithmMismatch { .. },
            ..
        })
    ));
}

#[test]
fn test_checkpoint_for_other_root_is_rejected() {
    let music = tempdir().unwrap();
    let other = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "a.mp3", b"a");
    write_file(other.path(), "b.mp3", b"b");
    let options = kept_options(state.path());
    Orchestrator::new(options.clone(), engine()).run(music.path()).unwrap();

    let result = Orchestrator::new(options, engine()).run(other.path());
    assert!(matches!(
        result,
        Err(OrchestratorError::Checkpoint {
            source: CheckpointError::RootMismatch { .. },
            ..
        })
    ));
}

#[test]
fn test_no_resume_overwrites_a_corrupt_checkpoint() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "a.mp3", b"a");
    let options = ScanOptions {
        resume: false,
        ..kept_options(state.path())
    };
    fs::write(&options.checkpoint_path, "garbage").unwrap();

    let outcome = Orchestrator::new(options.clone(), engine()).run(music.path()).unwrap();
    assert!(!outcome.resumed);

    let saved = ScanCheckpoint::load(&options.checkpoint_path).unwrap();
    assert_eq!(saved.processed_count, 1);
    assert_eq!(saved.algorithms, vec![Algorithm::ByteHash]);
}

#[test]
fn test_pre_epoch_mtime_survives_checkpoint_and_report() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    for name in ["a.mp3", "b.mp3", "c.mp3", "d.mp3"] {
        write_file(music.path(), name, b"identical bytes");
    }
    let old = write_file(music.path(), "e.mp3", b"identical bytes");
    filetime::set_file_mtime(&old, filetime::FileTime::from_unix_time(-86_400, 0)).unwrap();

    let options = ScanOptions {
        checkpoint_interval: 1,
        ..kept_options(state.path())
    };
    let outcome = Orchestrator::new(options.clone(), engine()).run(music.path()).unwrap();
    assert!(options.checkpoint_path.exists());

    let saved = ScanCheckpoint::load(&options.checkpoint_path).unwrap();
    let expected = std::time::SystemTime::UNIX_EPOCH - std::time::Duration::from_secs(86_400);
    let restored = saved
        .results
        .for_algorithm(Algorithm::ByteHash)
        .find(|r| r.file().path.ends_with("e.mp3"))
        .unwrap();
    assert_eq!(restored.file().modified, expected);

    let groups = outcome.duplicate_groups();
    assert_eq!(groups[&Algorithm::ByteHash][0].len(), 5);
    // Oldest copy ranks last among equals.
    assert!(groups[&Algorithm::ByteHash][0].files[4].path.ends_with("e.mp3"));

    let report = ScanReport::build(&outcome, &groups, None);
    let report_path = state.path().join("report.json");
    JsonOutput::new(&report, ExitCode::Success).write_file(&report_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["duplicates"]["byte_hash"]["duplicate_groups"], 1);
}

use std::collections::BTreeSet;
use std::path::Path;

use tempfile::tempdir;
use trackdupe::collaborators::{MemoryTrackStore, TrackStore};
use trackdupe::error::ExitCode;
use trackdupe::fingerprint::Algorithm;
use trackdupe::output::{CsvOutput, JsonOutput};
use trackdupe::report::ScanReport;
use trackdupe::scan::{Orchestrator, OrchestratorError};

use super::common::{byte_options, engine, write_file};

#[test]
fn test_scan_empty_directory() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();

    assert_eq!(outcome.counters.files_discovered, 0);
    assert!(outcome.results.is_empty());
    assert!(!outcome.interrupted);
    assert!(outcome.duplicate_groups()[&Algorithm::ByteHash].is_empty());

    let report = ScanReport::build(&outcome, &outcome.duplicate_groups(), None);
    assert_eq!(
        ExitCode::for_scan(outcome.interrupted, report.overall.total_errors, report.total_groups()),
        ExitCode::NoDuplicates
    );
}

#[test]
fn test_three_identical_files_form_one_group() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "a/song.mp3", b"identical audio payload");
    write_file(music.path(), "b/song.mp3", b"identical audio payload");
    write_file(music.path(), "c/song copy.mp3", b"identical audio payload");
    write_file(music.path(), "other.mp3", b"something else");

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();

    assert_eq!(outcome.counters.files_discovered, 4);
    assert_eq!(outcome.files_fingerprinted(), 4);
    assert_eq!(outcome.files_with_errors(), 0);

    let groups = outcome.duplicate_groups();
    let byte_groups = &groups[&Algorithm::ByteHash];
    assert_eq!(byte_groups.len(), 1);
    assert_eq!(byte_groups[0].len(), 3);
    assert!(byte_groups[0].files.iter().all(|f| !f.path.ends_with("other.mp3")));
    assert_eq!(byte_groups[0].removals().len(), 2);
}

#[test]
fn test_non_audio_and_ignored_files_are_skipped() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "keep.flac", b"same");
    write_file(music.path(), "notes.txt", b"same");
    write_file(music.path(), "cover.jpg", b"same");
    write_file(music.path(), "Podcasts/episode.mp3", b"same");
    write_file(music.path(), "Album/track.FLAC", b"same");

    let mut options = byte_options(state.path());
    options.walker.ignore_patterns = vec!["Podcasts/".to_string()];
    let outcome = Orchestrator::new(options, engine()).run(music.path()).unwrap();

    let names: BTreeSet<String> = outcome.results.iter().map(|r| r.file().file_name()).collect();
    assert_eq!(
        names,
        ["keep.flac", "track.FLAC"].iter().map(|s| (*s).to_string()).collect::<BTreeSet<_>>()
    );
    assert_eq!(outcome.duplicate_groups()[&Algorithm::ByteHash].len(), 1);
}

#[test]
fn test_paths_are_absolute() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "x.ogg", b"data");

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();
    assert!(outcome.root.is_absolute());
    assert!(outcome.results.iter().all(|r| r.file().path.is_absolute()));
}

#[test]
fn test_missing_root_is_fatal() {
    let state = tempdir().unwrap();
    let missing = state.path().join("nope");
    let result = Orchestrator::new(byte_options(state.path()), engine()).run(&missing);

    assert!(matches!(result, Err(OrchestratorError::Root(_))));
    assert!(!state.path().join("checkpoint.json").exists());
}

#[test]
fn test_completed_scan_removes_checkpoint_unless_kept() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "a.mp3", b"one");
    write_file(music.path(), "b.mp3", b"two");
    write_file(music.path(), "c.mp3", b"three");

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();
    assert!(outcome.checkpoint.is_none());
    assert!(!state.path().join("checkpoint.json").exists());

    let mut options = byte_options(state.path());
    options.keep_checkpoint = true;
    let outcome = Orchestrator::new(options, engine()).run(music.path()).unwrap();
    assert_eq!(outcome.checkpoint, Some(state.path().join("checkpoint.json")));
}

#[test]
fn test_report_exports() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "a.mp3", b"dupe");
    write_file(music.path(), "a.flac", b"dupe");

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();
    let groups = outcome.duplicate_groups();
    let report = ScanReport::build(&outcome, &groups, None);
    let exit_code = ExitCode::for_scan(outcome.interrupted, report.overall.total_errors, report.total_groups());
    assert_eq!(exit_code, ExitCode::Success);

    let report_path = state.path().join("out/report.json");
    JsonOutput::new(&report, exit_code).write_file(&report_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["overall"]["files_processed"], 2);
    assert_eq!(json["duplicates"]["byte_hash"]["duplicate_groups"], 1);

    let csv = CsvOutput::new(&groups).to_string().unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].contains("keep") && rows[1].contains("a.flac"));
    assert!(rows[2].contains("remove") && rows[2].contains("a.mp3"));
    assert!(groups[&Algorithm::ByteHash][0].keep().path.ends_with("a.flac"));
}

#[test]
fn test_scan_results_publish_to_track_store() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_file(music.path(), "Jazz/take.flac", b"same take");
    write_file(music.path(), "Jazz/take.mp3", b"same take");
    write_file(music.path(), "Rock/riff.mp3", b"another track");

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();

    let store = MemoryTrackStore::new();
    let by_folder = |path: &Path| {
        path.parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_lowercase())
    };
    let summary = outcome.publish(&store, &by_folder);

    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.skipped, 0);
    // Identical content shares one hash, so the store holds two tracks.
    assert_eq!(store.len(), 2);

    let group = &outcome.duplicate_groups()[&Algorithm::ByteHash][0];
    let stored = store.get_by_hash(&group.fingerprint).unwrap().unwrap();
    assert_eq!(stored.genre.as_deref(), Some("jazz"));
    assert_eq!(stored.algorithm, Algorithm::ByteHash);
}

use std::fs;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use tempfile::tempdir;
use trackdupe::actions::{execute, plan, CleanupMode, MANIFEST_FILE};
use trackdupe::fingerprint::Algorithm;
use trackdupe::scan::Orchestrator;

use super::common::{byte_options, engine, write_file};

const CONTENT: &[u8] = b"the same recording, byte for byte";

/// Three copies of one file under different containers, plus a unique file.
fn library(dir: &std::path::Path) {
    let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(3600));
    let flac = write_file(dir, "Album/song.flac", CONTENT);
    filetime::set_file_mtime(&flac, old).unwrap();
    write_file(dir, "Album/song.mp3", CONTENT);
    write_file(dir, "Downloads/song.ogg", CONTENT);
    write_file(dir, "Album/other.mp3", b"unique");
}

#[test]
fn test_dry_run_moves_nothing() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    library(music.path());

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();
    let groups = outcome.duplicate_groups();
    let cleanup = plan(&groups[&Algorithm::ByteHash]);
    assert_eq!(cleanup.total_files(), 2);

    let report = execute(&cleanup, state.path(), CleanupMode::DryRun).unwrap();
    assert_eq!(report.planned_files, 2);
    assert_eq!(report.planned_bytes, 2 * CONTENT.len() as u64);
    assert!(report.moved.is_empty());
    assert!(report.quarantine_dir.is_none());
    assert!(music.path().join("Album/song.mp3").exists());
    assert!(music.path().join("Downloads/song.ogg").exists());
}

#[test]
fn test_live_cleanup_quarantines_all_but_the_best() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    library(music.path());

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();
    let groups = outcome.duplicate_groups();
    let group = &groups[&Algorithm::ByteHash][0];
    // Format outranks age: the older flac is still kept.
    assert!(group.keep().path.ends_with("Album/song.flac"));

    let report = execute(&plan(&groups[&Algorithm::ByteHash]), state.path(), CleanupMode::Live).unwrap();
    assert!(report.all_succeeded());
    assert_eq!(report.moved.len(), 2);
    assert_eq!(report.bytes_reclaimed, 2 * CONTENT.len() as u64);

    // Kept file untouched, removed files present by content in quarantine.
    let kept = music.path().join("Album/song.flac");
    assert_eq!(fs::read(&kept).unwrap(), CONTENT);
    for moved in &report.moved {
        assert!(!moved.original.exists());
        assert_eq!(fs::read(&moved.quarantined).unwrap(), CONTENT);
    }
    assert!(music.path().join("Album/other.mp3").exists());

    let quarantine = report.quarantine_dir.clone().unwrap();
    assert!(quarantine.starts_with(state.path()));
    let manifest = fs::read_to_string(quarantine.join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest.lines().count(), 3);
    assert!(manifest.contains("song.mp3"));
    assert!(manifest.contains("song.ogg"));
}

#[test]
fn test_file_changed_after_scan_is_not_moved() {
    let music = tempdir().unwrap();
    let state = tempdir().unwrap();
    library(music.path());

    let outcome = Orchestrator::new(byte_options(state.path()), engine())
        .run(music.path())
        .unwrap();
    let groups = outcome.duplicate_groups();
    let cleanup = plan(&groups[&Algorithm::ByteHash]);

    fs::write(music.path().join("Downloads/song.ogg"), b"edited").unwrap();

    let report = execute(&cleanup, state.path(), CleanupMode::Live).unwrap();
    assert_eq!(report.moved.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("Downloads/song.ogg"));
    assert!(music.path().join("Downloads/song.ogg").exists());
}

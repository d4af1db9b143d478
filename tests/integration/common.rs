use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use trackdupe::fingerprint::{Algorithm, Capabilities, FingerprintEngine, FingerprintOptions, Fingerprinter};
use trackdupe::scan::ScanOptions;

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

pub fn engine() -> Arc<dyn FingerprintEngine> {
    Arc::new(Fingerprinter::new(FingerprintOptions::default(), Capabilities::none()))
}

/// Byte-hash-only options with the checkpoint inside `state_dir`.
pub fn byte_options(state_dir: &Path) -> ScanOptions {
    ScanOptions {
        algorithms: vec![Algorithm::ByteHash],
        batch_size: 2,
        worker_count: 2,
        checkpoint_path: state_dir.join("checkpoint.json"),
        checkpoint_interval: 1,
        ..Default::default()
    }
}
